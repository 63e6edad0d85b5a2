//! Application layer for keyrelay-host.

pub mod mirror;

pub use mirror::TextMirror;

//! Domain layer for keyrelay-host.

pub mod config;

pub use config::HostConfig;

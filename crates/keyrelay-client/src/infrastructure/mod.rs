//! Infrastructure layer for the device client.
//!
//! Contains OS-facing adapters: the WebSocket dialer and the configuration
//! file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyrelay_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;

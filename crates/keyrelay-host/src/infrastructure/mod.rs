//! Infrastructure layer for keyrelay-host.
//!
//! Binds the relay listener, performs the WebSocket upgrade for each device,
//! and forwards decoded messages to the application as [`HostEvent`]s.

pub mod ws_server;

pub use ws_server::{bind_host, serve, HostEvent};

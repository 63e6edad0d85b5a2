//! keyrelay-host library crate.
//!
//! The desktop end of the relay: a WebSocket listener that accepts device
//! links, decodes their `text`/`key` messages, and hands them to whatever
//! injects keystrokes on this machine.  The bundled binary mirrors the
//! resulting text in its log instead of injecting it.
//!
//! # Architecture
//!
//! ```text
//! Device (JSON over WebSocket)
//!         ↕
//! [keyrelay-host]
//!   ├── domain/           HostConfig
//!   ├── application/      TextMirror: applies relay messages to a buffer
//!   └── infrastructure/
//!         └── ws_server/  Accept loop and per-session tasks (tokio-tungstenite)
//! ```

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: what a relay message does to the desktop's text.
pub mod application;

/// Infrastructure layer: the WebSocket listener.
pub mod infrastructure;

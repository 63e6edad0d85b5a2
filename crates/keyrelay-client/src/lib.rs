//! keyrelay-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! the binary entry point in `main.rs` share the same module tree.
//!
//! # What does keyrelay-client do?
//!
//! The client runs on the handheld device.  It keeps one WebSocket open to
//! the desktop relay and streams the user's edits as keystrokes:
//!
//! 1. The [`ConnectionManager`](application::connection_manager) walks an
//!    ordered list of candidate desktop addresses, falls over to the next one
//!    when an attempt fails or times out, and backs off between full cycles.
//! 2. Once a link is up, the [`TextSyncEngine`](application::text_sync)
//!    turns every local edit into the minimal Backspace/Text messages and
//!    sends them through the manager's per-connection send capability.
//! 3. The last endpoint set is persisted so a restarted process can resume
//!    without pairing again.

/// Application layer: the connection state machine and text sync.
pub mod application;

/// Infrastructure layer: WebSocket attempts and config persistence.
pub mod infrastructure;

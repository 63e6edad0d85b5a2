//! # keyrelay-core
//!
//! Shared library for KeyRelay: a handheld device acting as a remote text
//! input surface for a desktop host, relaying keystrokes over a local-network
//! WebSocket.
//!
//! This crate has no dependencies on sockets, timers, or async runtimes.  It
//! holds the pieces both ends of the relay agree on:
//!
//! - **`domain`** – The candidate endpoint set, the generation token used to
//!   invalidate stale connection callbacks, the link state machine's states,
//!   and the linear-capped reconnect backoff policy.
//!
//! - **`protocol`** – The JSON messages that travel over the relay socket
//!   (`{"type":"text",...}` and `{"type":"key",...}`) and their codec.
//!
//! - **`sync`** – The shared-prefix edit planner that turns "text before" and
//!   "text after" into a minimal run of Backspace keys plus one appended
//!   suffix.

pub mod domain;
pub mod protocol;
pub mod sync;

pub use domain::backoff::BackoffPolicy;
pub use domain::endpoint::{Endpoint, EndpointError, EndpointSet, DEFAULT_RELAY_PORT};
pub use domain::generation::{Generation, GenerationCounter};
pub use domain::link_state::LinkState;
pub use protocol::codec::{
    decode_host_message, decode_message, encode_host_message, encode_message, ProtocolError,
};
pub use protocol::messages::{HostMessage, RelayKey, RelayMessage};
pub use sync::{common_prefix_len, plan_edit, EditPlan};

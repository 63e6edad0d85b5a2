//! Application layer use cases for the device client.
//!
//! - **`connection_manager`** – Owns the relay link: failover across the
//!   endpoint set, connect timeouts, backoff, and stale-callback suppression.
//!   Talks to sockets only through the [`Dialer`](connection_manager::Dialer)
//!   trait, which the infrastructure layer implements.
//!
//! - **`text_sync`** – Diffs local edits against the last text sent and emits
//!   the keystrokes through the manager's current send capability.
//!
//! - **`endpoint_store`** – The persistence seam for the last known endpoint
//!   set.

pub mod connection_manager;
pub mod endpoint_store;
pub mod text_sync;

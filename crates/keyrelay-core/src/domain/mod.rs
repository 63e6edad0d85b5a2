//! Domain types for the relay connection.
//!
//! Nothing in here performs I/O.  The connection manager in `keyrelay-client`
//! drives these types from its event loop; keeping them pure means the rules
//! (which endpoint is valid, which generation is current, how long to back
//! off) can be tested without a network.

pub mod backoff;
pub mod endpoint;
pub mod generation;
pub mod link_state;

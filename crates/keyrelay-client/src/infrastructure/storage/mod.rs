//! Storage infrastructure: the client's TOML configuration file.
//!
//! The `config` sub-module reads and writes the relay settings and the last
//! known endpoint set, and adapts that file to the application layer's
//! [`EndpointStore`](crate::application::endpoint_store::EndpointStore) seam
//! so `resume` survives a process restart.

pub mod config;

//! Host configuration types.
//!
//! [`HostConfig`] is built once in `main.rs` from CLI arguments and passed to
//! the listener.  Keeping it a plain struct lets tests bind to an ephemeral
//! loopback port without touching the environment.

use std::net::{Ipv4Addr, SocketAddr};

use keyrelay_core::DEFAULT_RELAY_PORT;

/// All runtime configuration for the relay listener.
///
/// # Example
///
/// ```rust
/// use keyrelay_host::domain::HostConfig;
///
/// let cfg = HostConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 38745);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Address the WebSocket listener binds to.
    ///
    /// `0.0.0.0` accepts devices on every interface (LAN and VPN), which is
    /// what a paired device expects since it may hold several of this
    /// machine's addresses.
    pub bind_addr: SocketAddr,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_RELAY_PORT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_all_interfaces_on_relay_port() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:38745");
    }
}

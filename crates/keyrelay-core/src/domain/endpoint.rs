//! Candidate desktop endpoints.
//!
//! Pairing hands the device an ordered list of addresses the desktop might be
//! reachable on (LAN IP first, then VPN or secondary interfaces) plus one
//! shared port.  The connection manager walks that list in order; an entry that
//! cannot be parsed is skipped just like an entry that refuses the connection.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed port of the desktop's overlay relay listener.
pub const DEFAULT_RELAY_PORT: u16 = 38745;

/// Errors produced while turning a raw address string into an [`Endpoint`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The address is neither an IP literal nor a valid hostname.
    #[error("malformed endpoint address: {0:?}")]
    Malformed(String),

    /// Port 0 cannot be connected to.
    #[error("invalid relay port: {0}")]
    InvalidPort(u16),
}

/// Ordered candidate addresses plus the port they all share.
///
/// The order is significant: index 0 is tried first on every failover cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet {
    /// Raw address strings exactly as supplied by pairing or configuration.
    pub addresses: Vec<String>,
    /// Relay port shared by every address.
    pub port: u16,
}

impl EndpointSet {
    /// Creates a set from any iterable of address strings.
    pub fn new<I, S>(addresses: I, port: u16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
            port,
        }
    }

    /// Returns `true` when the set can drive a connection attempt: at least one
    /// address and a non-zero port.
    ///
    /// An unusable set keeps the connection manager idle.
    pub fn is_usable(&self) -> bool {
        !self.addresses.is_empty() && self.port > 0
    }

    /// Number of candidate addresses.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns `true` if there are no candidate addresses.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Parses the candidate at `index`.
    ///
    /// Returns `None` when `index` is past the end of the list.
    pub fn endpoint(&self, index: usize) -> Option<Result<Endpoint, EndpointError>> {
        self.addresses
            .get(index)
            .map(|address| Endpoint::parse(address, self.port))
    }
}

/// The host part of an endpoint after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Host {
    Ip(IpAddr),
    Name(String),
}

/// One validated address + port pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: Host,
    port: u16,
}

impl Endpoint {
    /// Validates `address` and pairs it with `port`.
    ///
    /// Accepts an IPv4 literal, an IPv6 literal (bare or in brackets), or a
    /// DNS hostname.  Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// - [`EndpointError::InvalidPort`] if `port` is 0.
    /// - [`EndpointError::Malformed`] if the address is anything else.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use keyrelay_core::Endpoint;
    ///
    /// let ep = Endpoint::parse(" 10.0.0.5 ", 38745).unwrap();
    /// assert_eq!(ep.ws_url(), "ws://10.0.0.5:38745");
    ///
    /// let ep = Endpoint::parse("fe80::1", 38745).unwrap();
    /// assert_eq!(ep.ws_url(), "ws://[fe80::1]:38745");
    /// ```
    pub fn parse(address: &str, port: u16) -> Result<Self, EndpointError> {
        if port == 0 {
            return Err(EndpointError::InvalidPort(port));
        }

        let trimmed = address.trim();

        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return Ok(Self {
                host: Host::Ip(ip),
                port,
            });
        }

        if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return inner
                .parse::<Ipv6Addr>()
                .map(|ip| Self {
                    host: Host::Ip(IpAddr::V6(ip)),
                    port,
                })
                .map_err(|_| EndpointError::Malformed(address.to_string()));
        }

        if is_valid_hostname(trimmed) {
            return Ok(Self {
                host: Host::Name(trimmed.to_ascii_lowercase()),
                port,
            });
        }

        Err(EndpointError::Malformed(address.to_string()))
    }

    /// The relay port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Renders the WebSocket URL for this endpoint (`ws://host:port`).
    pub fn ws_url(&self) -> String {
        format!("ws://{self}")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ip(IpAddr::V6(ip)) => write!(f, "[{ip}]:{}", self.port),
            Host::Ip(IpAddr::V4(ip)) => write!(f, "{ip}:{}", self.port),
            Host::Name(name) => write!(f, "{name}:{}", self.port),
        }
    }
}

/// RFC 1123 hostname check: dot-separated labels of ASCII alphanumerics and
/// hyphens, no empty labels, no leading/trailing hyphen, at most 253 chars.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }
    // A trailing dot marks a fully qualified name.
    let s = s.strip_suffix('.').unwrap_or(s);
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

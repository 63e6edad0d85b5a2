//! KeyRelay desktop host: entry point.
//!
//! Listens for device relay links and replays their keystrokes into a
//! per-session [`TextMirror`], logging the mirrored text after every
//! message.  A real desktop would inject the keystrokes into the focused
//! window instead.
//!
//! # Usage
//!
//! ```text
//! keyrelay-host [OPTIONS]
//!
//! Options:
//!   --bind <IP>     Address to listen on [default: 0.0.0.0]
//!   --port <PORT>   Relay port [default: 38745]
//! ```
//!
//! | Variable              | Default   | Description        |
//! |-----------------------|-----------|--------------------|
//! | `KEYRELAY_HOST_BIND`  | `0.0.0.0` | Listen address     |
//! | `KEYRELAY_HOST_PORT`  | `38745`   | Relay port         |

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keyrelay_core::DEFAULT_RELAY_PORT;
use keyrelay_host::application::TextMirror;
use keyrelay_host::domain::HostConfig;
use keyrelay_host::infrastructure::{bind_host, serve, HostEvent};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// KeyRelay desktop host.
#[derive(Debug, Parser)]
#[command(
    name = "keyrelay-host",
    about = "Accept KeyRelay device links and mirror what they type",
    version
)]
struct Cli {
    /// IP address to bind the relay listener to.
    #[arg(long, default_value = "0.0.0.0", env = "KEYRELAY_HOST_BIND")]
    bind: String,

    /// TCP port for the relay listener.
    #[arg(long, default_value_t = DEFAULT_RELAY_PORT, env = "KEYRELAY_HOST_PORT")]
    port: u16,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`HostConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not an IP address.
    fn into_host_config(self) -> anyhow::Result<HostConfig> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address: '{}'", self.bind))?;
        Ok(HostConfig {
            bind_addr: SocketAddr::new(ip, self.port),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_host_config()?;
    info!("KeyRelay host starting on {}", config.bind_addr);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let (events_tx, events_rx) = mpsc::channel(256);
    tokio::spawn(mirror_sessions(events_rx));

    let listener = bind_host(&config).await?;
    serve(listener, running, events_tx).await?;

    info!("KeyRelay host stopped");
    Ok(())
}

/// Keeps one [`TextMirror`] per session and logs it after every message.
async fn mirror_sessions(mut events: mpsc::Receiver<HostEvent>) {
    let mut mirrors: HashMap<uuid::Uuid, TextMirror> = HashMap::new();
    while let Some(event) = events.recv().await {
        let mirror = mirrors.entry(event.session_id).or_default();
        mirror.apply(&event.message);
        info!(
            "session {} ({}): {} → {:?}",
            event.session_id,
            event.peer,
            event.message.kind(),
            mirror.text()
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_bind_all_interfaces_on_relay_port() {
        // Arrange
        let cli = Cli::parse_from(["keyrelay-host"]);

        // Act
        let config = cli.into_host_config().unwrap();

        // Assert
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_cli_overrides_bind_and_port() {
        let cli = Cli::parse_from(["keyrelay-host", "--bind", "127.0.0.1", "--port", "9000"]);
        let config = cli.into_host_config().unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_cli_accepts_ipv6_bind() {
        let cli = Cli::parse_from(["keyrelay-host", "--bind", "::"]);
        let config = cli.into_host_config().unwrap();
        assert!(config.bind_addr.is_ipv6());
    }

    #[test]
    fn test_invalid_bind_returns_error() {
        let cli = Cli {
            bind: "not.an.ip".to_string(),
            port: 38745,
        };
        assert!(cli.into_host_config().is_err());
    }
}

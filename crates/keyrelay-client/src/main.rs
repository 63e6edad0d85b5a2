//! KeyRelay device client: entry point.
//!
//! A terminal stand-in for the device's floating input surface.  Each line
//! read from stdin is treated as the *entire* current content of the local
//! input box; the client diffs it against what it last sent and types the
//! difference on the desktop.
//!
//! # Usage
//!
//! ```text
//! keyrelay-client [OPTIONS]
//!
//! Options:
//!   --endpoints <ADDR,...>     Candidate desktop addresses, tried in order
//!   --port <PORT>              Relay port [default: 38745]
//!   --config <PATH>            Config file [default: platform config dir]
//!   --connect-timeout <SECS>   Per-candidate connect timeout
//! ```
//!
//! Without `--endpoints` the client resumes with the set saved by the last
//! run.
//!
//! # Input commands
//!
//! | Line          | Effect                                            |
//! |---------------|---------------------------------------------------|
//! | any text      | New content of the input box; the edit is sent    |
//! | `/enter`      | Press Enter on the desktop                        |
//! | `/clear`      | Clear the local box without touching the desktop  |
//! | `/key NAME`   | Press a named key (`Tab`, `ArrowLeft`, ...)       |
//! | `/stop`       | Disconnect and stay idle                          |
//! | `/start`      | Reconnect using the saved endpoint set            |
//! | `/status`     | Show the link state                               |
//! | `/quit`       | Exit                                              |
//! | `//text`      | Literal text starting with `/`                    |
//!
//! # Environment variable overrides
//!
//! | Variable                    | Description                     |
//! |-----------------------------|---------------------------------|
//! | `KEYRELAY_ENDPOINTS`        | Comma-separated addresses       |
//! | `KEYRELAY_PORT`             | Relay port                      |
//! | `KEYRELAY_CONFIG`           | Config file path                |
//! | `KEYRELAY_CONNECT_TIMEOUT`  | Connect timeout (secs)          |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keyrelay_client::application::connection_manager::{
    ConnectionHandle, ConnectionManager, DeliveryError, StatusEvent,
};
use keyrelay_client::application::text_sync::TextSyncEngine;
use keyrelay_client::infrastructure::network::WsDialer;
use keyrelay_client::infrastructure::storage::config::{
    config_file_path, load_config_from, AppConfig, RelayConfig, TomlEndpointStore,
};
use keyrelay_core::{EndpointSet, LinkState, RelayKey, DEFAULT_RELAY_PORT};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// KeyRelay device client.
///
/// Keeps a relay link to the desktop and types what you enter on stdin.
#[derive(Debug, Parser)]
#[command(
    name = "keyrelay-client",
    about = "Relay keystrokes from this terminal to a KeyRelay desktop",
    version
)]
struct Cli {
    /// Candidate desktop addresses, tried in the order given.
    ///
    /// When omitted, the endpoint set saved by the previous run is used.
    #[arg(long, value_delimiter = ',', env = "KEYRELAY_ENDPOINTS")]
    endpoints: Vec<String>,

    /// Relay port shared by every candidate address.
    #[arg(long, default_value_t = DEFAULT_RELAY_PORT, env = "KEYRELAY_PORT")]
    port: u16,

    /// Path of the TOML config file.
    #[arg(long, env = "KEYRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds each candidate gets to open before the next one is tried.
    ///
    /// Overrides `relay.connect_timeout_secs` from the config file.
    #[arg(long, env = "KEYRELAY_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,
}

/// Effective settings after merging the config file with the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    relay: RelayConfig,
    /// `Some` when the command line supplied endpoints; `None` means resume.
    endpoints: Option<EndpointSet>,
}

impl Cli {
    /// Resolves the config file path: `--config`, else the platform default.
    ///
    /// # Errors
    ///
    /// Returns an error if no `--config` was given and the platform config
    /// directory cannot be determined.
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("no --config given and no platform config dir"),
        }
    }

    /// Merges the command line over `file`.  Command-line values win.
    fn into_settings(self, file: AppConfig) -> Settings {
        let mut relay = file.relay;
        if let Some(secs) = self.connect_timeout {
            relay.connect_timeout_secs = secs;
        }

        let endpoints = (!self.endpoints.is_empty())
            .then(|| EndpointSet::new(self.endpoints, self.port));

        Settings { relay, endpoints }
    }
}

// ── Input lines ───────────────────────────────────────────────────────────────

/// One line of stdin, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Text(String),
    Enter,
    Clear,
    Key(RelayKey),
    UnknownKey(String),
    Start,
    Stop,
    Status,
    Quit,
}

fn parse_input(line: &str) -> Input {
    if let Some(literal) = line.strip_prefix("//") {
        return Input::Text(format!("/{literal}"));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Text(line.to_string());
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, a)| (n, a.trim()));

    match name {
        "enter" => Input::Enter,
        "clear" => Input::Clear,
        "key" => RelayKey::from_name(arg)
            .map_or_else(|| Input::UnknownKey(arg.to_string()), Input::Key),
        "start" => Input::Start,
        "stop" => Input::Stop,
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        _ => Input::Text(line.to_string()),
    }
}

/// Applies one input line.  Returns `false` when the user asked to quit.
fn handle_input(input: Input, engine: &mut TextSyncEngine, handle: &ConnectionHandle) -> bool {
    match input {
        Input::Text(text) => report_delivery(engine.on_local_text_changed(&text)),
        Input::Enter => report_delivery(engine.on_enter_pressed().delivery),
        Input::Clear => engine.on_local_clear(),
        Input::Key(key) => report_delivery(engine.press_key(key)),
        Input::UnknownKey(name) => eprintln!("unknown key {name:?}"),
        Input::Start => handle.resume(),
        Input::Stop => handle.stop(),
        Input::Status => println!(
            "{} ({} chars sent)",
            handle.state(),
            engine.last_sent().chars().count()
        ),
        Input::Quit => return false,
    }
    true
}

fn report_delivery(result: Result<(), DeliveryError>) {
    match result {
        Ok(()) => {}
        Err(DeliveryError::NotConnected { .. }) => eprintln!("Not connected to desktop"),
        Err(e) => warn!("could not send: {e}"),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path()?;
    let file_config = load_config_from(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let settings = cli.into_settings(file_config);

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the level from the config file applies.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.relay.log_level)),
        )
        .init();

    info!("KeyRelay client starting, config {}", config_path.display());

    // ── Connection manager ────────────────────────────────────────────────────
    let store = Arc::new(TomlEndpointStore::new(&config_path));
    let (handle, mut status) = ConnectionManager::spawn(
        WsDialer::new(settings.relay.dialer_config()),
        store,
        settings.relay.manager_config(),
    );

    match settings.endpoints {
        Some(endpoints) => handle.start(endpoints),
        None => {
            info!("no --endpoints given; resuming with the saved endpoint set");
            handle.resume();
        }
    }

    tokio::spawn(async move {
        while let Some(event) = status.recv().await {
            match event {
                StatusEvent::Connected { endpoint } => eprintln!("● connected to {endpoint}"),
                StatusEvent::Disconnected => eprintln!("○ disconnected"),
            }
        }
    });

    // ── Input loop ────────────────────────────────────────────────────────────
    let mut engine = TextSyncEngine::new(handle.link());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_input(parse_input(&line), &mut engine, &handle) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!("failed to listen for Ctrl+C signal: {e}");
                }
                info!("received Ctrl+C, shutting down");
                break;
            }
        }
    }

    // Give the manager a moment to close the socket cleanly.
    handle.stop();
    let mut state = handle.watch_state();
    let _ = tokio::time::timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s == LinkState::Idle),
    )
    .await;

    info!("KeyRelay client stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from devices.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Decoding every text frame as a [`RelayMessage`], forwarding it to the
//!    application as a [`HostEvent`], and answering with an `ack` frame.
//! 5. Gracefully shutting down when the `running` flag is cleared.
//!
//! A frame that does not decode is logged and skipped; the session stays up.
//! Each device session runs in its own Tokio task, so one slow device never
//! blocks another.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use keyrelay_core::{decode_message, encode_host_message, HostMessage, RelayMessage};

use crate::domain::HostConfig;

/// A relay message received from one device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    pub session_id: Uuid,
    pub peer: SocketAddr,
    pub message: RelayMessage,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the relay listener on `config.bind_addr`.
///
/// # Errors
///
/// Returns an error if the port is already in use or the process lacks
/// permission to bind.
pub async fn bind_host(config: &HostConfig) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {}", config.bind_addr))?;
    info!("relay listening on {}", config.bind_addr);
    Ok(listener)
}

/// Runs the accept loop until `running` is set to `false`.
///
/// Every decoded message is sent on `events`.  When the receiver is dropped,
/// sessions end at their next message.
///
/// # Errors
///
/// Currently infallible once bound; accept errors are logged and the loop
/// continues.
pub async fn serve(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    events: mpsc::Sender<HostEvent>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short accept timeout lets the loop notice the shutdown flag even
        // when no device is connecting.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                let session_id = Uuid::new_v4();
                info!("session {session_id}: new device connection from {peer}");
                let events = events.clone();
                tokio::spawn(async move {
                    handle_device_session(stream, peer, session_id, events).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_device_session(
    stream: TcpStream,
    peer: SocketAddr,
    session_id: Uuid,
    events: mpsc::Sender<HostEvent>,
) {
    match run_session(stream, peer, session_id, events).await {
        Ok(()) => info!("session {session_id}: closed normally"),
        Err(e) => warn!("session {session_id}: closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    session_id: Uuid,
    events: mpsc::Sender<HostEvent>,
) -> anyhow::Result<()> {
    let ws = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer}"))?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    // Ack ids count the messages accepted on this session.
    let mut accepted: u64 = 0;

    loop {
        let frame = match ws_rx.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => {
                debug!("session {session_id}: stream ended");
                return Ok(());
            }
            Some(Err(e)) => return Err(e).context("WebSocket read failed"),
        };

        match frame {
            WsMessage::Text(text) => {
                let message = match decode_message(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("session {session_id}: invalid relay frame: {e}");
                        continue;
                    }
                };
                debug!("session {session_id}: {} message", message.kind());

                let event = HostEvent {
                    session_id,
                    peer,
                    message,
                };
                if events.send(event).await.is_err() {
                    debug!("session {session_id}: event receiver gone; ending session");
                    return Ok(());
                }

                accepted += 1;
                let ack = encode_host_message(&HostMessage::Ack {
                    id: Some(accepted),
                    success: true,
                })?;
                ws_tx
                    .send(WsMessage::Text(ack))
                    .await
                    .context("failed to send ack")?;
            }
            WsMessage::Binary(_) => {
                warn!("session {session_id}: unexpected binary frame (ignored)");
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            WsMessage::Close(_) => {
                debug!("session {session_id}: Close frame received");
                return Ok(());
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

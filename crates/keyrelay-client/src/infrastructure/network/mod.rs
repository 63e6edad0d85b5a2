//! Network infrastructure for the device client.
//!
//! [`WsDialer`] is the production [`Dialer`]: every `dial` spawns one Tokio
//! task that owns one WebSocket for its whole life.
//!
//! Architecture:
//! - The task opens the socket with `connect_async` and reports `Opened`.
//! - Outbound frames arrive on the attempt's unbounded channel and are
//!   written as WebSocket text frames.
//! - Inbound text frames are reported as `MessageReceived`.
//! - A WebSocket Ping goes out every `keepalive_interval`; if nothing at all
//!   arrives from the desktop for `keepalive_timeout` the link is reported
//!   dead.  A half-open TCP connection (laptop lid closed, Wi-Fi dropped)
//!   would otherwise look healthy forever.
//! - A zero interval turns pings off and a zero timeout turns the silence
//!   check off; the link then lives until the socket itself fails.
//! - When the manager drops or closes the attempt handle the task closes the
//!   socket and exits without reporting anything further.
//!
//! The connect timeout is deliberately absent here: the connection manager
//! owns it and simply drops the handle when it expires, which aborts the
//! pending `connect_async`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, trace};

use keyrelay_core::Endpoint;

use crate::application::connection_manager::{
    AttemptError, AttemptEvent, AttemptHandle, AttemptId, AttemptReport, Dialer, Outbound,
};

/// Keepalive tuning for [`WsDialer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsDialerConfig {
    /// How often to send a WebSocket Ping on an open link.  Zero sends none.
    pub keepalive_interval: Duration,
    /// How long the desktop may stay completely silent before the link is
    /// considered dead.  Zero never gives up on a quiet link.
    pub keepalive_timeout: Duration,
}

impl Default for WsDialerConfig {
    /// | Field              | Default |
    /// |--------------------|---------|
    /// | keepalive_interval | 10 s    |
    /// | keepalive_timeout  | 20 s    |
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(10),
            keepalive_timeout: Duration::from_secs(20),
        }
    }
}

/// Opens relay links with tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WsDialer {
    config: WsDialerConfig,
}

impl WsDialer {
    pub fn new(config: WsDialerConfig) -> Self {
        Self { config }
    }
}

impl Dialer for WsDialer {
    fn dial(
        &self,
        endpoint: Endpoint,
        attempt: AttemptId,
        reports: mpsc::UnboundedSender<AttemptReport>,
    ) -> AttemptHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = SocketTask {
            url: endpoint.ws_url(),
            attempt,
            reports,
            outbound: outbound_rx,
            config: self.config,
        };
        tokio::spawn(task.run());
        AttemptHandle::new(outbound_tx)
    }
}

// ── Socket task ───────────────────────────────────────────────────────────────

struct SocketTask {
    url: String,
    attempt: AttemptId,
    reports: mpsc::UnboundedSender<AttemptReport>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    config: WsDialerConfig,
}

impl SocketTask {
    fn report(&self, event: AttemptEvent) {
        // The manager outlives every attempt it cares about; a send error
        // means it has shut down and nobody needs this event.
        let _ = self.reports.send(AttemptReport {
            attempt: self.attempt,
            event,
        });
    }

    async fn run(mut self) {
        debug!("opening {} ({:?})", self.url, self.attempt);

        // ── Step 1: handshake, abandoned if the manager lets go ──────────────
        let connected = tokio::select! {
            result = connect_async(self.url.as_str()) => result,
            _ = self.outbound.recv() => {
                trace!("attempt {:?} abandoned before opening", self.attempt);
                return;
            }
        };

        let ws = match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                self.report(AttemptEvent::Failed(AttemptError::Connect(e.to_string())));
                return;
            }
        };
        self.report(AttemptEvent::Opened);

        // ── Step 2: pump frames until either side closes ─────────────────────
        let (mut sink, mut stream) = ws.split();

        let mut ping = ping_interval(self.config.keepalive_interval);
        let mut last_heard = Instant::now();

        loop {
            let silence_deadline = (!self.config.keepalive_timeout.is_zero())
                .then(|| last_heard + self.config.keepalive_timeout);

            tokio::select! {
                command = self.outbound.recv() => match command {
                    Some(Outbound::Frame(text)) => {
                        if let Err(e) = sink.send(WsMessage::Text(text)).await {
                            self.report(AttemptEvent::Failed(AttemptError::Transport(e.to_string())));
                            return;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        debug!("closing {} ({:?})", self.url, self.attempt);
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return;
                    }
                },

                frame = stream.next() => {
                    last_heard = Instant::now();
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            self.report(AttemptEvent::MessageReceived(text));
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                                .unwrap_or_default();
                            self.report(AttemptEvent::Closed { code, reason, remote: true });
                            return;
                        }
                        Some(Ok(other)) => {
                            // Pings are answered by tungstenite itself.
                            trace!("non-text frame from desktop ({} bytes)", other.len());
                        }
                        Some(Err(e)) => {
                            self.report(AttemptEvent::Failed(AttemptError::Transport(e.to_string())));
                            return;
                        }
                        None => {
                            self.report(AttemptEvent::Closed {
                                code: None,
                                reason: "stream ended".to_string(),
                                remote: true,
                            });
                            return;
                        }
                    }
                }

                () = next_ping(&mut ping) => {
                    if let Err(e) = sink.send(WsMessage::Ping(Vec::new())).await {
                        self.report(AttemptEvent::Failed(AttemptError::Transport(e.to_string())));
                        return;
                    }
                    trace!("keepalive ping sent to {}", self.url);
                }

                () = wait_until(silence_deadline) => {
                    self.report(AttemptEvent::Failed(AttemptError::KeepaliveTimeout(
                        self.config.keepalive_timeout,
                    )));
                    return;
                }
            }
        }
    }
}

/// `None` when pings are off.  `tokio::time::interval` panics on a zero period.
fn ping_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ping = interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ping)
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(ping) => {
            ping.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(due: Option<Instant>) {
    match due {
        Some(due) => sleep_until(due).await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! ConnectionManager: keeps one relay link to the desktop alive.
//!
//! The manager walks the candidate endpoints in order, gives each attempt a
//! bounded time to open, falls over to the next candidate on failure, and
//! once the list is exhausted waits out a linear-capped backoff before
//! starting over from the first candidate.
//!
//! # Concurrency model
//!
//! All state lives in one Tokio task (the actor).  Everything else talks to it
//! through channels:
//!
//! ```text
//!   ConnectionHandle ──Command──▶ ┌────────────┐ ──watch<LinkState>────────▶ observers
//!                                 │   actor    │ ──watch<Option<LinkSender>>▶ text sync
//!   socket tasks ──AttemptReport─▶│ (one task) │ ──StatusEvent─────────────▶ UI / logs
//!                                 └────────────┘
//!                                      │ dial()
//!                                      ▼
//!                                   Dialer
//! ```
//!
//! Socket tasks may report long after the manager has given up on them.  Every
//! report carries the [`AttemptId`] it was dialled with, and a report is only
//! acted on when that id is the attempt currently in flight *and* its
//! generation is still current.  Timers are checked the same way when they
//! fire, so a cancelled reconnect or connect timeout can never resurrect a
//! cycle that was torn down.

use std::sync::Arc;
use std::time::Duration;

use keyrelay_core::{
    decode_host_message, encode_message, BackoffPolicy, Endpoint, EndpointError, EndpointSet,
    Generation, GenerationCounter, HostMessage, LinkState, ProtocolError, RelayMessage,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::application::endpoint_store::EndpointStore;

/// How long one candidate gets to complete the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

// ── Attempts ──────────────────────────────────────────────────────────────────

/// Identifies one connection attempt: which cycle it belongs to and which
/// candidate it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptId {
    pub generation: Generation,
    pub candidate: usize,
}

/// Why an attempt, or an open link, failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no traffic from desktop for {0:?}")]
    KeepaliveTimeout(Duration),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// What a socket task observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    /// The WebSocket handshake completed.
    Opened,
    /// A text frame arrived from the desktop.
    MessageReceived(String),
    /// The socket closed.  `remote` is `true` when the desktop initiated it.
    Closed {
        code: Option<u16>,
        reason: String,
        remote: bool,
    },
    /// The attempt or link failed.
    Failed(AttemptError),
}

/// An [`AttemptEvent`] tagged with the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub attempt: AttemptId,
    pub event: AttemptEvent,
}

/// Instructions from the manager to a socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send one text frame.
    Frame(String),
    /// Close the socket and stop reporting.
    Close,
}

/// The manager's grip on an attempt.
///
/// Dropping the handle closes the outbound channel, which socket tasks treat
/// the same as [`Outbound::Close`].
#[derive(Debug)]
pub struct AttemptHandle {
    pub(crate) outbound: mpsc::UnboundedSender<Outbound>,
}

impl AttemptHandle {
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { outbound }
    }

    fn close(self) {
        // The socket task may already be gone.
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Opens relay sockets.
///
/// `dial` must return immediately; the outcome arrives later as
/// [`AttemptReport`]s on `reports`, each tagged with `attempt`.  The manager
/// owns the connect timeout, so implementations need not enforce one.
pub trait Dialer: Send + 'static {
    fn dial(
        &self,
        endpoint: Endpoint,
        attempt: AttemptId,
        reports: mpsc::UnboundedSender<AttemptReport>,
    ) -> AttemptHandle;
}

// ── Sending ───────────────────────────────────────────────────────────────────

/// A message could not be delivered to the desktop.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// There is no open link, or it closed underneath the sender.
    #[error("not connected to desktop ({dropped} message(s) dropped)")]
    NotConnected { dropped: usize },

    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Send capability for the link that is open right now.
///
/// Published by the manager while `Connected` and withdrawn the moment the
/// link is lost.  A stale clone fails with [`DeliveryError::NotConnected`]
/// once the manager has moved past its generation or its socket task is gone.
#[derive(Debug, Clone)]
pub struct LinkSender {
    generation: Generation,
    counter: Arc<GenerationCounter>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl LinkSender {
    /// The generation of the link this sender writes to.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn for_tests(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        let counter = Arc::new(GenerationCounter::new());
        Self {
            generation: counter.current(),
            counter,
            outbound,
        }
    }

    /// Queues one message on the link.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::Encode`] if the message cannot be serialized.
    /// - [`DeliveryError::NotConnected`] if the link was torn down or the
    ///   socket task has exited.
    pub fn send(&self, msg: &RelayMessage) -> Result<(), DeliveryError> {
        if !self.counter.is_current(self.generation) {
            return Err(DeliveryError::NotConnected { dropped: 1 });
        }
        let frame = encode_message(msg)?;
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| DeliveryError::NotConnected { dropped: 1 })
    }
}

// ── Notifications and configuration ───────────────────────────────────────────

/// Coarse link notifications for the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A link opened to `endpoint` (`host:port`).
    Connected { endpoint: String },
    /// The open link went away, whether it dropped or was stopped.
    Disconnected,
}

/// Tunables for the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    pub connect_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            backoff: BackoffPolicy::default(),
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Command {
    Start(EndpointSet),
    Resume,
    Stop,
}

/// Cloneable front end of the manager actor.
///
/// The actor shuts down, closing any open link, once every handle is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<LinkState>,
    link: watch::Receiver<Option<LinkSender>>,
    generation: Arc<GenerationCounter>,
}

impl ConnectionHandle {
    /// Replaces the endpoint set, persists it, and connects.
    ///
    /// While `Connected` the current link is kept and the new set takes
    /// effect on the next cycle.  Otherwise any attempt or pending reconnect
    /// is abandoned and a fresh cycle starts from the first candidate.  An
    /// empty set or port 0 leaves the manager idle.
    pub fn start(&self, endpoints: EndpointSet) {
        self.send(Command::Start(endpoints));
    }

    /// Connects using the endpoint set last persisted by [`start`](Self::start).
    ///
    /// Does nothing if no set was ever stored.
    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    /// Closes the link, cancels any pending reconnect, and goes idle.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// A receiver for the current send capability (`None` while not connected).
    pub fn link(&self) -> watch::Receiver<Option<LinkSender>> {
        self.link.clone()
    }

    pub fn generation(&self) -> Generation {
        self.generation.current()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("connection manager has shut down; command ignored");
        }
    }
}

// ── Actor ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    ConnectTimeout(AttemptId),
    Reconnect(Generation),
}

/// The single pending timer.  Connect timeouts and reconnects never overlap.
#[derive(Debug, Clone, Copy)]
struct Timer {
    due: Instant,
    kind: TimerKind,
}

#[derive(Debug)]
struct ActiveAttempt {
    id: AttemptId,
    endpoint: Endpoint,
    handle: AttemptHandle,
}

/// The manager actor.  Construct it with [`ConnectionManager::spawn`].
pub struct ConnectionManager<D: Dialer> {
    dialer: D,
    store: Arc<dyn EndpointStore>,
    config: ManagerConfig,
    generation: Arc<GenerationCounter>,
    endpoints: Option<EndpointSet>,
    state: LinkState,
    /// Consecutive cycles in which every candidate failed.  Reset on open.
    failures: u32,
    attempt: Option<ActiveAttempt>,
    timer: Option<Timer>,
    state_tx: watch::Sender<LinkState>,
    link_tx: watch::Sender<Option<LinkSender>>,
    status_tx: mpsc::UnboundedSender<StatusEvent>,
    reports_tx: mpsc::UnboundedSender<AttemptReport>,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Spawns the actor on the current Tokio runtime.
    ///
    /// Returns the handle used to drive it and the stream of
    /// [`StatusEvent`]s.  Must be called from within a runtime.
    pub fn spawn(
        dialer: D,
        store: Arc<dyn EndpointStore>,
        config: ManagerConfig,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<StatusEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Idle);
        let (link_tx, link_rx) = watch::channel(None);
        let generation = Arc::new(GenerationCounter::new());

        let manager = Self {
            dialer,
            store,
            config,
            generation: Arc::clone(&generation),
            endpoints: None,
            state: LinkState::Idle,
            failures: 0,
            attempt: None,
            timer: None,
            state_tx,
            link_tx,
            status_tx,
            reports_tx,
        };

        tokio::spawn(manager.run(commands_rx, reports_rx));

        let handle = ConnectionHandle {
            commands: commands_tx,
            state: state_rx,
            link: link_rx,
            generation,
        };
        (handle, status_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut reports: mpsc::UnboundedReceiver<AttemptReport>,
    ) {
        loop {
            let due = self.timer.map(|t| t.due);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start(endpoints)) => self.start(endpoints),
                    Some(Command::Resume) => self.resume(),
                    Some(Command::Stop) => self.stop(),
                    None => {
                        debug!("all connection handles dropped; shutting down");
                        self.stop();
                        break;
                    }
                },
                Some(report) = reports.recv() => self.handle_report(report),
                () = wait_until(due) => self.handle_timer(),
            }
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn start(&mut self, endpoints: EndpointSet) {
        if let Err(e) = self.store.save(&endpoints) {
            warn!("could not persist endpoint set: {e}");
        }
        self.replace_endpoints(endpoints);
    }

    fn resume(&mut self) {
        match self.store.load() {
            Ok(Some(endpoints)) => self.replace_endpoints(endpoints),
            Ok(None) => info!("no stored endpoint set; staying {}", self.state),
            Err(e) => warn!("could not load endpoint set: {e}"),
        }
    }

    fn stop(&mut self) {
        self.teardown();
        self.set_state(LinkState::Idle);
        info!("relay link stopped ({})", self.generation.current());
    }

    fn replace_endpoints(&mut self, endpoints: EndpointSet) {
        self.endpoints = Some(endpoints);
        if self.state.is_connected() {
            debug!("already connected; new endpoint set applies from the next cycle");
            return;
        }
        self.begin_cycle();
    }

    // ── Cycle ─────────────────────────────────────────────────────────────────

    /// Abandons whatever is in flight and tries the first candidate under a
    /// new generation.
    fn begin_cycle(&mut self) {
        let generation = self.teardown();
        match &self.endpoints {
            Some(endpoints) if endpoints.is_usable() => {
                info!(
                    "connecting to desktop: {} candidate(s) on port {} ({generation})",
                    endpoints.len(),
                    endpoints.port
                );
                self.try_candidate(0);
            }
            _ => {
                info!("no usable endpoints; staying idle");
                self.set_state(LinkState::Idle);
            }
        }
    }

    /// Dials the first parseable candidate at or after `index`, or enters
    /// backoff once the list is exhausted.
    fn try_candidate(&mut self, mut index: usize) {
        let Some(endpoints) = self.endpoints.clone() else {
            self.set_state(LinkState::Idle);
            return;
        };
        let generation = self.generation.current();

        while let Some(parsed) = endpoints.endpoint(index) {
            match parsed {
                Ok(endpoint) => {
                    let id = AttemptId {
                        generation,
                        candidate: index,
                    };
                    debug!(
                        "dialling {} (candidate {}/{}, {generation})",
                        endpoint.ws_url(),
                        index + 1,
                        endpoints.len()
                    );
                    let handle = self
                        .dialer
                        .dial(endpoint.clone(), id, self.reports_tx.clone());
                    self.attempt = Some(ActiveAttempt {
                        id,
                        endpoint,
                        handle,
                    });
                    self.timer = Some(Timer {
                        due: Instant::now() + self.config.connect_timeout,
                        kind: TimerKind::ConnectTimeout(id),
                    });
                    self.set_state(LinkState::Connecting {
                        candidate: index,
                        generation,
                    });
                    return;
                }
                Err(e) => {
                    warn!("skipping candidate {}: {}", index + 1, AttemptError::from(e));
                    index += 1;
                }
            }
        }

        info!("all {} candidate(s) failed", endpoints.len());
        self.enter_backoff();
    }

    fn enter_backoff(&mut self) {
        self.drop_attempt();
        self.failures = self.failures.saturating_add(1);
        let delay = self.config.backoff.delay(self.failures);
        let due = Instant::now() + delay;

        self.timer = Some(Timer {
            due,
            kind: TimerKind::Reconnect(self.generation.current()),
        });
        info!("reconnecting in {delay:?} (attempt {})", self.failures);
        self.set_state(LinkState::Backoff {
            attempt: self.failures,
            due: due.into_std(),
        });
    }

    /// Advances the generation and releases everything tied to the old one.
    fn teardown(&mut self) -> Generation {
        let generation = self.generation.advance();
        self.timer = None;
        self.drop_attempt();
        if self.state.is_connected() {
            self.link_tx.send_replace(None);
            self.notify(StatusEvent::Disconnected);
        }
        generation
    }

    fn drop_attempt(&mut self) {
        if let Some(active) = self.attempt.take() {
            active.handle.close();
        }
    }

    // ── Reports ───────────────────────────────────────────────────────────────

    fn handle_report(&mut self, report: AttemptReport) {
        let AttemptReport { attempt, event } = report;

        let is_active = self.attempt.as_ref().is_some_and(|a| a.id == attempt)
            && self.generation.is_current(attempt.generation);
        if !is_active {
            trace!("discarding stale report from {attempt:?}: {event:?}");
            return;
        }

        match (self.state, event) {
            (LinkState::Connecting { .. }, AttemptEvent::Opened) => self.on_opened(),
            (LinkState::Connecting { .. }, AttemptEvent::Failed(e)) => {
                warn!("candidate {} failed: {e}", attempt.candidate + 1);
                self.next_candidate(attempt);
            }
            (LinkState::Connecting { .. }, AttemptEvent::Closed { code, reason, .. }) => {
                warn!(
                    "candidate {} closed before opening (code {code:?}, {reason:?})",
                    attempt.candidate + 1
                );
                self.next_candidate(attempt);
            }
            (LinkState::Connected { .. }, AttemptEvent::Failed(e)) => {
                warn!("relay link failed: {e}");
                self.on_link_lost();
            }
            (
                LinkState::Connected { .. },
                AttemptEvent::Closed {
                    code,
                    reason,
                    remote,
                },
            ) => {
                info!("relay link closed (code {code:?}, reason {reason:?}, remote {remote})");
                self.on_link_lost();
            }
            (_, AttemptEvent::MessageReceived(frame)) => log_host_frame(&frame),
            (state, event) => trace!("ignoring {event:?} in state {state}"),
        }
    }

    fn next_candidate(&mut self, failed: AttemptId) {
        self.timer = None;
        self.drop_attempt();
        self.try_candidate(failed.candidate + 1);
    }

    fn on_opened(&mut self) {
        let Some(active) = &self.attempt else {
            return;
        };
        let generation = active.id.generation;
        let endpoint = active.endpoint.to_string();
        let sender = LinkSender {
            generation,
            counter: Arc::clone(&self.generation),
            outbound: active.handle.outbound.clone(),
        };

        self.timer = None;
        self.failures = 0;
        self.link_tx.send_replace(Some(sender));
        self.set_state(LinkState::Connected { generation });
        info!("connected to desktop at {endpoint} ({generation})");
        self.notify(StatusEvent::Connected { endpoint });
    }

    fn on_link_lost(&mut self) {
        self.drop_attempt();
        self.link_tx.send_replace(None);
        self.notify(StatusEvent::Disconnected);
        self.enter_backoff();
    }

    // ── Timer ─────────────────────────────────────────────────────────────────

    fn handle_timer(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };

        match timer.kind {
            TimerKind::ConnectTimeout(id) => {
                let still_waiting = self.attempt.as_ref().is_some_and(|a| a.id == id)
                    && self.generation.is_current(id.generation);
                if !still_waiting {
                    trace!("discarding stale connect timeout for {id:?}");
                    return;
                }
                warn!(
                    "candidate {} failed: {}",
                    id.candidate + 1,
                    AttemptError::Timeout(self.config.connect_timeout)
                );
                self.next_candidate(id);
            }
            TimerKind::Reconnect(generation) => {
                if !self.generation.is_current(generation) {
                    trace!("discarding stale reconnect timer for {generation}");
                    return;
                }
                self.begin_cycle();
            }
        }
    }

    // ── Publishing ────────────────────────────────────────────────────────────

    fn set_state(&mut self, state: LinkState) {
        if self.state != state {
            debug!("link state: {} → {state}", self.state);
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn notify(&self, event: StatusEvent) {
        // Nobody listening is fine.
        let _ = self.status_tx.send(event);
    }
}

async fn wait_until(due: Option<Instant>) {
    match due {
        Some(due) => sleep_until(due).await,
        None => std::future::pending().await,
    }
}

fn log_host_frame(frame: &str) {
    match decode_host_message(frame) {
        Ok(HostMessage::Ack { id, success }) => debug!("desktop ack (id {id:?}, success {success})"),
        Ok(HostMessage::Error { error }) => warn!("desktop reported an error: {error}"),
        Ok(HostMessage::Other) => trace!("unrecognised desktop message ignored"),
        Err(e) => debug!("undecodable desktop frame ignored: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

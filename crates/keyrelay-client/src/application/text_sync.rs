//! TextSyncEngine: streams local edits to the desktop as keystrokes.
//!
//! The engine remembers the text it last sent (`last_sent`).  On every local
//! edit it plans the shared-prefix edit from `last_sent` to the new text,
//! sends it over whatever link the connection manager currently publishes,
//! and then adopts the new text as `last_sent`.
//!
//! There is no acknowledgement channel, so `last_sent` is advanced even when
//! delivery fails.  Keystrokes that could not be sent are gone: nothing is
//! buffered for a later reconnect.
//!
//! The engine never touches a socket.  It only holds the
//! `watch::Receiver<Option<LinkSender>>` the manager hands out, so it cannot
//! write to a link that has already been torn down.

use keyrelay_core::{plan_edit, RelayKey, RelayMessage};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::application::connection_manager::{DeliveryError, LinkSender};

/// What happened when the user pressed Enter.
#[derive(Debug)]
pub struct EnterOutcome {
    /// Always `true`: the input surface must not insert a newline locally,
    /// whether or not the key reached the desktop.
    pub suppress_local_newline: bool,
    /// Whether `Enter` was delivered.
    pub delivery: Result<(), DeliveryError>,
}

/// Owns the sync cursor and turns local edits into relay messages.
///
/// All methods take `&mut self`; the engine belongs to whichever task
/// receives local input events.
#[derive(Debug)]
pub struct TextSyncEngine {
    last_sent: String,
    link: watch::Receiver<Option<LinkSender>>,
}

impl TextSyncEngine {
    /// Creates an engine with an empty cursor that sends through `link`
    /// (see `ConnectionHandle::link`).
    pub fn new(link: watch::Receiver<Option<LinkSender>>) -> Self {
        Self {
            last_sent: String::new(),
            link,
        }
    }

    /// The text the desktop is believed to have.
    pub fn last_sent(&self) -> &str {
        &self.last_sent
    }

    /// Sends the edit from `last_sent` to `new_text`, then sets
    /// `last_sent = new_text`.
    ///
    /// Sends nothing when the text is unchanged.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::NotConnected`] if any message of the edit could not
    /// be sent; `dropped` counts the lost messages.  The cursor has already
    /// moved on when this is returned.
    pub fn on_local_text_changed(&mut self, new_text: &str) -> Result<(), DeliveryError> {
        let plan = plan_edit(&self.last_sent, new_text);
        if plan.is_empty() {
            return Ok(());
        }

        trace!(
            "edit: {} backspace(s), {} char(s) typed",
            plan.backspaces,
            plan.insert.as_deref().map_or(0, |s| s.chars().count())
        );

        let result = self.send_all(plan.into_messages());
        self.last_sent.clear();
        self.last_sent.push_str(new_text);
        result
    }

    /// Forgets the sync cursor without telling the desktop.
    ///
    /// Used when the user clears the local input: the text already typed on
    /// the desktop stays there, and the next edit is typed as new text.
    pub fn on_local_clear(&mut self) {
        debug!("local input cleared; sync cursor reset");
        self.last_sent.clear();
    }

    /// Sends `Enter`.  The cursor is unchanged.
    pub fn on_enter_pressed(&mut self) -> EnterOutcome {
        EnterOutcome {
            suppress_local_newline: true,
            delivery: self.send_all(vec![RelayMessage::key(RelayKey::Enter)]),
        }
    }

    /// Sends one named key (navigation, Tab, Escape...).  The cursor is
    /// unchanged, so arrow keys that move the desktop caret are the caller's
    /// responsibility to reconcile.
    pub fn press_key(&mut self, key: RelayKey) -> Result<(), DeliveryError> {
        self.send_all(vec![RelayMessage::key(key)])
    }

    /// Sends `messages` in order over the current link.
    fn send_all(&self, messages: Vec<RelayMessage>) -> Result<(), DeliveryError> {
        let total = messages.len();
        let Some(sender) = self.link.borrow().clone() else {
            debug!("not connected; {total} message(s) dropped");
            return Err(DeliveryError::NotConnected { dropped: total });
        };

        let mut dropped = 0;
        for msg in &messages {
            match sender.send(msg) {
                Ok(()) => {}
                Err(DeliveryError::NotConnected { .. }) => dropped += 1,
                Err(e) => return Err(e),
            }
        }

        if dropped > 0 {
            debug!("link went away mid-edit; {dropped} of {total} message(s) dropped");
            return Err(DeliveryError::NotConnected { dropped });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keyrelay_core::{decode_message, EndpointSet, LinkState};
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::connection_manager::{
        AttemptEvent, AttemptHandle, AttemptId, AttemptReport, ConnectionHandle,
        ConnectionManager, Dialer, ManagerConfig, Outbound,
    };
    use crate::application::endpoint_store::MemoryEndpointStore;

    /// Opens every attempt immediately and forwards its outbound frames.
    struct LoopbackDialer {
        frames: mpsc::UnboundedSender<mpsc::UnboundedReceiver<Outbound>>,
    }

    impl Dialer for LoopbackDialer {
        fn dial(
            &self,
            _endpoint: keyrelay_core::Endpoint,
            attempt: AttemptId,
            reports: mpsc::UnboundedSender<AttemptReport>,
        ) -> AttemptHandle {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = self.frames.send(rx);
            let _ = reports.send(AttemptReport {
                attempt,
                event: AttemptEvent::Opened,
            });
            AttemptHandle::new(tx)
        }
    }

    async fn connected() -> (ConnectionHandle, mpsc::UnboundedReceiver<Outbound>) {
        let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
        let (handle, _status) = ConnectionManager::spawn(
            LoopbackDialer { frames: frames_tx },
            Arc::new(MemoryEndpointStore::new()),
            ManagerConfig::default(),
        );
        handle.start(EndpointSet::new(["127.0.0.1"], 38745));
        handle
            .watch_state()
            .wait_for(LinkState::is_connected)
            .await
            .unwrap();
        let outbound = frames_rx.recv().await.unwrap();
        (handle, outbound)
    }

    fn drain(outbound: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<RelayMessage> {
        let mut messages = Vec::new();
        while let Ok(Outbound::Frame(frame)) = outbound.try_recv() {
            messages.push(decode_message(&frame).unwrap());
        }
        messages
    }

    fn disconnected_engine() -> TextSyncEngine {
        let (_tx, rx) = watch::channel(None);
        TextSyncEngine::new(rx)
    }

    #[tokio::test]
    async fn test_unchanged_text_sends_nothing() {
        // Arrange
        let (handle, mut outbound) = connected().await;
        let mut engine = TextSyncEngine::new(handle.link());
        engine.on_local_text_changed("hello").unwrap();
        drain(&mut outbound);

        // Act
        engine.on_local_text_changed("hello").unwrap();

        // Assert
        assert!(drain(&mut outbound).is_empty());
        assert_eq!(engine.last_sent(), "hello");
    }

    #[tokio::test]
    async fn test_hello_to_help_sends_two_backspaces_then_p() {
        let (handle, mut outbound) = connected().await;
        let mut engine = TextSyncEngine::new(handle.link());
        engine.on_local_text_changed("hello").unwrap();
        assert_eq!(drain(&mut outbound), vec![RelayMessage::text("hello")]);

        engine.on_local_text_changed("help").unwrap();

        assert_eq!(
            drain(&mut outbound),
            vec![
                RelayMessage::key(RelayKey::Backspace),
                RelayMessage::key(RelayKey::Backspace),
                RelayMessage::text("p"),
            ]
        );
        assert_eq!(engine.last_sent(), "help");
    }

    #[tokio::test]
    async fn test_clear_then_type_sends_only_the_new_text() {
        // Arrange
        let (handle, mut outbound) = connected().await;
        let mut engine = TextSyncEngine::new(handle.link());
        engine.on_local_text_changed("abc").unwrap();
        drain(&mut outbound);

        // Act
        engine.on_local_clear();
        engine.on_local_text_changed("x").unwrap();

        // Assert: no backspaces for the cleared text.
        assert_eq!(drain(&mut outbound), vec![RelayMessage::text("x")]);
    }

    #[tokio::test]
    async fn test_clear_sends_nothing() {
        let (handle, mut outbound) = connected().await;
        let mut engine = TextSyncEngine::new(handle.link());
        engine.on_local_text_changed("abc").unwrap();
        drain(&mut outbound);

        engine.on_local_clear();

        assert!(drain(&mut outbound).is_empty());
        assert_eq!(engine.last_sent(), "");
    }

    #[tokio::test]
    async fn test_enter_sends_key_and_suppresses_newline() {
        let (handle, mut outbound) = connected().await;
        let mut engine = TextSyncEngine::new(handle.link());

        let outcome = engine.on_enter_pressed();

        assert!(outcome.suppress_local_newline);
        tokio_test::assert_ok!(outcome.delivery);
        assert_eq!(drain(&mut outbound), vec![RelayMessage::key(RelayKey::Enter)]);
    }

    #[tokio::test]
    async fn test_press_key_sends_named_key() {
        let (handle, mut outbound) = connected().await;
        let mut engine = TextSyncEngine::new(handle.link());

        tokio_test::assert_ok!(engine.press_key(RelayKey::ArrowLeft));

        assert_eq!(
            drain(&mut outbound),
            vec![RelayMessage::key(RelayKey::ArrowLeft)]
        );
    }

    #[test]
    fn test_edit_while_disconnected_reports_failure_and_advances_cursor() {
        // Arrange
        let mut engine = disconnected_engine();

        // Act
        let result = engine.on_local_text_changed("hi");

        // Assert
        assert!(matches!(
            result,
            Err(DeliveryError::NotConnected { dropped: 1 })
        ));
        assert_eq!(engine.last_sent(), "hi");
    }

    #[test]
    fn test_dropped_count_covers_every_message_of_the_edit() {
        let mut engine = disconnected_engine();
        let _ = engine.on_local_text_changed("hello");

        let result = engine.on_local_text_changed("help");

        assert!(matches!(
            result,
            Err(DeliveryError::NotConnected { dropped: 3 })
        ));
    }

    #[test]
    fn test_enter_while_disconnected_still_suppresses_newline() {
        let mut engine = disconnected_engine();

        let outcome = engine.on_enter_pressed();

        assert!(outcome.suppress_local_newline);
        assert!(matches!(
            outcome.delivery,
            Err(DeliveryError::NotConnected { dropped: 1 })
        ));
    }

    #[tokio::test]
    async fn test_edit_after_stop_is_not_delivered() {
        // Arrange
        let (handle, _outbound) = connected().await;
        let mut engine = TextSyncEngine::new(handle.link());

        // Act
        handle.stop();
        handle
            .watch_state()
            .wait_for(|s| *s == LinkState::Idle)
            .await
            .unwrap();
        let result = engine.on_local_text_changed("late");

        // Assert
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, DeliveryError::NotConnected { .. }));
    }

    #[test]
    fn test_stale_sender_reports_not_connected() {
        // A sender whose socket task has gone away.
        let (tx, rx) = watch::channel(None);
        let mut engine = TextSyncEngine::new(rx);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        drop(frames_rx);
        tx.send_replace(Some(LinkSender::for_tests(frames_tx)));

        let result = engine.on_local_text_changed("ab");

        assert!(matches!(
            result,
            Err(DeliveryError::NotConnected { dropped: 1 })
        ));
        assert_eq!(engine.last_sent(), "ab");
    }
}

//! JSON message types carried over the relay socket.
//!
//! # Message flow
//!
//! ```text
//! Device → Desktop:  RelayMessage  (fire-and-forget, no reply required)
//! Desktop → Device:  HostMessage   (observational only; logged, never acted on)
//! ```
//!
//! # JSON discriminant
//!
//! Every message is a JSON object whose `"type"` field names the variant; the
//! remaining fields sit beside it in the same object:
//!
//! ```json
//! {"type":"text","text":"hello"}
//! {"type":"key","key":"Backspace"}
//! ```
//!
//! Serde's `#[serde(tag = "type")]` handles this representation.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Device → Desktop ──────────────────────────────────────────────────────────

/// A message the device sends to the desktop relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayMessage {
    /// Type this text at the desktop's cursor.
    Text {
        /// UTF-8 text to insert, possibly several characters at once.
        text: String,
    },

    /// Press and release one named key.
    Key {
        /// Which key.
        key: RelayKey,
    },
}

impl RelayMessage {
    /// Shorthand for `RelayMessage::Text`.
    pub fn text(text: impl Into<String>) -> Self {
        RelayMessage::Text { text: text.into() }
    }

    /// Shorthand for `RelayMessage::Key`.
    pub fn key(key: RelayKey) -> Self {
        RelayMessage::Key { key }
    }

    /// Short variant name for log lines that must not echo the typed text.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Text { .. } => "text",
            RelayMessage::Key { .. } => "key",
        }
    }
}

/// Named keys the desktop keyboard injector understands.
///
/// Serialized by name, matching the DOM `KeyboardEvent.key` spelling
/// (`"Backspace"`, `"ArrowUp"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayKey {
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
}

impl RelayKey {
    /// Every key, in declaration order.
    pub const ALL: [RelayKey; 13] = [
        RelayKey::Backspace,
        RelayKey::Delete,
        RelayKey::Enter,
        RelayKey::Tab,
        RelayKey::Escape,
        RelayKey::ArrowUp,
        RelayKey::ArrowDown,
        RelayKey::ArrowLeft,
        RelayKey::ArrowRight,
        RelayKey::Home,
        RelayKey::End,
        RelayKey::PageUp,
        RelayKey::PageDown,
    ];

    /// The wire name of the key.
    pub fn name(&self) -> &'static str {
        match self {
            RelayKey::Backspace => "Backspace",
            RelayKey::Delete => "Delete",
            RelayKey::Enter => "Enter",
            RelayKey::Tab => "Tab",
            RelayKey::Escape => "Escape",
            RelayKey::ArrowUp => "ArrowUp",
            RelayKey::ArrowDown => "ArrowDown",
            RelayKey::ArrowLeft => "ArrowLeft",
            RelayKey::ArrowRight => "ArrowRight",
            RelayKey::Home => "Home",
            RelayKey::End => "End",
            RelayKey::PageUp => "PageUp",
            RelayKey::PageDown => "PageDown",
        }
    }

    /// Looks a key up by its wire name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for RelayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Desktop → Device ──────────────────────────────────────────────────────────

/// A message the desktop may send back over the relay socket.
///
/// The relay protocol defines no acknowledgement semantics: the device logs
/// these frames and otherwise ignores them.  Unknown `type` values decode to
/// [`HostMessage::Other`] instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostMessage {
    /// The desktop processed a message.
    Ack {
        /// Echoed message id, if the desktop assigned one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        /// Whether the keystroke injection succeeded.
        success: bool,
    },

    /// The desktop rejected a message.
    Error {
        /// Human-readable reason.
        error: String,
    },

    /// Any other message type.
    #[serde(other)]
    Other,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_wire_format() {
        let json = serde_json::to_string(&RelayMessage::text("p")).unwrap();
        assert_eq!(json, r#"{"type":"text","text":"p"}"#);
    }

    #[test]
    fn test_key_message_wire_format() {
        let json = serde_json::to_string(&RelayMessage::key(RelayKey::Backspace)).unwrap();
        assert_eq!(json, r#"{"type":"key","key":"Backspace"}"#);
    }

    #[test]
    fn test_arrow_keys_use_dom_spelling() {
        let json = serde_json::to_string(&RelayMessage::key(RelayKey::ArrowLeft)).unwrap();
        assert_eq!(json, r#"{"type":"key","key":"ArrowLeft"}"#);
    }

    #[test]
    fn test_serde_name_matches_name_method_for_every_key() {
        for key in RelayKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.name()));
        }
    }

    #[test]
    fn test_from_name_ignores_case_and_whitespace() {
        assert_eq!(RelayKey::from_name(" enter "), Some(RelayKey::Enter));
        assert_eq!(RelayKey::from_name("PAGEDOWN"), Some(RelayKey::PageDown));
        assert_eq!(RelayKey::from_name("F13"), None);
    }

    #[test]
    fn test_kind_does_not_expose_text() {
        let msg = RelayMessage::text("secret");
        assert_eq!(msg.kind(), "text");
    }

    #[test]
    fn test_host_ack_decodes_with_and_without_id() {
        let with: HostMessage =
            serde_json::from_str(r#"{"type":"ack","id":4,"success":true}"#).unwrap();
        let without: HostMessage =
            serde_json::from_str(r#"{"type":"ack","success":false}"#).unwrap();

        assert_eq!(
            with,
            HostMessage::Ack {
                id: Some(4),
                success: true
            }
        );
        assert_eq!(
            without,
            HostMessage::Ack {
                id: None,
                success: false
            }
        );
    }

    #[test]
    fn test_unknown_host_message_type_decodes_to_other() {
        let msg: HostMessage =
            serde_json::from_str(r#"{"type":"screen_frame","data":"..."}"#).unwrap();
        assert_eq!(msg, HostMessage::Other);
    }
}

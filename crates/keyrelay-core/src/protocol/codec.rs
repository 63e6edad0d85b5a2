//! JSON codec for relay frames.
//!
//! Each WebSocket text frame carries exactly one UTF-8 JSON object, so the
//! codec is a thin layer over `serde_json` that maps its errors into
//! [`ProtocolError`].

use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{HostMessage, RelayMessage};

/// Errors that can occur while encoding or decoding a relay frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or does not match any message shape.
    #[error("malformed relay frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A message could not be serialized.
    #[error("failed to encode relay message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Encodes a [`RelayMessage`] as the text of one WebSocket frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use keyrelay_core::{decode_message, encode_message, RelayKey, RelayMessage};
///
/// let frame = encode_message(&RelayMessage::key(RelayKey::Enter)).unwrap();
/// assert_eq!(frame, r#"{"type":"key","key":"Enter"}"#);
/// assert_eq!(decode_message(&frame).unwrap(), RelayMessage::key(RelayKey::Enter));
/// ```
pub fn encode_message(msg: &RelayMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

/// Decodes a device-to-desktop frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for invalid JSON, an unknown `type`,
/// a missing field, or an unknown key name.
pub fn decode_message(frame: &str) -> Result<RelayMessage, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| malformed(frame, e))
}

/// Decodes a desktop-to-device frame.
///
/// Unknown message types decode to [`HostMessage::Other`].
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the frame is not a JSON object with
/// a `type` field, or a known type is missing its fields.
pub fn decode_host_message(frame: &str) -> Result<HostMessage, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| malformed(frame, e))
}

/// Encodes a [`HostMessage`] (used by the desktop side).
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_host_message(msg: &HostMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

fn malformed(frame: &str, e: serde_json::Error) -> ProtocolError {
    trace!(
        "rejecting {}-byte frame at line {} column {}: {e}",
        frame.len(),
        e.line(),
        e.column()
    );
    ProtocolError::Malformed(e)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::RelayKey;

    #[test]
    fn test_encode_text_preserves_unicode() {
        // Arrange
        let msg = RelayMessage::text("héllo 👋");

        // Act
        let frame = encode_message(&msg).unwrap();

        // Assert
        assert_eq!(frame, r#"{"type":"text","text":"héllo 👋"}"#);
    }

    #[test]
    fn test_decode_accepts_fields_in_any_order() {
        let msg = decode_message(r#"{"key":"Tab","type":"key"}"#).unwrap();
        assert_eq!(msg, RelayMessage::key(RelayKey::Tab));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let result = decode_message(r#"{"type":"mouse","dx":1}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_key_name() {
        let result = decode_message(r#"{"type":"key","key":"Hyper"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_missing_text_field() {
        let result = decode_message(r#"{"type":"text"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(decode_message("Backspace").is_err());
    }

    #[test]
    fn test_malformed_host_frame_keeps_serde_position() {
        // Arrange
        let frame = "{\"type\":\"ack\",\n\"success\":}";

        // Act
        let result = decode_host_message(frame);

        // Assert
        match result {
            Err(ProtocolError::Malformed(e)) => assert_eq!(e.line(), 2),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_host_error_message() {
        let msg = decode_host_message(r#"{"type":"error","error":"Not authenticated"}"#).unwrap();
        assert_eq!(
            msg,
            HostMessage::Error {
                error: "Not authenticated".to_string()
            }
        );
    }

    #[test]
    fn test_encode_host_ack_omits_missing_id() {
        let frame = encode_host_message(&HostMessage::Ack {
            id: None,
            success: true,
        })
        .unwrap();
        assert_eq!(frame, r#"{"type":"ack","success":true}"#);
    }
}

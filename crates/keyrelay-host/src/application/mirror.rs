//! TextMirror: what the desktop's focused text field would contain.
//!
//! Applies relay messages the way a keystroke injector would land them in an
//! empty text field with the caret at the end.  Only `Backspace` and `Enter`
//! change the buffer among the named keys; navigation keys would move a real
//! caret, which the mirror does not model.

use keyrelay_core::{RelayKey, RelayMessage};

/// Accumulated text of one device session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextMirror {
    text: String,
}

impl TextMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one message.
    pub fn apply(&mut self, msg: &RelayMessage) {
        match msg {
            RelayMessage::Text { text } => self.text.push_str(text),
            RelayMessage::Key { key } => match key {
                RelayKey::Backspace => {
                    self.text.pop();
                }
                RelayKey::Enter => self.text.push('\n'),
                _ => {}
            },
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

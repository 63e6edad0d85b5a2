//! Shared-prefix edit planning.
//!
//! Given the text the desktop is believed to have (`last_sent`) and the text
//! the user now sees (`new_text`), the minimal keystroke edit that only ever
//! touches the end of the text is:
//!
//! 1. Find `k`, the length of the longest common prefix.
//! 2. Press Backspace once per character of `last_sent` after position `k`.
//! 3. Type `new_text[k..]` as a single text message, if non-empty.
//!
//! ```text
//! last_sent = "hello"      common prefix = "hel" (k = 3)
//! new_text  = "help"       → Backspace, Backspace, Text("p")
//! ```
//!
//! # Unit of comparison
//!
//! Characters are Unicode scalar values (`char`), not grapheme clusters.  A
//! user-perceived character built from several scalars (flag emoji, ZWJ
//! sequences, combining accents) needs one Backspace per scalar to remove.
//!
//! A scalar outside the Basic Multilingual Plane (most emoji) is one `char`
//! and so one Backspace, even though it is two UTF-16 code units.  The
//! desktop is expected to delete one scalar per Backspace.

use crate::protocol::messages::{RelayKey, RelayMessage};

/// The keystrokes that turn one text into another.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditPlan {
    /// Number of Backspace presses, sent first.
    pub backspaces: usize,
    /// Suffix to type after the backspaces, if any.
    pub insert: Option<String>,
}

impl EditPlan {
    /// Returns `true` if the plan sends nothing.
    pub fn is_empty(&self) -> bool {
        self.backspaces == 0 && self.insert.is_none()
    }

    /// Total number of relay messages the plan produces.
    pub fn message_count(&self) -> usize {
        self.backspaces + usize::from(self.insert.is_some())
    }

    /// Expands the plan into relay messages in send order: every Backspace,
    /// then at most one Text.
    pub fn into_messages(self) -> Vec<RelayMessage> {
        let mut messages = Vec::with_capacity(self.message_count());
        messages.extend(
            std::iter::repeat(RelayMessage::key(RelayKey::Backspace)).take(self.backspaces),
        );
        if let Some(text) = self.insert {
            messages.push(RelayMessage::Text { text });
        }
        messages
    }
}

/// Length of the longest common prefix of `a` and `b`, in `char`s.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Plans the edit from `last_sent` to `new_text`.
///
/// # Examples
///
/// ```rust
/// use keyrelay_core::{plan_edit, EditPlan};
///
/// let plan = plan_edit("hello", "help");
/// assert_eq!(plan, EditPlan { backspaces: 2, insert: Some("p".to_string()) });
///
/// assert!(plan_edit("same", "same").is_empty());
/// ```
pub fn plan_edit(last_sent: &str, new_text: &str) -> EditPlan {
    // The shared prefix is byte-identical in both strings, so its byte length
    // is a valid split point in `new_text`.
    let (prefix_chars, prefix_bytes) = last_sent
        .chars()
        .zip(new_text.chars())
        .take_while(|(x, y)| x == y)
        .fold((0usize, 0usize), |(n, bytes), (c, _)| (n + 1, bytes + c.len_utf8()));

    let backspaces = last_sent.chars().count() - prefix_chars;
    let suffix = &new_text[prefix_bytes..];

    EditPlan {
        backspaces,
        insert: (!suffix.is_empty()).then(|| suffix.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

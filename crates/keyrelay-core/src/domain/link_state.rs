//! States of the relay link as seen by observers.

use std::fmt;
use std::time::Instant;

use crate::domain::generation::Generation;

/// The state the connection manager is in.  Exactly one holds at a time.
///
/// ```text
///            start                    Opened
///   Idle ───────────────▶ Connecting ────────▶ Connected
///    ▲                    │  ▲    │                │
///    │ stop (from any)    │  └────┘ Failed,        │ Closed
///    │                    │   next candidate       │
///    │                    ▼ list exhausted         ▼
///    └────────────────  Backoff ◀──────────────────┘
///                         │ timer fires
///                         └──────────▶ Connecting(0, g+1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No attempt in flight and no reconnect scheduled.
    #[default]
    Idle,
    /// Waiting for the attempt to `candidate` (an index into the endpoint set)
    /// to open or fail.
    Connecting {
        candidate: usize,
        generation: Generation,
    },
    /// The link is up.
    Connected { generation: Generation },
    /// Waiting for the reconnect timer; `attempt` is the number of consecutive
    /// failed cycles so far and `due` is when the next cycle starts.
    Backoff { attempt: u32, due: Instant },
}

impl LinkState {
    /// Returns `true` in the `Connected` state.
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected { .. })
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Idle => write!(f, "idle"),
            LinkState::Connecting {
                candidate,
                generation,
            } => write!(f, "connecting(candidate {candidate}, {generation})"),
            LinkState::Connected { generation } => write!(f, "connected({generation})"),
            LinkState::Backoff { attempt, .. } => write!(f, "backoff(attempt {attempt})"),
        }
    }
}

//! Generation tokens for invalidating stale connection callbacks.
//!
//! # Why a generation counter?
//!
//! A socket attempt reports back asynchronously: "opened", "closed", "failed".
//! By the time such a report is processed, the connection manager may already
//! have given up on that attempt (the user pressed stop, a new endpoint set
//! arrived, the reconnect timer started a fresh cycle).  Acting on the late
//! report would corrupt the current state, for example by marking the link
//! "connected" to a socket that has already been closed.
//!
//! Every attempt captures the generation that was current when it was
//! created.  Whenever the manager intentionally tears down its connection it
//! advances the counter, and every report carrying an older generation is
//! discarded without further inspection.
//!
//! # Thread safety
//!
//! The counter is an `AtomicU64`.  Only the connection manager's event loop
//! advances it, but handles on other tasks may read it for diagnostics, so it
//! is safe to share behind an `Arc`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of the generation counter.
///
/// Generations are totally ordered; a larger value always means "newer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Monotonically increasing generation counter owned by the connection manager.
///
/// # Examples
///
/// ```rust
/// use keyrelay_core::{Generation, GenerationCounter};
///
/// let counter = GenerationCounter::new();
/// let captured = counter.current();
/// assert!(counter.is_current(captured));
///
/// counter.advance();
/// assert!(!counter.is_current(captured));
/// assert_eq!(counter.current(), Generation(1));
/// ```
#[derive(Debug, Default)]
pub struct GenerationCounter {
    inner: AtomicU64,
}

impl GenerationCounter {
    /// Creates a new counter at generation 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the generation that is current right now.
    pub fn current(&self) -> Generation {
        Generation(self.inner.load(Ordering::Acquire))
    }

    /// Advances to a new generation and returns it.
    ///
    /// After this call every previously captured generation is stale.
    /// `fetch_add` returns the old value, so the new one is `old + 1`.
    pub fn advance(&self) -> Generation {
        Generation(self.inner.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Returns `true` if `generation` is the current one.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_generation_counter_starts_at_zero() {
        // Arrange / Act
        let counter = GenerationCounter::new();

        // Assert
        assert_eq!(counter.current(), Generation(0));
    }

    #[test]
    fn test_advance_returns_the_new_current_generation() {
        let counter = GenerationCounter::new();

        let advanced = counter.advance();

        assert_eq!(advanced, Generation(1));
        assert_eq!(counter.current(), advanced);
    }

    #[test]
    fn test_advance_is_strictly_increasing() {
        // Arrange
        let counter = GenerationCounter::new();

        // Act
        let values: Vec<Generation> = (0..50).map(|_| counter.advance()).collect();

        // Assert
        for window in values.windows(2) {
            assert!(window[1] > window[0], "generations must strictly increase");
        }
    }

    #[test]
    fn test_captured_generation_goes_stale_after_advance() {
        let counter = GenerationCounter::new();
        let captured = counter.current();

        counter.advance();

        assert!(!counter.is_current(captured));
        assert!(captured < counter.current());
    }

    #[test]
    fn test_concurrent_advances_never_hand_out_the_same_generation() {
        // Arrange
        let counter = Arc::new(GenerationCounter::new());

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..250).map(|_| c.advance()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<Generation> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert_eq!(counter.current(), Generation(1000));
    }

    #[test]
    fn test_generation_display() {
        assert_eq!(Generation(7).to_string(), "gen#7");
    }
}

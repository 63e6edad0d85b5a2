//! Reconnect backoff policy.
//!
//! After a full failover cycle fails (every endpoint refused or timed out), or
//! after an established link drops, the manager waits before starting the next
//! cycle.  The wait grows linearly with the number of consecutive failed cycles
//! and is capped:
//!
//! ```text
//! delay(n) = min(base * n, cap)      base = 2 s, cap = 30 s
//!
//! n:      1    2    3    ...  15   16   17
//! delay:  2s   4s   6s   ...  30s  30s  30s
//! ```

use std::time::Duration;

/// Linear-capped backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added per consecutive failed cycle.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl BackoffPolicy {
    /// Delay before the reconnect that follows `failures` consecutive failed
    /// cycles.  `delay(0)` is zero.
    pub fn delay(&self, failures: u32) -> Duration {
        self.base.saturating_mul(failures).min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(2_000),
            cap: Duration::from_millis(30_000),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_two_seconds_capped_at_thirty() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base, Duration::from_millis(2_000));
        assert_eq!(policy.cap, Duration::from_millis(30_000));
    }

    #[test]
    fn test_delay_grows_linearly_until_cap() {
        let policy = BackoffPolicy::default();

        assert_eq!(policy.delay(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay(2), Duration::from_millis(4_000));
        assert_eq!(policy.delay(14), Duration::from_millis(28_000));
        assert_eq!(policy.delay(15), Duration::from_millis(30_000));
        assert_eq!(policy.delay(16), Duration::from_millis(30_000));
    }

    #[test]
    fn test_delay_sequence_is_non_decreasing_and_bounded() {
        // Arrange
        let policy = BackoffPolicy::default();

        // Act
        let delays: Vec<Duration> = (1..=100).map(|n| policy.delay(n)).collect();

        // Assert
        for (n, window) in delays.windows(2).enumerate() {
            assert!(window[1] >= window[0], "delay({}) decreased", n + 2);
        }
        for (i, d) in delays.iter().enumerate() {
            let n = i as u64 + 1;
            assert_eq!(*d, Duration::from_millis((2_000 * n).min(30_000)));
        }
    }

    #[test]
    fn test_delay_zero_failures_is_zero() {
        assert_eq!(BackoffPolicy::default().delay(0), Duration::ZERO);
    }

    #[test]
    fn test_delay_does_not_overflow_on_huge_failure_counts() {
        assert_eq!(
            BackoffPolicy::default().delay(u32::MAX),
            Duration::from_millis(30_000)
        );
    }
}

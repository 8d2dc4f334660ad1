//! Bounded exponential backoff for reconnect attempts.
//!
//! The session manager retries recoverable disconnects with exponentially
//! growing delays up to a cap, and gives up after a configured number of
//! consecutive failures instead of hammering the platform forever.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Maximum consecutive failed attempts before giving up.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: 10,
        }
    }
}

impl RetryConfig {
    /// Delay before the given attempt (1-based), doubling per attempt and
    /// clamped to [`Self::max_delay_ms`].
    ///
    /// Attempt 1 waits `base_delay_ms`, attempt 2 waits twice that, and so
    /// on. Attempt 0 is treated as 1.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.max(1) - 1;
        // Saturate instead of overflowing for absurd attempt numbers.
        let factor = 2u64.checked_pow(exp).unwrap_or(u64::MAX);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Whether another attempt is allowed after `failures` consecutive
    /// failures.
    #[must_use]
    pub fn allows_attempt(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
            max_attempts: 5,
        }
    }

    #[test]
    fn delays_double_per_attempt() {
        let c = cfg();
        assert_eq!(c.delay_for_attempt(1), Duration::from_millis(1_000));
        assert_eq!(c.delay_for_attempt(2), Duration::from_millis(2_000));
        assert_eq!(c.delay_for_attempt(3), Duration::from_millis(4_000));
    }

    #[test]
    fn delay_capped_at_max() {
        let c = cfg();
        assert_eq!(c.delay_for_attempt(4), Duration::from_millis(8_000));
        assert_eq!(c.delay_for_attempt(10), Duration::from_millis(8_000));
    }

    #[test]
    fn attempt_zero_treated_as_one() {
        let c = cfg();
        assert_eq!(c.delay_for_attempt(0), c.delay_for_attempt(1));
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let c = cfg();
        assert_eq!(c.delay_for_attempt(u32::MAX), Duration::from_millis(8_000));
    }

    #[test]
    fn ceiling_enforced() {
        let c = cfg();
        assert!(c.allows_attempt(0));
        assert!(c.allows_attempt(4));
        assert!(!c.allows_attempt(5));
        assert!(!c.allows_attempt(100));
    }

    #[test]
    fn defaults_sane() {
        let c = RetryConfig::default();
        assert_eq!(c.base_delay_ms, 1_000);
        assert_eq!(c.max_delay_ms, 60_000);
        assert_eq!(c.max_attempts, 10);
    }
}

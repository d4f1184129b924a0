//! Exponential backoff for consecutive credential failures.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Delay after the first failure.
pub const BASE_DELAY_SECS: i64 = 1;
/// Ceiling on any computed delay: two hours.
pub const MAX_DELAY_SECS: i64 = 7_200;

/// Delay required before the attempt that follows `failures` consecutive
/// failures: `min(base * 2^(n-1), cap)`, zero when the streak is empty.
pub fn required_delay(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::zero();
    }
    // Exponent is clamped; past 31 doublings the cap has long since won.
    let exp = 2_f64.powi((failures - 1).min(31) as i32);
    let secs = ((BASE_DELAY_SECS as f64) * exp).min(MAX_DELAY_SECS as f64);
    Duration::seconds(secs as i64)
}

/// Consecutive-failure streak for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureStreak {
    pub failures: u32,
    pub last_failure_at: DateTime<Utc>,
}

impl FailureStreak {
    pub fn first(now: DateTime<Utc>) -> Self {
        Self {
            failures: 1,
            last_failure_at: now,
        }
    }

    #[must_use]
    pub fn bump(&self, now: DateTime<Utc>) -> Self {
        Self {
            failures: self.failures.saturating_add(1),
            last_failure_at: now,
        }
    }

    /// Instant until which further attempts are refused.
    pub fn holds_until(&self) -> DateTime<Utc> {
        self.last_failure_at + required_delay(self.failures)
    }

    /// Remaining hold time, if the streak still bites at `now`.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        let until = self.holds_until();
        (now < until).then(|| until - now)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

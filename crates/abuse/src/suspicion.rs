//! Composite suspicion scoring over a rolling window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Events that feed the suspicion score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionSignal {
    /// A credential attempt that did not verify.
    FailedCredential,
    /// A request refused because its window quota was exhausted.
    RateLimitRejection,
    /// Use of an operation that costs money or reaches a phone.
    AbuseProneRequest,
}

/// Signals older than this fall out of the score.
pub const SUSPICION_WINDOW_SECS: i64 = 900;
/// Score at which an identifier is blocked automatically.
pub const SUSPICION_THRESHOLD: u32 = 10;

/// Drop signals that have aged out of the rolling window.
pub fn prune(signals: &mut Vec<(DateTime<Utc>, SuspicionSignal)>, now: DateTime<Utc>) {
    let cutoff = now - Duration::seconds(SUSPICION_WINDOW_SECS);
    signals.retain(|(at, _)| *at > cutoff);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

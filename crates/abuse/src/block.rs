//! Block records: the hard stop above throttling.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// Why an identifier was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    ExcessiveLoginFailures,
    SuspiciousActivity,
    OperationAbuse,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::ExcessiveLoginFailures => "excessive_login_failures",
            BlockReason::SuspiciousActivity => "suspicious_activity",
            BlockReason::OperationAbuse => "operation_abuse",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block, live or served.
///
/// Records are never deleted: a deactivated block is the audit trail of a
/// sentence served or an operator's release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub identifier: Identifier,
    pub reason: BlockReason,
    /// Times this block has been imposed: 1 on creation, +1 per extension.
    pub attempts: u32,
    pub active: bool,
    pub blocked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BlockRecord {
    pub fn new(
        identifier: Identifier,
        reason: BlockReason,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier,
            reason,
            attempts: 1,
            active: true,
            blocked_at: now,
            expires_at: now + duration,
        }
    }

    /// Whether the block currently bites.
    pub fn in_effect(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at
    }

    /// A repeat violation while blocked: bump the count and push the
    /// expiry out from `now`, not from the original expiry.
    pub fn extend(&mut self, duration: Duration, now: DateTime<Utc>) {
        self.attempts = self.attempts.saturating_add(1);
        self.expires_at = now + duration;
    }

    /// Time left on the sentence.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn block_expires_naturally() {
        let record = BlockRecord::new(
            Identifier::email("kid@school.edu"),
            BlockReason::ExcessiveLoginFailures,
            Duration::seconds(60),
            at(1_000),
        );

        assert!(record.in_effect(at(1_000)));
        assert!(record.in_effect(at(1_059)));
        assert!(!record.in_effect(at(1_060)));
    }

    #[test]
    fn extension_rebases_expiry_from_now() {
        let mut record = BlockRecord::new(
            Identifier::email("kid@school.edu"),
            BlockReason::SuspiciousActivity,
            Duration::seconds(60),
            at(1_000),
        );

        record.extend(Duration::seconds(60), at(1_030));
        assert_eq!(record.attempts, 2);
        assert_eq!(record.expires_at, at(1_090));
        // Creation time is part of the trail and does not move.
        assert_eq!(record.blocked_at, at(1_000));
    }

    #[test]
    fn retry_after_never_goes_negative() {
        let record = BlockRecord::new(
            Identifier::mobile("+15550102368"),
            BlockReason::OperationAbuse,
            Duration::seconds(10),
            at(1_000),
        );

        assert_eq!(record.retry_after(at(1_004)), Duration::seconds(6));
        assert_eq!(record.retry_after(at(2_000)), Duration::zero());
    }
}

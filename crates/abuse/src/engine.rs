//! The abuse decision: blocks, backoff, then the window quota.

use chrono::{DateTime, Duration, Utc};

use crate::block::{BlockReason, BlockRecord};
use crate::identifier::Identifier;
use crate::policy::OperationKind;
use crate::store::AbuseStore;
use crate::suspicion::{SUSPICION_THRESHOLD, SuspicionSignal};

/// Consecutive login failures that escalate to a block on their own.
pub const LOGIN_FAILURE_BLOCK_THRESHOLD: u32 = 10;
/// Duration of automatically imposed blocks.
pub const AUTO_BLOCK_SECS: i64 = 3_600;

/// Why a check was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbuseDenial {
    /// An active block covers this identifier.
    Blocked(BlockReason),
    /// The fixed-window quota for this kind is exhausted.
    RateLimited,
    /// Consecutive failures impose a waiting period.
    Backoff,
}

/// Outcome of an abuse check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbuseDecision {
    pub allowed: bool,
    pub denial: Option<AbuseDenial>,
    /// Quota left in the current window; zero on any denial.
    pub remaining: u32,
    /// When the binding constraint relaxes.
    pub resets_at: Option<DateTime<Utc>>,
    /// How long the caller should wait, present on every denial.
    pub retry_after: Option<Duration>,
}

impl AbuseDecision {
    fn allowed(remaining: u32, resets_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            denial: None,
            remaining,
            resets_at: Some(resets_at),
            retry_after: None,
        }
    }

    fn denied(denial: AbuseDenial, resets_at: DateTime<Utc>, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            denial: Some(denial),
            remaining: 0,
            resets_at: Some(resets_at),
            retry_after: Some(retry_after),
        }
    }
}

/// Pre-authentication abuse screen.
///
/// Check order is fixed: an active block beats backoff, backoff beats the
/// window quota. Every rejection and every abuse-prone use feeds the
/// suspicion score, and crossing its threshold blocks the identifier
/// without waiting for any single limit to trip.
pub struct AbuseEngine<S> {
    store: S,
}

impl<S: AbuseStore> AbuseEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Screen one operation. Allowed checks consume a window slot; denied
    /// checks consume nothing.
    pub fn check(
        &self,
        identifier: &Identifier,
        kind: OperationKind,
        now: DateTime<Utc>,
    ) -> AbuseDecision {
        let key = identifier.key();

        if let Some(block) = self.store.active_block(&key, now) {
            return AbuseDecision::denied(
                AbuseDenial::Blocked(block.reason),
                block.expires_at,
                block.retry_after(now),
            );
        }

        if kind.backoff_applies() {
            if let Some(streak) = self.store.failure_streak(&key) {
                if let Some(wait) = streak.retry_after(now) {
                    return AbuseDecision::denied(AbuseDenial::Backoff, streak.holds_until(), wait);
                }
            }
        }

        let window = self.store.try_acquire(&key, kind, now);
        if !window.allowed {
            let score = self
                .store
                .record_signal(&key, SuspicionSignal::RateLimitRejection, now);
            self.escalate_if_suspicious(identifier, score, now);
            return AbuseDecision::denied(
                AbuseDenial::RateLimited,
                window.resets_at,
                (window.resets_at - now).max(Duration::zero()),
            );
        }

        if kind.is_abuse_prone() {
            // The block lands after this already-admitted request; the
            // next one meets it.
            let score = self
                .store
                .record_signal(&key, SuspicionSignal::AbuseProneRequest, now);
            self.escalate_if_suspicious(identifier, score, now);
        }

        AbuseDecision::allowed(window.remaining(), window.resets_at)
    }

    /// Record a failed credential attempt. Returns the block when this
    /// failure created or extended one.
    pub fn record_failure(
        &self,
        identifier: &Identifier,
        now: DateTime<Utc>,
    ) -> Option<BlockRecord> {
        let key = identifier.key();
        let streak = self.store.record_failure(&key, now);
        let score = self
            .store
            .record_signal(&key, SuspicionSignal::FailedCredential, now);

        if streak.failures >= LOGIN_FAILURE_BLOCK_THRESHOLD {
            return Some(self.store.upsert_block(
                identifier,
                BlockReason::ExcessiveLoginFailures,
                Duration::seconds(AUTO_BLOCK_SECS),
                now,
            ));
        }
        if score >= SUSPICION_THRESHOLD {
            return Some(self.store.upsert_block(
                identifier,
                BlockReason::SuspiciousActivity,
                Duration::seconds(AUTO_BLOCK_SECS),
                now,
            ));
        }
        None
    }

    /// A successful attempt ends the failure streak.
    pub fn record_success(&self, identifier: &Identifier) {
        self.store.clear_failures(&identifier.key());
    }

    /// Impose a block directly (operator or policy decision).
    pub fn block(
        &self,
        identifier: &Identifier,
        reason: BlockReason,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> BlockRecord {
        self.store.upsert_block(identifier, reason, duration, now)
    }

    /// Release every block in effect for the identifier; the failure
    /// streak goes with them. Returns whether anything was released.
    pub fn unblock(&self, identifier: &Identifier, now: DateTime<Utc>) -> bool {
        let key = identifier.key();
        let released = self.store.deactivate_blocks(&key, now);
        self.store.clear_failures(&key);
        released
    }

    pub fn active_block(&self, identifier: &Identifier, now: DateTime<Utc>) -> Option<BlockRecord> {
        self.store.active_block(&identifier.key(), now)
    }

    fn escalate_if_suspicious(&self, identifier: &Identifier, score: u32, now: DateTime<Utc>) {
        if score >= SUSPICION_THRESHOLD {
            self.store.upsert_block(
                identifier,
                BlockReason::SuspiciousActivity,
                Duration::seconds(AUTO_BLOCK_SECS),
                now,
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

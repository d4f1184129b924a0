//! Shared abuse state: counters, streaks, signals, and blocks.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::backoff::FailureStreak;
use crate::block::{BlockReason, BlockRecord};
use crate::identifier::Identifier;
use crate::policy::OperationKind;
use crate::suspicion::{self, SuspicionSignal};

/// Result of a fixed-window acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub allowed: bool,
    /// Consumed count in the current window, including this acquisition
    /// when it was allowed.
    pub count: u32,
    pub limit: u32,
    pub resets_at: DateTime<Utc>,
}

impl WindowSnapshot {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// System of record for abuse state.
///
/// Every node serving traffic must consult the same store; counting on
/// node-local state would let an attacker shard their traffic across nodes
/// and multiply every limit. An implementation that cannot answer must deny
/// acquisitions rather than allow them.
pub trait AbuseStore: Send + Sync {
    /// Atomically check and consume one slot in the kind's current window.
    /// Denied acquisitions consume nothing.
    fn try_acquire(&self, key: &str, kind: OperationKind, now: DateTime<Utc>) -> WindowSnapshot;

    fn failure_streak(&self, key: &str) -> Option<FailureStreak>;

    /// Record a consecutive failure and return the updated streak.
    fn record_failure(&self, key: &str, now: DateTime<Utc>) -> FailureStreak;

    /// Reset the streak to zero.
    fn clear_failures(&self, key: &str);

    /// Record a suspicion signal and return the rolling-window score.
    fn record_signal(&self, key: &str, signal: SuspicionSignal, now: DateTime<Utc>) -> u32;

    /// Create a block, or extend the one already in effect for this
    /// identifier. There is never more than one block in effect per key.
    fn upsert_block(
        &self,
        identifier: &Identifier,
        reason: BlockReason,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> BlockRecord;

    /// The block in effect for `key`, if any.
    ///
    /// Observing a naturally lapsed block deactivates it and resets the
    /// failure streak: a served sentence does not seed the next backoff.
    fn active_block(&self, key: &str, now: DateTime<Utc>) -> Option<BlockRecord>;

    /// Deactivate every block in effect for `key`. Returns whether any was.
    fn deactivate_blocks(&self, key: &str, now: DateTime<Utc>) -> bool;
}

impl<S> AbuseStore for Arc<S>
where
    S: AbuseStore + ?Sized,
{
    fn try_acquire(&self, key: &str, kind: OperationKind, now: DateTime<Utc>) -> WindowSnapshot {
        (**self).try_acquire(key, kind, now)
    }

    fn failure_streak(&self, key: &str) -> Option<FailureStreak> {
        (**self).failure_streak(key)
    }

    fn record_failure(&self, key: &str, now: DateTime<Utc>) -> FailureStreak {
        (**self).record_failure(key, now)
    }

    fn clear_failures(&self, key: &str) {
        (**self).clear_failures(key)
    }

    fn record_signal(&self, key: &str, signal: SuspicionSignal, now: DateTime<Utc>) -> u32 {
        (**self).record_signal(key, signal, now)
    }

    fn upsert_block(
        &self,
        identifier: &Identifier,
        reason: BlockReason,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> BlockRecord {
        (**self).upsert_block(identifier, reason, duration, now)
    }

    fn active_block(&self, key: &str, now: DateTime<Utc>) -> Option<BlockRecord> {
        (**self).active_block(key, now)
    }

    fn deactivate_blocks(&self, key: &str, now: DateTime<Utc>) -> bool {
        (**self).deactivate_blocks(key, now)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct WindowCell {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Single-process store for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryAbuseStore {
    windows: RwLock<HashMap<(String, OperationKind), WindowCell>>,
    streaks: RwLock<HashMap<String, FailureStreak>>,
    signals: RwLock<HashMap<String, Vec<(DateTime<Utc>, SuspicionSignal)>>>,
    blocks: RwLock<HashMap<String, Vec<BlockRecord>>>,
}

impl InMemoryAbuseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl AbuseStore for InMemoryAbuseStore {
    fn try_acquire(&self, key: &str, kind: OperationKind, now: DateTime<Utc>) -> WindowSnapshot {
        let quota = kind.quota();
        let resets_at = quota.resets_at(now);

        let Ok(mut windows) = self.windows.write() else {
            // State is unreachable; refusing is the only safe answer.
            return WindowSnapshot {
                allowed: false,
                count: quota.limit,
                limit: quota.limit,
                resets_at,
            };
        };

        let start = quota.window_start(now);
        let cell = windows
            .entry((key.to_string(), kind))
            .or_insert(WindowCell {
                window_start: start,
                count: 0,
            });
        if cell.window_start != start {
            cell.window_start = start;
            cell.count = 0;
        }

        let allowed = cell.count < quota.limit;
        if allowed {
            cell.count += 1;
        }
        WindowSnapshot {
            allowed,
            count: cell.count,
            limit: quota.limit,
            resets_at,
        }
    }

    fn failure_streak(&self, key: &str) -> Option<FailureStreak> {
        self.streaks.read().ok()?.get(key).copied()
    }

    fn record_failure(&self, key: &str, now: DateTime<Utc>) -> FailureStreak {
        let Ok(mut streaks) = self.streaks.write() else {
            return FailureStreak::first(now);
        };
        let updated = match streaks.get(key) {
            Some(streak) => streak.bump(now),
            None => FailureStreak::first(now),
        };
        streaks.insert(key.to_string(), updated);
        updated
    }

    fn clear_failures(&self, key: &str) {
        if let Ok(mut streaks) = self.streaks.write() {
            streaks.remove(key);
        }
    }

    fn record_signal(&self, key: &str, signal: SuspicionSignal, now: DateTime<Utc>) -> u32 {
        let Ok(mut signals) = self.signals.write() else {
            return 0;
        };
        let entry = signals.entry(key.to_string()).or_default();
        suspicion::prune(entry, now);
        entry.push((now, signal));
        entry.len() as u32
    }

    fn upsert_block(
        &self,
        identifier: &Identifier,
        reason: BlockReason,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> BlockRecord {
        let Ok(mut blocks) = self.blocks.write() else {
            return BlockRecord::new(identifier.clone(), reason, duration, now);
        };
        let records = blocks.entry(identifier.key()).or_default();
        if let Some(live) = records.iter_mut().find(|r| r.in_effect(now)) {
            live.extend(duration, now);
            return live.clone();
        }
        let record = BlockRecord::new(identifier.clone(), reason, duration, now);
        records.push(record.clone());
        record
    }

    fn active_block(&self, key: &str, now: DateTime<Utc>) -> Option<BlockRecord> {
        let mut lapsed = false;
        let hit = {
            let mut blocks = self.blocks.write().ok()?;
            let records = blocks.get_mut(key)?;
            for record in records.iter_mut() {
                if record.active && now >= record.expires_at {
                    record.active = false;
                    lapsed = true;
                }
            }
            records.iter().find(|r| r.in_effect(now)).cloned()
        };
        if lapsed {
            // Sentence served; backoff starts over from the base delay.
            self.clear_failures(key);
        }
        hit
    }

    fn deactivate_blocks(&self, key: &str, now: DateTime<Utc>) -> bool {
        let Ok(mut blocks) = self.blocks.write() else {
            return false;
        };
        let Some(records) = blocks.get_mut(key) else {
            return false;
        };
        let mut released = false;
        for record in records.iter_mut() {
            if record.in_effect(now) {
                record.active = false;
                released = true;
            }
        }
        released
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

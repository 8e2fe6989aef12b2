//! Coordinator counters
//!
//! Relaxed atomics bumped on the hot paths; `snapshot()` copies them out.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct OffloadStats {
    async_submitted: AtomicU64,
    sync_submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    duplicate_completions: AtomicU64,
    exhausted: AtomicU64,
    busy_retries: AtomicU64,
    busy_giveups: AtomicU64,
    rejected: AtomicU64,
    fallbacks: AtomicU64,
    drain_calls: AtomicU64,
    fatal_drains: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub async_submitted: u64,
    pub sync_submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub duplicate_completions: u64,
    pub exhausted: u64,
    pub busy_retries: u64,
    pub busy_giveups: u64,
    pub rejected: u64,
    pub fallbacks: u64,
    pub drain_calls: u64,
    pub fatal_drains: u64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl OffloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        record_async_submit => async_submitted,
        record_sync_submit => sync_submitted,
        record_duplicate => duplicate_completions,
        record_exhausted => exhausted,
        record_busy_retry => busy_retries,
        record_busy_giveup => busy_giveups,
        record_rejected => rejected,
        record_fallback => fallbacks,
        record_drain => drain_calls,
        record_fatal_drain => fatal_drains,
    }

    /// Count a resolved context by its result code.
    #[inline]
    pub fn record_completion(&self, result: i32) {
        if result == 0 {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            async_submitted: load(&self.async_submitted),
            sync_submitted: load(&self.sync_submitted),
            completed: load(&self.completed),
            failed: load(&self.failed),
            duplicate_completions: load(&self.duplicate_completions),
            exhausted: load(&self.exhausted),
            busy_retries: load(&self.busy_retries),
            busy_giveups: load(&self.busy_giveups),
            rejected: load(&self.rejected),
            fallbacks: load(&self.fallbacks),
            drain_calls: load(&self.drain_calls),
            fatal_drains: load(&self.fatal_drains),
        }
    }
}

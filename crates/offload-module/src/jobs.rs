//! Ready-made `Job` implementations
//!
//! - [`ThreadJob`] parks the calling OS thread on a condvar until resumed.
//!   Used by callers that run on plain threads.
//! - [`YieldJob`] never sleeps: suspending yields the thread and the
//!   caller's park loop re-checks the done flag.
//!
//! Fiber runtimes provide their own `Job` that switches stacks.

use offload_core::Job;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Condvar-backed job for a caller running on its own OS thread.
pub struct ThreadJob {
    /// true = a resume arrived that no suspend has consumed yet
    wake_pending: Mutex<bool>,
    condvar: Condvar,
}

impl ThreadJob {
    pub fn new() -> Self {
        Self {
            wake_pending: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Suspend for at most `timeout`. Returns `true` if resumed.
    pub fn suspend_timeout(&self, timeout: Duration) -> bool {
        let guard = self.wake_pending.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |pending| !*pending)
            .unwrap_or_else(PoisonError::into_inner);
        let woke = *guard;
        *guard = false;
        woke
    }
}

impl Default for ThreadJob {
    fn default() -> Self {
        Self::new()
    }
}

impl Job for ThreadJob {
    fn suspend_current(&self) {
        let mut guard = self.wake_pending.lock().unwrap_or_else(PoisonError::into_inner);
        while !*guard {
            guard = self.condvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
        // Consume the wake
        *guard = false;
    }

    fn resume(&self) {
        {
            let mut guard = self.wake_pending.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = true;
        }
        self.condvar.notify_one();
    }
}

/// Busy-yield job. `resume` only counts.
#[derive(Default)]
pub struct YieldJob {
    resumes: AtomicU64,
}

impl YieldJob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `resume` calls seen
    pub fn resumes(&self) -> u64 {
        self.resumes.load(Ordering::Acquire)
    }
}

impl Job for YieldJob {
    fn suspend_current(&self) {
        std::thread::yield_now();
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::AcqRel);
    }
}

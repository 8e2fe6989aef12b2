//! Suspension context (`AsyncOp`)
//!
//! One `AsyncOp` tracks one caller's parked execution: the job to resume,
//! the slot it is bound to, the done flag and the result code.
//!
//! State transitions are one-way:
//!
//! ```text
//! PENDING ──finish()──▶ COMPLETING ──▶ DONE
//! ```
//!
//! Only the thread that wins the PENDING→COMPLETING exchange writes the
//! result, so a second `complete` on the same context is a no-op. The
//! result store happens-before the DONE store (Release), and readers load
//! DONE with Acquire before reading the result.

use offload_core::{kwarn, Job, Notifier, SlotId};

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

const PENDING: u8 = 0;
const COMPLETING: u8 = 1;
const DONE: u8 = 2;

pub struct AsyncOp {
    /// Caller's cooperative unit. `None` = synchronous mode.
    job: Option<Arc<dyn Job>>,
    /// Optional wait-descriptor signalled alongside the resume.
    notifier: Option<Arc<dyn Notifier>>,
    state: AtomicU8,
    slot: AtomicU32,
    result: AtomicI32,
}

impl AsyncOp {
    fn build(job: Option<Arc<dyn Job>>, notifier: Option<Arc<dyn Notifier>>) -> Arc<Self> {
        Arc::new(Self {
            job,
            notifier,
            state: AtomicU8::new(PENDING),
            slot: AtomicU32::new(SlotId::NONE.as_u32()),
            result: AtomicI32::new(0),
        })
    }

    /// A context for a caller that blocks on the synchronous submission.
    pub fn synchronous() -> Arc<Self> {
        Self::build(None, None)
    }

    /// A context whose caller parks `job` while the hardware works.
    pub fn with_job(job: Arc<dyn Job>) -> Arc<Self> {
        Self::build(Some(job), None)
    }

    /// Like [`with_job`](Self::with_job), also signalling `notifier` on completion.
    pub fn with_notifier(job: Arc<dyn Job>, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Self::build(Some(job), Some(notifier))
    }

    #[inline]
    pub fn is_async(&self) -> bool {
        self.job.is_some()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// True until the first completion starts.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Result code, once done.
    #[inline]
    pub fn result(&self) -> Option<i32> {
        if self.is_done() {
            Some(self.result.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Slot currently bound to this context.
    #[inline]
    pub fn slot(&self) -> SlotId {
        SlotId::new(self.slot.load(Ordering::Acquire))
    }

    pub fn job(&self) -> Option<&Arc<dyn Job>> {
        self.job.as_ref()
    }

    pub fn notifier(&self) -> Option<&Arc<dyn Notifier>> {
        self.notifier.as_ref()
    }

    pub(crate) fn bind_slot(&self, slot: SlotId) {
        self.slot.store(slot.as_u32(), Ordering::Release);
    }

    /// Unbind the slot. Exactly one caller gets the bound id back.
    pub(crate) fn take_slot(&self) -> SlotId {
        SlotId::new(self.slot.swap(SlotId::NONE.as_u32(), Ordering::AcqRel))
    }

    /// Record the result. Returns `false` if another completion got here first.
    pub(crate) fn finish(&self, result: i32) -> bool {
        if self
            .state
            .compare_exchange(PENDING, COMPLETING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.result.store(result, Ordering::Relaxed);
        self.state.store(DONE, Ordering::Release);
        true
    }

    /// Signal the notifier, then reschedule the job.
    pub(crate) fn wake(&self) {
        if let Some(n) = &self.notifier {
            if let Err(e) = n.notify() {
                kwarn!("completion notify failed: {}", e);
            }
        }
        if let Some(job) = &self.job {
            job.resume();
        }
    }

    /// Drop a pending notification (rollback paths).
    pub(crate) fn clear_notification(&self) {
        if let Some(n) = &self.notifier {
            if let Err(e) = n.clear() {
                kwarn!("clearing notification failed: {}", e);
            }
        }
    }
}

impl fmt::Debug for AsyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOp")
            .field("async", &self.is_async())
            .field("slot", &self.slot())
            .field("done", &self.is_done())
            .field("result", &self.result())
            .finish()
    }
}

//! `SimAccelerator`: in-process stand-in for an accelerator queue.
//!
//! Submissions land in a bounded lock-free queue; `drain()` pops them,
//! runs their work closure and fires the carrier, the way a hardware
//! poll call fires the per-request callback. Fault hooks let tests and
//! demos exercise the error paths:
//!
//! - `hold()` / `release()`: pause and resume completions
//! - `inject_busy(n)`: the next `n` submissions see a full queue
//! - `inject_reject(code)`: the next submission fails outright
//! - `inject_fatal_after(n, code)`: the queue dies after `n` more completions

use crate::shared::Carrier;

use offload_core::{kwarn, DrainStatus, Drainer, SubmitStatus, TaskType};

use crossbeam_queue::ArrayQueue;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicUsize, Ordering};

type Work = Box<dyn FnOnce() -> i32 + Send>;

struct SimRequest {
    carrier: Carrier,
    work: Work,
}

pub struct SimAccelerator {
    task_type: TaskType,
    queue: ArrayQueue<SimRequest>,
    held: AtomicBool,
    busy_next: AtomicU32,
    /// 0 = no rejection armed
    reject_next: AtomicI32,
    /// Completions left before the queue dies; u64::MAX = never
    fatal_after: AtomicU64,
    fatal_code: AtomicI32,
    dead: AtomicBool,
    completed: AtomicU64,
    high_water: AtomicUsize,
}

impl SimAccelerator {
    pub fn new(task_type: TaskType, depth: usize) -> Self {
        Self {
            task_type,
            queue: ArrayQueue::new(depth.max(1)),
            held: AtomicBool::new(false),
            busy_next: AtomicU32::new(0),
            reject_next: AtomicI32::new(0),
            fatal_after: AtomicU64::new(u64::MAX),
            fatal_code: AtomicI32::new(offload_core::status::ERR_HW_FATAL),
            dead: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Queue `work`; the carrier fires with its return value when drained.
    pub fn submit_async<F>(&self, carrier: Carrier, work: F) -> SubmitStatus
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        if let Some(code) = self.take_rejection() {
            return SubmitStatus::Failed(code);
        }
        if self.take_busy() {
            return SubmitStatus::WouldBlock;
        }
        let req = SimRequest {
            carrier,
            work: Box::new(work),
        };
        if self.queue.push(req).is_err() {
            return SubmitStatus::WouldBlock;
        }
        self.high_water.fetch_max(self.queue.len(), Ordering::Relaxed);
        SubmitStatus::Accepted
    }

    /// Run `work` inline, as a blocking hardware call would.
    pub fn submit_sync<F>(&self, work: F) -> i32
    where
        F: FnOnce() -> i32,
    {
        if let Some(code) = self.take_rejection() {
            return code;
        }
        if self.dead.load(Ordering::Acquire) {
            return self.fatal_code.load(Ordering::Relaxed);
        }
        let r = work();
        self.completed.fetch_add(1, Ordering::Relaxed);
        r
    }

    fn take_rejection(&self) -> Option<i32> {
        let code = self.reject_next.swap(0, Ordering::AcqRel);
        (code != 0).then_some(code)
    }

    fn take_busy(&self) -> bool {
        self.busy_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Stop completing queued requests until `release()`.
    pub fn hold(&self) {
        self.held.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    pub fn inject_busy(&self, n: u32) {
        self.busy_next.store(n, Ordering::Release);
    }

    /// `code` must be negative.
    pub fn inject_reject(&self, code: i32) {
        debug_assert!(code < 0);
        self.reject_next.store(code, Ordering::Release);
    }

    pub fn inject_fatal_after(&self, n: u64, code: i32) {
        self.fatal_code.store(code, Ordering::Relaxed);
        self.fatal_after.store(n, Ordering::Release);
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    /// Drop every queued request without completing it.
    pub fn discard(&self) -> usize {
        let mut n = 0;
        while self.queue.pop().is_some() {
            n += 1;
        }
        n
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Deepest the queue has been
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Consume one unit of the fatal countdown. `true` = the queue just died.
    fn tick_fatal(&self) -> bool {
        let left = self
            .fatal_after
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                u64::MAX | 0 => None,
                n => Some(n - 1),
            });
        matches!(left, Err(0))
    }
}

impl Drainer for SimAccelerator {
    fn drain(&self, min_count: u32) -> DrainStatus {
        if self.dead.load(Ordering::Acquire) {
            return DrainStatus::Fatal(self.fatal_code.load(Ordering::Relaxed));
        }
        if self.held.load(Ordering::Acquire) {
            return DrainStatus::Empty;
        }
        let mut observed = 0;
        while observed < min_count {
            if self.tick_fatal() {
                self.dead.store(true, Ordering::Release);
                let lost = self.discard();
                let code = self.fatal_code.load(Ordering::Relaxed);
                kwarn!("sim {} queue failed ({}), dropped {} requests", self.task_type, code, lost);
                return DrainStatus::Fatal(code);
            }
            let Some(req) = self.queue.pop() else {
                break;
            };
            let r = (req.work)();
            self.completed.fetch_add(1, Ordering::Relaxed);
            req.carrier.complete(r);
            observed += 1;
        }
        if observed == 0 {
            DrainStatus::Empty
        } else {
            DrainStatus::Observed(observed)
        }
    }
}

//! `SlotPool`: fixed-capacity table of in-flight task slots.
//!
//! Slots are handed out in circular order starting from the next-submit
//! cursor. Each slot moves through:
//!
//! ```text
//! Free ──acquire()──▶ Reserved ──publish()──▶ InFlight
//!   ▲                    │                       │
//!   └──── release() ─────┴───────────────────────┘
//! ```
//!
//! `Reserved` slots belong to a submitter that has not handed its request
//! to the poll driver yet. `InFlight` slots are counted per task type; the
//! poll driver only drains types with a non-zero count.
//!
//! All table writes happen under one short-held mutex. The table never
//! grows after construction.

use crate::async_op::AsyncOp;
use crate::bitmap::OccupancyBitmap;

use offload_core::{ktrace, OffloadError, Result, SlotId, TaskType};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Reserved,
    InFlight,
}

/// Outcome of publishing a reserved slot to the poll driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The slot is now in flight for this task type.
    Published(TaskType),
    /// The context completed (and released the slot) before publication.
    AlreadyCompleted,
    /// The pool is closed; the driver will not drain this slot.
    Closed,
}

struct SlotEntry {
    state: SlotState,
    task_type: Option<TaskType>,
    /// Back-reference to the owning context. Not the owner.
    op: Option<Arc<AsyncOp>>,
}

impl SlotEntry {
    const fn free() -> Self {
        Self {
            state: SlotState::Free,
            task_type: None,
            op: None,
        }
    }
}

struct PoolInner {
    entries: Box<[SlotEntry]>,
    /// Next-submit cursor
    next_submit: usize,
    /// Set while no poll driver is running
    closed: bool,
}

pub struct SlotPool {
    inner: Mutex<PoolInner>,
    occupancy: OccupancyBitmap,
    inflight: [AtomicUsize; TaskType::COUNT],
    capacity: usize,
}

impl SlotPool {
    /// Create a closed pool with `capacity` free slots.
    pub fn new(capacity: usize) -> Self {
        let entries: Vec<SlotEntry> = (0..capacity).map(|_| SlotEntry::free()).collect();
        Self {
            inner: Mutex::new(PoolInner {
                entries: entries.into_boxed_slice(),
                next_submit: 0,
                closed: true,
            }),
            occupancy: OccupancyBitmap::new(capacity),
            inflight: Default::default(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the next free slot in circular order.
    pub fn acquire(&self) -> Result<SlotId> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(OffloadError::NotRunning);
        }
        let idx = self
            .occupancy
            .find_free_from(inner.next_submit)
            .ok_or(OffloadError::Exhausted)?;
        self.occupancy.set(idx);
        inner.entries[idx].state = SlotState::Reserved;
        inner.next_submit = (idx + 1) % self.capacity;
        Ok(SlotId::new(idx as u32))
    }

    /// Record the task type and owning context of a reserved slot.
    pub fn attach(&self, slot: SlotId, task_type: TaskType, op: &Arc<AsyncOp>) -> Result<()> {
        let idx = self.index(slot)?;
        let mut inner = self.lock();
        let entry = &mut inner.entries[idx];
        if entry.state != SlotState::Reserved || entry.op.is_some() {
            return Err(OffloadError::InvalidSlot(slot.as_u32()));
        }
        entry.task_type = Some(task_type);
        entry.op = Some(Arc::clone(op));
        Ok(())
    }

    /// Hand a reserved slot to the poll driver.
    ///
    /// The slot must still be reserved for `op`; a completion that raced
    /// ahead of publication has already released it (and the index may
    /// have been reused by another context since).
    pub fn publish(&self, slot: SlotId, op: &Arc<AsyncOp>) -> Publish {
        let Some(idx) = slot.to_option().map(SlotId::as_usize) else {
            return Publish::AlreadyCompleted;
        };
        if idx >= self.capacity {
            return Publish::AlreadyCompleted;
        }
        let mut inner = self.lock();
        if inner.closed {
            return Publish::Closed;
        }
        let entry = &mut inner.entries[idx];
        let owned = entry
            .op
            .as_ref()
            .map_or(false, |bound| Arc::ptr_eq(bound, op));
        if entry.state != SlotState::Reserved || !owned {
            return Publish::AlreadyCompleted;
        }
        let Some(task_type) = entry.task_type else {
            return Publish::AlreadyCompleted;
        };
        entry.state = SlotState::InFlight;
        self.inflight[task_type.as_index()].fetch_add(1, Ordering::AcqRel);
        Publish::Published(task_type)
    }

    /// Mark a slot free. Idempotent: releasing a free slot returns `false`.
    ///
    /// `from_callback` tells a completion-path release from an error-unwind
    /// release; both give the slot back, only the trace differs.
    pub fn release(&self, slot: SlotId, from_callback: bool) -> bool {
        self.release_if(slot, from_callback, |_| true)
    }

    /// Like [`release`](Self::release), but only while the slot is still
    /// bound to `op`. A slot freed and reused in between is left alone.
    pub fn release_bound(&self, slot: SlotId, op: &AsyncOp, from_callback: bool) -> bool {
        self.release_if(slot, from_callback, |bound| {
            bound.map_or(false, |b| std::ptr::eq(Arc::as_ptr(b), op))
        })
    }

    fn release_if<F>(&self, slot: SlotId, from_callback: bool, owner_ok: F) -> bool
    where
        F: FnOnce(Option<&Arc<AsyncOp>>) -> bool,
    {
        let Ok(idx) = self.index(slot) else {
            return false;
        };
        let op = {
            let mut inner = self.lock();
            let entry = &mut inner.entries[idx];
            if entry.state == SlotState::Free || !owner_ok(entry.op.as_ref()) {
                return false;
            }
            if entry.state == SlotState::InFlight {
                if let Some(ty) = entry.task_type {
                    self.inflight[ty.as_index()].fetch_sub(1, Ordering::AcqRel);
                }
            }
            entry.state = SlotState::Free;
            entry.task_type = None;
            self.occupancy.clear(idx);
            entry.op.take()
        };
        // Drop the back-reference outside the lock.
        drop(op);
        ktrace!(
            "slot {} released ({})",
            idx,
            if from_callback { "completion" } else { "unwind" }
        );
        true
    }

    /// Contexts of every in-flight slot of `task_type`, in one pass.
    pub fn inflight_ops(&self, task_type: TaskType) -> Vec<Arc<AsyncOp>> {
        if self.inflight(task_type) == 0 {
            return Vec::new();
        }
        let inner = self.lock();
        let ops = inner
            .entries
            .iter()
            .filter(|e| e.state == SlotState::InFlight && e.task_type == Some(task_type))
            .filter_map(|e| e.op.clone())
            .collect();
        ops
    }

    /// Stop accepting acquisitions and publications.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Accept acquisitions and publications again.
    pub fn open(&self) {
        self.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn state(&self, slot: SlotId) -> Option<SlotState> {
        let idx = self.index(slot).ok()?;
        Some(self.lock().entries[idx].state)
    }

    /// Number of occupied (reserved or in-flight) slots
    #[inline]
    pub fn occupied(&self) -> usize {
        self.occupancy.count_set()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// In-flight slots of one task type
    #[inline]
    pub fn inflight(&self, task_type: TaskType) -> usize {
        self.inflight[task_type.as_index()].load(Ordering::Acquire)
    }

    /// In-flight slots across all task types
    pub fn total_inflight(&self) -> usize {
        self.inflight.iter().map(|c| c.load(Ordering::Acquire)).sum()
    }

    fn index(&self, slot: SlotId) -> Result<usize> {
        match slot.to_option() {
            Some(s) if s.as_usize() < self.capacity => Ok(s.as_usize()),
            _ => Err(OffloadError::InvalidSlot(slot.as_u32())),
        }
    }
}

//! `OffloadShared`: state shared by submitters, the poll driver and
//! completion callbacks; `Carrier`: the handle a completion callback
//! holds for one request.
//!
//! # Lifecycle of one async request
//!
//! ```text
//! submitter                         poll driver / callback
//! ─────────                         ──────────────────────
//! prepare_suspension(op)
//! acquire_slot()      ── empty ──▶
//! attach(op, slot, ty) → Carrier
//! <hardware submit>
//! publish(op)         ── full ──▶   drain(ty) → Carrier::complete(r)
//! park(op)  ◀──────── resume ─────  complete(op, r): finish, release slot, wake
//! ```
//!
//! Whichever of `complete` and `rollback` runs first takes the slot off
//! the context, so a slot is released once and its unit returned once.
//!
//! A task type whose completion queue reported fatal stays failed until the
//! pool is reopened: `attach` refuses it and `publish` resolves a request
//! the sweep missed.

use crate::async_op::AsyncOp;
use crate::config::{AcquirePolicy, CoordinatorConfig};
use crate::gate::FlowGate;
use crate::registry::CompletionRegistry;
use crate::slot_pool::{Publish, SlotPool};
use crate::stats::OffloadStats;

use offload_core::{kdebug, ktrace, Job, OffloadError, Result, SlotId, TaskType};

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};

pub struct OffloadShared {
    pool: SlotPool,
    gate: FlowGate,
    registry: CompletionRegistry,
    stats: OffloadStats,
    config: CoordinatorConfig,
    /// Fatal drain status per task type, 0 while healthy
    failed: [AtomicI32; TaskType::COUNT],
}

impl OffloadShared {
    pub fn new(config: CoordinatorConfig, registry: CompletionRegistry) -> Result<Self> {
        config.validate().map_err(OffloadError::Config)?;
        Ok(Self {
            pool: SlotPool::new(config.capacity),
            gate: FlowGate::new(config.capacity as u32),
            registry,
            stats: OffloadStats::new(),
            config,
            failed: Default::default(),
        })
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    pub fn gate(&self) -> &FlowGate {
        &self.gate
    }

    pub fn registry(&self) -> &CompletionRegistry {
        &self.registry
    }

    /// Setup-time access; the caller must hold the only reference.
    pub fn registry_mut(&mut self) -> &mut CompletionRegistry {
        &mut self.registry
    }

    pub fn stats(&self) -> &OffloadStats {
        &self.stats
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // --- slots ---

    /// Acquire a slot under the configured policy.
    pub fn acquire_slot(&self) -> Result<SlotId> {
        match self.config.acquire {
            AcquirePolicy::FailFast => self.try_acquire_slot(),
            AcquirePolicy::Block => {
                // Wake periodically so a stop is noticed.
                while !self.gate.wait_for_slot(Some(self.config.poll_idle)) {
                    if self.pool.is_closed() {
                        return Err(OffloadError::NotRunning);
                    }
                }
                self.take_reserved_unit()
            }
        }
    }

    /// Acquire a slot without waiting.
    pub fn try_acquire_slot(&self) -> Result<SlotId> {
        if !self.gate.try_wait_for_slot() {
            self.stats.record_exhausted();
            return Err(OffloadError::Exhausted);
        }
        self.take_reserved_unit()
    }

    fn take_reserved_unit(&self) -> Result<SlotId> {
        match self.pool.acquire() {
            Ok(slot) => Ok(slot),
            Err(e) => {
                // Hand the unit back; no slot was taken with it.
                self.gate.signal_slot_freed();
                if e == OffloadError::Exhausted {
                    self.stats.record_exhausted();
                }
                Err(e)
            }
        }
    }

    /// Release a slot and return its unit to the gate. Idempotent.
    pub fn free_slot(&self, slot: SlotId, from_callback: bool) -> bool {
        if self.pool.release(slot, from_callback) {
            self.gate.signal_slot_freed();
            true
        } else {
            false
        }
    }

    fn free_bound_slot(&self, slot: SlotId, op: &AsyncOp, from_callback: bool) -> bool {
        if self.pool.release_bound(slot, op, from_callback) {
            self.gate.signal_slot_freed();
            true
        } else {
            false
        }
    }

    // --- suspension ---

    /// Arm a context before it is bound to a slot.
    pub fn prepare_suspension(&self, op: &AsyncOp) -> Result<()> {
        if !op.is_async() {
            return Err(OffloadError::NotAsync);
        }
        if let Some(n) = op.notifier() {
            n.clear()?;
        }
        Ok(())
    }

    /// Bind a reserved slot to `op` and hand out the completion carrier.
    pub fn attach(self: &Arc<Self>, op: &Arc<AsyncOp>, slot: SlotId, task_type: TaskType) -> Result<Carrier> {
        if let Some(code) = self.failed_status(task_type) {
            return Err(OffloadError::Hardware(code));
        }
        self.pool.attach(slot, task_type, op)?;
        op.bind_slot(slot);
        Ok(Carrier {
            op: Arc::clone(op),
            shared: Arc::downgrade(self),
        })
    }

    /// Hand an accepted request to the poll driver.
    pub fn publish(&self, op: &Arc<AsyncOp>) -> Result<()> {
        match self.pool.publish(op.slot(), op) {
            Publish::Published(task_type) => {
                self.stats.record_async_submit();
                // Checked after the slot went in flight: either the fatal
                // sweep saw it or this sees the mark.
                if let Some(code) = self.failed_status(task_type) {
                    self.complete(op, code);
                    return Ok(());
                }
                self.gate.signal_task_ready();
                ktrace!("published {} request on slot {}", task_type, op.slot());
                Ok(())
            }
            Publish::AlreadyCompleted => {
                self.stats.record_async_submit();
                Ok(())
            }
            Publish::Closed => {
                // Nobody will drain it; resolve it here.
                self.complete(op, offload_core::status::ERR_SHUTDOWN);
                Err(OffloadError::NotRunning)
            }
        }
    }

    /// Suspend the caller until `op` is done. Returns the result code.
    pub fn park(&self, op: &AsyncOp) -> Result<i32> {
        let job = op.job().ok_or(OffloadError::NotAsync)?;
        while !op.is_done() {
            job.suspend_current();
        }
        op.result().ok_or(OffloadError::NotAsync)
    }

    /// Resolve a context: record the result, release its slot, wake its job.
    ///
    /// Returns `false` (and does nothing) if the context was already resolved.
    pub fn complete(&self, op: &AsyncOp, result: i32) -> bool {
        if !op.finish(result) {
            self.stats.record_duplicate();
            ktrace!("duplicate completion ignored (result {})", result);
            return false;
        }
        if let Some(slot) = op.take_slot().to_option() {
            self.free_bound_slot(slot, op, true);
        }
        self.stats.record_completion(result);
        op.wake();
        true
    }

    /// Unwind a failed submission: release the slot (if still bound) and
    /// drop any armed notification. The caller is not parked.
    pub fn rollback(&self, op: &AsyncOp) {
        if let Some(slot) = op.take_slot().to_option() {
            self.free_bound_slot(slot, op, false);
        }
        op.clear_notification();
    }

    /// Resolve every in-flight context of `task_type` with `code`.
    pub fn fail_inflight(&self, task_type: TaskType, code: i32) -> usize {
        let mut failed = 0;
        // Collected under the pool lock, completed outside it.
        for op in self.pool.inflight_ops(task_type) {
            if self.complete(&op, code) {
                failed += 1;
            }
        }
        if failed > 0 {
            kdebug!("resolved {} in-flight {} requests with status {}", failed, task_type, code);
        }
        failed
    }

    /// Mark `task_type` failed with a fatal drain status. Later requests
    /// of that type are refused or resolved with `code` until `open`.
    /// Returns the stored code; a zero status is stored as `ERR_HW_FATAL`.
    pub fn mark_failed(&self, task_type: TaskType, code: i32) -> i32 {
        let code = if code == 0 { offload_core::status::ERR_HW_FATAL } else { code };
        self.failed[task_type.as_index()].store(code, Ordering::SeqCst);
        code
    }

    /// The fatal status `task_type` was marked with, if any.
    pub fn failed_status(&self, task_type: TaskType) -> Option<i32> {
        match self.failed[task_type.as_index()].load(Ordering::SeqCst) {
            0 => None,
            code => Some(code),
        }
    }

    /// Accept acquisitions and publications. Clears failed task types.
    pub fn open(&self) {
        for f in &self.failed {
            f.store(0, Ordering::SeqCst);
        }
        self.pool.open();
    }

    /// Refuse new acquisitions and publications.
    pub fn close(&self) {
        self.pool.close();
    }
}

/// Completion handle passed to the hardware with a request.
///
/// Holds the coordinator weakly: a completion that arrives after the
/// coordinator is gone is dropped.
#[derive(Clone)]
pub struct Carrier {
    op: Arc<AsyncOp>,
    shared: Weak<OffloadShared>,
}

impl Carrier {
    /// Report the hardware status for this request.
    ///
    /// Only the first call per request has any effect.
    pub fn complete(&self, result: i32) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.complete(&self.op, result),
            None => false,
        }
    }

    pub fn op(&self) -> &Arc<AsyncOp> {
        &self.op
    }
}

impl std::fmt::Debug for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Carrier").field("op", &self.op).finish()
    }
}

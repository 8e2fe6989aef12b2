//! `Coordinator`: the explicitly constructed offload core.
//!
//! Owns the shared state (slot pool, gate, registry, stats) and the poll
//! driver. Submitters share it by reference; setup (drain registration)
//! needs `&mut` and an idle driver.
//!
//! # Submission protocol
//!
//! ```text
//! execute(op, req)
//!   ├─ sync context ──▶ req.submit_sync() ─────────────────────▶ status
//!   └─ async context
//!        prepare_suspension ─▶ get slot ─▶ attach ─▶ submit_async
//!                                                     ├─ Accepted ─▶ publish ─▶ park ─▶ status
//!                                                     ├─ WouldBlock (bounded retry)
//!                                                     └─ Failed / gave up ─▶ rollback, no park
//! ```

use crate::request::OffloadRequest;

use offload_core::{kdebug, kwarn, Drainer, OffloadError, Result, SlotId, SubmitStatus, TaskType};
use offload_executor::{DriverState, PollDriver};
use offload_module::{AsyncOp, CompletionRegistry, CoordinatorConfig, OffloadShared, StatsSnapshot};

use std::sync::Arc;

/// Setup-time builder.
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    registry: CompletionRegistry,
}

impl CoordinatorBuilder {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            registry: CompletionRegistry::new(),
        }
    }

    /// Install the drainer for one task type.
    pub fn register_drain(mut self, task_type: TaskType, drainer: Arc<dyn Drainer>) -> Self {
        self.registry.register(task_type, drainer);
        self
    }

    pub fn build(self) -> Result<Coordinator> {
        let shared = OffloadShared::new(self.config, self.registry)?;
        Ok(Coordinator {
            shared: Arc::new(shared),
            driver: PollDriver::new(),
        })
    }

    /// Build and start the poll driver.
    pub fn start(self) -> Result<Coordinator> {
        let mut coord = self.build()?;
        coord.start()?;
        Ok(coord)
    }
}

pub struct Coordinator {
    shared: Arc<OffloadShared>,
    driver: PollDriver,
}

impl Coordinator {
    pub fn builder(config: CoordinatorConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    /// A coordinator with no drainers. Register them before `start`.
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        CoordinatorBuilder::new(config).build()
    }

    pub fn from_env() -> Result<Self> {
        Self::new(CoordinatorConfig::from_env())
    }

    // --- lifecycle ---

    /// Install (or replace) a drainer. Only while the driver is idle and
    /// no completion handle is outstanding.
    pub fn register_drain(&mut self, task_type: TaskType, drainer: Arc<dyn Drainer>) -> Result<()> {
        if self.driver.state() != DriverState::Idle {
            return Err(OffloadError::Shared);
        }
        let shared = Arc::get_mut(&mut self.shared).ok_or(OffloadError::Shared)?;
        shared.registry_mut().register(task_type, drainer);
        Ok(())
    }

    /// Start the poll driver. Starting twice is a no-op.
    pub fn start(&mut self) -> Result<()> {
        self.driver.start(&self.shared)
    }

    /// Stop the poll driver. Every in-flight request is resolved (drained
    /// or failed with `ERR_SHUTDOWN`) before this returns.
    pub fn stop(&mut self) {
        self.driver.stop();
    }

    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    // --- protocol primitives ---

    /// Acquire a slot under the configured policy.
    pub fn get_free_slot(&self) -> Result<SlotId> {
        self.shared.acquire_slot()
    }

    /// Acquire a slot without waiting, whatever the policy.
    pub fn try_get_free_slot(&self) -> Result<SlotId> {
        self.shared.try_acquire_slot()
    }

    /// Release a slot. Releasing a free slot is a no-op (`false`).
    pub fn free_slot(&self, slot: SlotId, from_callback: bool) -> bool {
        self.shared.free_slot(slot, from_callback)
    }

    pub fn prepare_suspension(&self, op: &AsyncOp) -> Result<()> {
        self.shared.prepare_suspension(op)
    }

    /// Suspend until `op` completes. Returns its result code.
    pub fn park(&self, op: &AsyncOp) -> Result<i32> {
        self.shared.park(op)
    }

    /// Resolve `op`. Returns `false` if it was already resolved.
    pub fn complete(&self, op: &AsyncOp, result: i32) -> bool {
        self.shared.complete(op, result)
    }

    // --- full protocol ---

    /// Run `req` on the hardware.
    ///
    /// With a synchronous context this is `req.submit_sync()`. With an
    /// async context the caller's job is parked until the poll driver
    /// resolves the request. Errors mean nothing was committed and the
    /// caller should use its software path.
    pub fn execute<R>(&self, op: &Arc<AsyncOp>, req: &mut R) -> Result<()>
    where
        R: OffloadRequest + ?Sized,
    {
        let stats = self.shared.stats();

        if !op.is_async() {
            stats.record_sync_submit();
            return match req.submit_sync() {
                0 => Ok(()),
                r => Err(OffloadError::Hardware(r)),
            };
        }

        if !op.is_pending() || !op.slot().is_none() {
            return Err(OffloadError::ContextReused);
        }
        if !self.driver.is_running() {
            return Err(OffloadError::NotRunning);
        }

        let task_type = req.task_type();
        self.shared.prepare_suspension(op)?;

        let slot = match self.shared.acquire_slot() {
            Ok(slot) => slot,
            Err(e) => {
                self.shared.rollback(op);
                return Err(e);
            }
        };

        let carrier = match self.shared.attach(op, slot, task_type) {
            Ok(c) => c,
            Err(e) => {
                self.shared.free_slot(slot, false);
                self.shared.rollback(op);
                return Err(e);
            }
        };

        let mut retries = 0;
        loop {
            match req.submit_async(carrier.clone()) {
                SubmitStatus::Accepted => break,
                SubmitStatus::WouldBlock => {
                    if retries >= self.shared.config().submit_retries {
                        stats.record_busy_giveup();
                        self.shared.rollback(op);
                        kdebug!("{} submission still busy after {} retries", task_type, retries);
                        return Err(OffloadError::Busy);
                    }
                    retries += 1;
                    stats.record_busy_retry();
                    std::thread::yield_now();
                }
                SubmitStatus::Failed(code) => {
                    stats.record_rejected();
                    self.shared.rollback(op);
                    kwarn!("{} submission rejected: status {}", task_type, code);
                    return Err(OffloadError::Hardware(code));
                }
            }
        }
        drop(carrier);

        self.shared.publish(op)?;
        match self.shared.park(op)? {
            0 => Ok(()),
            r => Err(OffloadError::Hardware(r)),
        }
    }

    /// [`execute`](Self::execute), then `commit` the hardware output, or on
    /// any error run `software` instead.
    pub fn execute_or_else<R, T, C, S>(&self, op: &Arc<AsyncOp>, req: &mut R, commit: C, software: S) -> T
    where
        R: OffloadRequest + ?Sized,
        C: FnOnce(&mut R) -> T,
        S: FnOnce(&mut R) -> T,
    {
        match self.execute(op, req) {
            Ok(()) => commit(req),
            Err(e) => {
                self.shared.stats().record_fallback();
                kdebug!("{} request falling back to software: {}", req.task_type(), e);
                software(req)
            }
        }
    }

    // --- introspection ---

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats().snapshot()
    }

    /// Occupied (reserved or in-flight) slots
    pub fn occupied(&self) -> usize {
        self.shared.pool().occupied()
    }

    pub fn inflight(&self, task_type: TaskType) -> usize {
        self.shared.pool().inflight(task_type)
    }

    pub fn capacity(&self) -> usize {
        self.shared.pool().capacity()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        self.shared.config()
    }

    pub fn shared(&self) -> &Arc<OffloadShared> {
        &self.shared
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

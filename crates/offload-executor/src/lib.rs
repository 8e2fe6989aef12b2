//! # offload-executor: The Poll Driver
//!
//! One dedicated thread per coordinator runs this loop:
//!
//! ```text
//! while RUNNING {
//!     1. Nothing in flight? Sleep on the work signal (bounded), continue.
//!     2. For each task type with requests in flight:
//!          no drainer    → resolve them with ERR_UNREGISTERED
//!          drain(min)    → Observed: callbacks already fired
//!                        → Empty:    try again next iteration
//!                        → Fatal:    mark the type failed, resolve them
//!                        → panic:    same as Fatal(ERR_HW_FATAL)
//!     3. No progress? Back off (spin → yield → sleep, capped).
//! }
//! close pool → final drain pass → resolve leftovers with ERR_SHUTDOWN
//! ```
//!
//! The in-flight counters in the slot pool are the source of truth for
//! whether there is work. Work tokens only wake the idle driver; extra
//! tokens cost one empty iteration.

use offload_core::status::{ERR_HW_FATAL, ERR_SHUTDOWN, ERR_UNREGISTERED};
use offload_core::{kdebug, kerror, kinfo, kwarn, DrainStatus, OffloadError, Result, TaskType};
use offload_module::OffloadShared;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll driver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl DriverState {
    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            1 => DriverState::Running,
            2 => DriverState::Stopping,
            _ => DriverState::Idle,
        }
    }

    #[inline]
    pub fn load(cell: &AtomicU8) -> Self {
        Self::from_u8(cell.load(Ordering::Acquire))
    }
}

/// Bounded backoff between empty drain iterations.
pub struct Backoff {
    step: u32,
    spins: u32,
    sleep: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(spins: u32, max: Duration) -> Self {
        Self {
            step: 0,
            spins,
            sleep: Duration::from_micros(1).min(max),
            max,
        }
    }

    /// Wait a little longer than last time.
    pub fn snooze(&mut self) {
        if self.step < self.spins {
            std::hint::spin_loop();
        } else if self.step < self.spins.saturating_mul(2) || self.sleep.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.sleep);
            self.sleep = (self.sleep * 2).min(self.max);
        }
        self.step = self.step.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.step = 0;
        self.sleep = Duration::from_micros(1).min(self.max);
    }

    /// True once spinning and yielding are exhausted.
    pub fn is_sleeping(&self) -> bool {
        self.step >= self.spins.saturating_mul(2) && !self.sleep.is_zero()
    }
}

/// Owns the poll thread.
pub struct PollDriver {
    state: Arc<AtomicU8>,
    shared: Option<Arc<OffloadShared>>,
    thread: Option<JoinHandle<()>>,
}

impl PollDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(DriverState::Idle as u8)),
            shared: None,
            thread: None,
        }
    }

    pub fn state(&self) -> DriverState {
        DriverState::load(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == DriverState::Running
    }

    /// IDLE → RUNNING. Starting a running driver does nothing.
    pub fn start(&mut self, shared: &Arc<OffloadShared>) -> Result<()> {
        if self.state() != DriverState::Idle {
            return Ok(());
        }
        if shared.registry().registered().next().is_none() {
            kwarn!("poll driver starting with no drainers registered");
        }

        shared.open();
        self.state.store(DriverState::Running as u8, Ordering::Release);

        let thread_shared = Arc::clone(shared);
        let thread_state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name("offload-poll".into())
            .spawn(move || poll_loop(&thread_shared, &thread_state));

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                self.shared = Some(Arc::clone(shared));
                Ok(())
            }
            Err(e) => {
                kwarn!("failed to spawn poll driver: {}", e);
                shared.close();
                self.state.store(DriverState::Idle as u8, Ordering::Release);
                Err(OffloadError::SpawnFailed)
            }
        }
    }

    /// RUNNING → STOPPING → IDLE. Returns once the thread has exited and
    /// every in-flight request is resolved.
    pub fn stop(&mut self) {
        if self.state() != DriverState::Running {
            return;
        }
        self.state.store(DriverState::Stopping as u8, Ordering::Release);
        if let Some(shared) = &self.shared {
            // Wake an idle driver now rather than at its next timeout.
            shared.gate().signal_task_ready();
        }
        let died = match self.thread.take() {
            Some(handle) => handle.join().is_err(),
            None => false,
        };
        if let Some(shared) = self.shared.take() {
            if died {
                kerror!("poll driver thread panicked");
                fail_leftovers(&shared);
            }
            shared.close();
        }
        self.state.store(DriverState::Idle as u8, Ordering::Release);
    }
}

impl Default for PollDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The poll loop. Runs until `state` leaves RUNNING.
pub fn poll_loop(shared: &OffloadShared, state: &AtomicU8) {
    let config = shared.config();
    let mut backoff = Backoff::new(config.poll_spins, config.poll_backoff_max);

    kinfo!(
        "poll driver started: capacity={}, drain_min={}",
        shared.pool().capacity(),
        config.drain_min
    );

    while DriverState::load(state) == DriverState::Running {
        if shared.pool().total_inflight() == 0 {
            shared.gate().wait_for_work(Some(config.poll_idle));
            backoff.reset();
            continue;
        }

        // Counters are authoritative while busy; drop the tokens.
        shared.gate().absorb_work_signals();

        if drain_pass(shared, config.drain_min) {
            backoff.reset();
        } else {
            backoff.snooze();
        }
    }

    // No publication can land after this.
    shared.close();
    drain_pass(shared, config.drain_min);
    fail_leftovers(shared);

    kinfo!("poll driver stopped");
}

/// Close the pool and resolve whatever is still in flight with `ERR_SHUTDOWN`.
fn fail_leftovers(shared: &OffloadShared) {
    shared.close();
    for ty in TaskType::iter() {
        let n = shared.fail_inflight(ty, ERR_SHUTDOWN);
        if n > 0 {
            kwarn!("shutdown: {} {} requests still in flight, failed", n, ty);
        }
    }
}

/// Drain every task type that has requests in flight.
///
/// Returns `true` if any request was resolved.
pub fn drain_pass(shared: &OffloadShared, min_count: u32) -> bool {
    let mut progressed = false;

    for ty in TaskType::iter() {
        if shared.pool().inflight(ty) == 0 {
            continue;
        }

        let Some(drainer) = shared.registry().get(ty) else {
            let n = shared.fail_inflight(ty, ERR_UNREGISTERED);
            kwarn!("no drainer for {}: failed {} requests", ty, n);
            progressed |= n > 0;
            continue;
        };

        shared.stats().record_drain();
        let status = match panic::catch_unwind(AssertUnwindSafe(|| drainer.drain(min_count))) {
            Ok(status) => status,
            Err(_) => {
                kerror!("{} drainer panicked", ty);
                DrainStatus::Fatal(ERR_HW_FATAL)
            }
        };
        match status {
            DrainStatus::Observed(n) => progressed |= n > 0,
            DrainStatus::Empty => {}
            DrainStatus::Fatal(code) => {
                shared.stats().record_fatal_drain();
                // Mark before sweeping; `publish` checks after going in flight.
                let code = shared.mark_failed(ty, code);
                let n = shared.fail_inflight(ty, code);
                kwarn!("{} completion queue failed ({}): failed {} requests", ty, code, n);
                progressed = true;
            }
        }
    }

    if progressed {
        kdebug!("drain pass: {} still in flight", shared.pool().total_inflight());
    }
    progressed
}

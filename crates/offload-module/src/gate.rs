//! `FlowGate`: the two counting signals between submitters and the poll driver.
//!
//! - `empty`: free slots. Starts at capacity; a submitter takes one unit
//!   before acquiring a slot, a release gives it back.
//! - `full`: work-pending tokens. Starts at 0; every publication adds one,
//!   the poll driver takes them while idle.
//!
//! Every thread that touches the gate is an OS thread: the poll driver,
//! or a submitter that has not parked yet.

use crate::semaphore::{CountingSignal, Semaphore};

use std::time::Duration;

pub struct FlowGate {
    empty: Semaphore,
    full: Semaphore,
    capacity: u32,
}

impl FlowGate {
    pub fn new(capacity: u32) -> Self {
        Self {
            empty: Semaphore::new(capacity),
            full: Semaphore::new(0),
            capacity,
        }
    }

    /// Block until a slot unit is available (or `timeout` elapses) and take it.
    #[inline]
    pub fn wait_for_slot(&self, timeout: Option<Duration>) -> bool {
        self.empty.wait(timeout)
    }

    /// Take a slot unit if one is available right now.
    #[inline]
    pub fn try_wait_for_slot(&self) -> bool {
        self.empty.try_wait()
    }

    /// Return a slot unit.
    #[inline]
    pub fn signal_slot_freed(&self) {
        debug_assert!(self.empty.value() < self.capacity, "slot unit returned twice");
        self.empty.post();
    }

    /// Announce one published task to the poll driver.
    #[inline]
    pub fn signal_task_ready(&self) {
        self.full.post();
    }

    /// Block until a work token arrives (or `timeout` elapses) and take it.
    #[inline]
    pub fn wait_for_work(&self, timeout: Option<Duration>) -> bool {
        self.full.wait(timeout)
    }

    /// Take every queued work token. Returns how many were taken.
    pub fn absorb_work_signals(&self) -> u32 {
        let mut n = 0;
        while self.full.try_wait() {
            n += 1;
        }
        n
    }

    /// Free slot units (hint).
    #[inline]
    pub fn available_slots(&self) -> u32 {
        self.empty.value()
    }

    /// Queued work tokens (hint).
    #[inline]
    pub fn pending_work(&self) -> u32 {
        self.full.value()
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

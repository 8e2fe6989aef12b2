//! Suspend/resume capability.
//!
//! A `Job` stands for the caller's cooperative execution unit. The bridge
//! only needs two operations from it: park the current unit, and ask for a
//! parked unit to be rescheduled. Any concurrency primitive can back it: a
//! fiber, a green thread, or a plain OS thread parked on a condvar.

/// The caller's cooperative execution unit.
///
/// **Contract:**
/// - `suspend_current()` is called only by the unit itself, and only from
///   `park()`. It may return spuriously; `park()` re-checks the done flag.
/// - `resume()` may be called from any thread, before or after
///   `suspend_current()`. A resume that arrives first must not be lost.
/// - `resume()` must NEVER block.
pub trait Job: Send + Sync {
    /// Yield the current unit back to its scheduler until resumed.
    fn suspend_current(&self);

    /// Request that the suspended unit be rescheduled.
    fn resume(&self);
}

//! Per-type completion drain abstraction.
//!
//! A `Drainer` polls the hardware completion queue of one task type. For
//! every finished request it invokes the completion callback the request
//! was submitted with; that callback resolves the suspension context and
//! returns the slot to the pool.
//!
//! # Implementors
//!
//! - Algorithm collaborators wrap their SDK's poll primitive
//!   (`drain(task_type, min_count) -> (observed, status)`).
//! - `SimAccelerator` (offload-module): software queue for tests and demos.
//! - Any `Fn(u32) -> DrainStatus + Send + Sync` closure.

use crate::status::DrainStatus;

/// Drains one task type's completion queue.
///
/// **Contract:**
/// - Only the poll driver calls `drain()`. It never races with itself on
///   the same task type.
/// - `min_count` is at least 1.
/// - Returning `Empty` is not an error.
/// - Returning `Fatal` (or panicking) fails every in-flight context of this
///   type, and the type stays failed until the driver restarts. A single
///   `Fatal` is enough; it need not repeat on later calls.
pub trait Drainer: Send + Sync {
    /// Poll for completions, dispatching callbacks for each finished item.
    fn drain(&self, min_count: u32) -> DrainStatus;
}

impl<F> Drainer for F
where
    F: Fn(u32) -> DrainStatus + Send + Sync,
{
    fn drain(&self, min_count: u32) -> DrainStatus {
        self(min_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_drainer() {
        let d = |n: u32| DrainStatus::Observed(n);
        assert_eq!(d.drain(2), DrainStatus::Observed(2));

        let boxed: Box<dyn Drainer> = Box::new(|_n: u32| DrainStatus::Empty);
        assert_eq!(boxed.drain(1), DrainStatus::Empty);
    }
}

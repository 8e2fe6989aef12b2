//! Completion notification abstraction.
//!
//! A `Notifier` wakes an external event loop when a suspension context
//! completes. Hosts that multiplex parked jobs over epoll watch the
//! notifier's descriptor instead of polling every context.
//!
//! # Implementors
//!
//! - `EventFdNotifier` (default): writes 1 to an eventfd.
//!   Simple, well-understood, compatible with epoll/io_uring poll.

use crate::error::Result;

/// Signals that a parked job can be resumed.
///
/// **Contract:**
/// - `notify()` must NEVER block.
/// - Multiple calls before the consumer wakes are coalesced
///   (eventfd semantics: counter increments, one read drains).
pub trait Notifier: Send + Sync {
    /// Signal that the context completed.
    fn notify(&self) -> Result<()>;

    /// Drop any pending signal. Called when arming and on rollback.
    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

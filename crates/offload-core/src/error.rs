//! Offload error types.
//!
//! Every variant is recoverable from the caller's point of view: the
//! calling layer retries the operation through its software path.

use std::fmt;

use crate::task::TaskType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffloadError {
    /// No free slot and the acquisition policy is fail-fast.
    Exhausted,
    /// Submission kept returning would-block past the retry bound.
    Busy,
    /// Fatal hardware status, from submission or from the completion.
    Hardware(i32),
    /// The poll driver is not running; nothing would drain the request.
    NotRunning,
    /// The context has no job and cannot be parked.
    NotAsync,
    /// The context already carried a request.
    ContextReused,
    /// Slot index outside the pool.
    InvalidSlot(u32),
    /// No drainer registered for the task type.
    Unregistered(TaskType),
    /// eventfd setup/write/read failed.
    Notification(i32),
    /// Poll driver thread could not be spawned.
    SpawnFailed,
    /// Setup-time mutation while the coordinator is shared or running.
    Shared,
    /// Invalid configuration.
    Config(&'static str),
}

impl fmt::Display for OffloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "slot pool exhausted"),
            Self::Busy => write!(f, "hardware queue busy"),
            Self::Hardware(e) => write!(f, "hardware error: status {}", e),
            Self::NotRunning => write!(f, "poll driver not running"),
            Self::NotAsync => write!(f, "context has no job to park"),
            Self::ContextReused => write!(f, "suspension context already used"),
            Self::InvalidSlot(s) => write!(f, "invalid slot {}", s),
            Self::Unregistered(t) => write!(f, "no drainer registered for {}", t),
            Self::Notification(e) => write!(f, "notification failed: errno {}", e),
            Self::SpawnFailed => write!(f, "failed to spawn poll driver thread"),
            Self::Shared => write!(f, "coordinator is shared or running"),
            Self::Config(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for OffloadError {}

pub type Result<T> = std::result::Result<T, OffloadError>;

//! Submit and drain status types, plus suspension-context result codes.
//!
//! Result codes follow the accelerator SDK convention: zero is success,
//! a negative errno is a failure.

/// Success result code.
pub const OK: i32 = 0;

/// The hardware reported a fatal error for this request (EIO).
pub const ERR_HW_FATAL: i32 = -5;

/// The request's task type has no registered drainer (ENOENT).
pub const ERR_UNREGISTERED: i32 = -2;

/// The coordinator shut down with the request still in flight (ESHUTDOWN).
pub const ERR_SHUTDOWN: i32 = -108;

/// Outcome of one asynchronous submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// The hardware queue accepted the request. A completion will follow.
    Accepted,
    /// The hardware queue is busy. The submitter should retry.
    WouldBlock,
    /// The request was rejected outright. No completion will follow.
    Failed(i32),
}

impl SubmitStatus {
    /// Map a raw SDK return value (0, -EBUSY, other negative) to a status.
    pub fn from_raw(ret: i32) -> Self {
        const EBUSY: i32 = 16;
        match ret {
            r if r >= 0 => SubmitStatus::Accepted,
            r if r == -EBUSY => SubmitStatus::WouldBlock,
            r => SubmitStatus::Failed(r),
        }
    }
}

/// Outcome of one drain call for a task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// At least the requested count was observed. Carries the observed count.
    Observed(u32),
    /// Nothing completed yet. Not an error; the poll driver retries.
    Empty,
    /// The completion queue failed. In-flight contexts of this type must be
    /// resolved as failed.
    Fatal(i32),
}

impl DrainStatus {
    /// Number of completions observed by this call
    #[inline]
    pub fn observed(&self) -> u32 {
        match self {
            DrainStatus::Observed(n) => *n,
            _ => 0,
        }
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, DrainStatus::Fatal(_))
    }
}

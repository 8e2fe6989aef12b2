//! The request side of the protocol.

use offload_core::{SubmitStatus, TaskType};
use offload_module::Carrier;

/// One offloadable operation, as the coordinator sees it.
///
/// The request owns its input and output buffers. Whatever the hardware
/// writes stays inside the request until the caller commits it.
pub trait OffloadRequest {
    /// Algorithm family, used to route the drain.
    fn task_type(&self) -> TaskType;

    /// Submit and block until the hardware result is ready. Returns the
    /// status code (0 = success).
    fn submit_sync(&mut self) -> i32;

    /// Queue the request. On `Accepted` the hardware must eventually call
    /// `carrier.complete(status)` exactly once, from whatever thread runs
    /// the drain.
    fn submit_async(&mut self, carrier: Carrier) -> SubmitStatus;
}

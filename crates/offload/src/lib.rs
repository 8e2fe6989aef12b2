//! # offload: Async hardware-offload coordinator
//!
//! Lets a caller hand a request to an accelerator, park its cooperative
//! execution unit while the hardware works, and resume it when a poll
//! driver discovers the completion. Any hardware-path failure falls back
//! to software.
//!
//! ```ignore
//! use offload::{AsyncOp, Coordinator, CoordinatorConfig, TaskType, ThreadJob};
//! use std::sync::Arc;
//!
//! let mut coord = Coordinator::builder(CoordinatorConfig::from_env())
//!     .register_drain(TaskType::Rsa, accelerator.clone())
//!     .build()?;
//! coord.start()?;
//!
//! let op = AsyncOp::with_job(Arc::new(ThreadJob::new()));
//! let out = coord.execute_or_else(&op, &mut request, |r| r.output(), |r| r.compute_in_software());
//! ```
//!
//! ## Crates
//!
//! - `offload-core`: traits, ids, status codes, errors, logging macros
//! - `offload-module`: slot pool, gate, registry, contexts, simulated hardware
//! - `offload-executor`: the poll driver thread

mod coordinator;
mod request;

#[cfg(test)]
mod scenarios;

pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use request::OffloadRequest;

pub use offload_core::status::{ERR_HW_FATAL, ERR_SHUTDOWN, ERR_UNREGISTERED, OK};
pub use offload_core::{
    kdebug, kerror, kinfo, ktrace, kwarn, DrainStatus, Drainer, Job, Notifier, OffloadError, Result,
    SlotId, SubmitStatus, TaskType,
};
pub use offload_executor::DriverState;
pub use offload_module::{
    AcquirePolicy, AsyncOp, Carrier, CoordinatorConfig, SimAccelerator, StatsSnapshot, ThreadJob,
    YieldJob,
};

#[cfg(target_os = "linux")]
pub use offload_module::EventFdNotifier;

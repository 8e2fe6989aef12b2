//! # offload-core: Trait definitions for the offload coordinator
//!
//! This crate defines the boundaries between the async coordination engine
//! and its collaborators. Each trait models one capability:
//!
//! - [`Drainer`]: polls one task type's hardware completion queue
//! - [`Job`]: parks and resumes a caller's cooperative execution unit
//! - [`Notifier`]: signals an external wait descriptor on completion
//!
//! Default implementations live in `offload-module`. Nothing here depends
//! on a particular accelerator SDK or fiber implementation.
//!
//! ## Modules
//!
//! - `task` - Task type tag (one per offloadable algorithm family)
//! - `id` - Slot identifier
//! - `status` - Submit/drain status and context result codes
//! - `drainer` - Per-type completion drain capability
//! - `job` - Suspend/resume capability
//! - `notifier` - Completion notification capability
//! - `error` - Error types
//! - `kprint` - Leveled stderr logging macros
//! - `env` - Environment variable utilities

pub mod task;
pub mod id;
pub mod status;
pub mod drainer;
pub mod job;
pub mod notifier;
pub mod error;
pub mod kprint;
pub mod env;

pub use task::TaskType;
pub use id::SlotId;
pub use status::{DrainStatus, SubmitStatus};
pub use drainer::Drainer;
pub use job::Job;
pub use notifier::Notifier;
pub use error::{OffloadError, Result};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

/// Layout constants shared by the pool and the gate.
pub mod constants {
    /// Default number of in-flight task slots.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Largest pool a coordinator may be configured with.
    pub const MAX_CAPACITY: usize = 65536;

    /// No slot sentinel value.
    pub const SLOT_NONE: u32 = u32::MAX;
}

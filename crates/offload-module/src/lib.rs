//! # offload-module: Default implementations
//!
//! The moving parts of the coordinator, each usable on its own:
//!
//! | Component            | Type                 | Role                                   |
//! |----------------------|----------------------|----------------------------------------|
//! | Slot pool            | [`SlotPool`]         | fixed table of in-flight request slots |
//! | Flow-control gate    | [`FlowGate`]         | free-slot and work-pending signals     |
//! | Completion registry  | [`CompletionRegistry`] | one drainer per task type            |
//! | Suspension context   | [`AsyncOp`]          | done flag, result, bound slot          |
//! | Shared state         | [`OffloadShared`]    | the protocol glue, plus [`Carrier`]    |
//! | Jobs                 | [`ThreadJob`], [`YieldJob`] | ready-made `Job`s               |
//! | Notifier             | `EventFdNotifier`    | eventfd completion signal (Linux)      |
//! | Simulated hardware   | [`SimAccelerator`]   | queue + drainer for tests and demos    |

pub mod semaphore;
pub mod bitmap;
pub mod slot_pool;
pub mod gate;
pub mod registry;
pub mod async_op;
pub mod shared;
pub mod jobs;
pub mod config;
pub mod stats;
pub mod sim;

#[cfg(target_os = "linux")]
pub mod eventfd_notifier;

pub use async_op::AsyncOp;
pub use config::{AcquirePolicy, CoordinatorConfig, MAX_POLL_BACKOFF, MAX_POLL_IDLE};
pub use gate::FlowGate;
pub use jobs::{ThreadJob, YieldJob};
pub use registry::CompletionRegistry;
pub use shared::{Carrier, OffloadShared};
pub use sim::SimAccelerator;
pub use slot_pool::{Publish, SlotPool, SlotState};
pub use stats::{OffloadStats, StatsSnapshot};

#[cfg(target_os = "linux")]
pub use eventfd_notifier::EventFdNotifier;

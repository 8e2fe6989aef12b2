//! `CompletionRegistry`: one drainer per task type.
//!
//! Filled during setup, read-only once the poll driver runs. The driver
//! looks drainers up without locking.

use offload_core::{DrainStatus, Drainer, TaskType};

use std::sync::Arc;

#[derive(Default)]
pub struct CompletionRegistry {
    drainers: [Option<Arc<dyn Drainer>>; TaskType::COUNT],
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the drainer for a task type, returning the one it replaces.
    pub fn register(&mut self, task_type: TaskType, drainer: Arc<dyn Drainer>) -> Option<Arc<dyn Drainer>> {
        self.drainers[task_type.as_index()].replace(drainer)
    }

    pub fn unregister(&mut self, task_type: TaskType) -> Option<Arc<dyn Drainer>> {
        self.drainers[task_type.as_index()].take()
    }

    #[inline]
    pub fn get(&self, task_type: TaskType) -> Option<&Arc<dyn Drainer>> {
        self.drainers[task_type.as_index()].as_ref()
    }

    #[inline]
    pub fn is_registered(&self, task_type: TaskType) -> bool {
        self.drainers[task_type.as_index()].is_some()
    }

    /// Task types with a drainer installed.
    pub fn registered(&self) -> impl Iterator<Item = TaskType> + '_ {
        TaskType::iter().filter(move |t| self.is_registered(*t))
    }

    /// Run one drain for `task_type`. `None` if nothing is registered.
    pub fn drain(&self, task_type: TaskType, min_count: u32) -> Option<DrainStatus> {
        self.get(task_type).map(|d| d.drain(min_count))
    }
}

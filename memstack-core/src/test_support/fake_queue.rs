//! FakeTaskQueue — records enqueued tasks instead of running a worker.

use crate::traits::{ProcessEpisodeTask, TaskQueue, TaskQueueError};
use async_trait::async_trait;
use std::sync::Mutex;

/// A task queue that records every enqueued task for assertion, rather
/// than handing it to a worker.
#[derive(Default)]
pub struct FakeTaskQueue {
    tasks: Mutex<Vec<ProcessEpisodeTask>>,
}

impl FakeTaskQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every task enqueued so far, in enqueue order.
    pub fn tasks(&self) -> Vec<ProcessEpisodeTask> {
        self.tasks.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl TaskQueue for FakeTaskQueue {
    async fn enqueue(&self, task: ProcessEpisodeTask) -> Result<(), TaskQueueError> {
        self.tasks.lock().expect("lock poisoned").push(task);
        Ok(())
    }
}

// Admission Controller - Core use cases for queue management
//
// Each state change is exactly one `QueueStore::atomic_update`; nothing here
// holds a lock across calls, so any number of controllers (in any number of
// processes) may share one store.

pub mod add;
pub mod complete;
pub mod create;
pub mod pop;


pub use create::CreateQueueRequest;
pub use pop::DrainOutcome;

use crate::domain::{Owner, PendingEntry, Queue, QueueId, StartParams, TaskId};
use crate::error::Result;
use crate::port::{IdProvider, QueueFilter, QueueStore, TaskLauncher, TimeProvider};
use std::sync::Arc;

/// Admission Controller
pub struct AdmissionController {
    store: Arc<dyn QueueStore>,
    launcher: Arc<dyn TaskLauncher>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl AdmissionController {
    pub fn new(
        store: Arc<dyn QueueStore>,
        launcher: Arc<dyn TaskLauncher>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            launcher,
            id_provider,
            time_provider,
        }
    }

    /// Create a queue, returning its id
    pub async fn create(&self, req: CreateQueueRequest) -> Result<QueueId> {
        create::execute(
            self.store.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    pub async fn load(&self, queue_id: &QueueId) -> Result<Queue> {
        self.store.load(queue_id).await
    }

    pub async fn find(&self, filter: &QueueFilter) -> Result<Vec<Queue>> {
        self.store.find(filter).await
    }

    /// Enqueue a task (PENDING)
    pub async fn add(
        &self,
        queue_id: &QueueId,
        task_id: impl Into<TaskId>,
        start_params: StartParams,
    ) -> Result<Queue> {
        add::execute(self.store.as_ref(), queue_id, task_id.into(), start_params).await
    }

    /// Single admission attempt; `None` is backpressure, not an error
    pub async fn pop(&self, queue_id: &QueueId) -> Result<Option<PendingEntry>> {
        pop::pop_one(self.store.as_ref(), queue_id).await
    }

    /// Admit and launch up to `limit` tasks
    pub async fn drain(
        &self,
        queue_id: &QueueId,
        limit: usize,
        caller: &Owner,
    ) -> Result<DrainOutcome> {
        pop::drain(
            self.store.as_ref(),
            self.launcher.as_ref(),
            queue_id,
            limit,
            caller,
        )
        .await
    }

    /// Release a RUNNING task's slot; a no-op for any other task
    pub async fn complete(&self, queue_id: &QueueId, task_id: &str) -> Result<Queue> {
        complete::execute(self.store.as_ref(), queue_id, task_id).await
    }
}

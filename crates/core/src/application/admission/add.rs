// Add Use Case

use crate::domain::{DomainError, PendingEntry, Queue, QueueId, StartParams, TaskId};
use crate::error::Result;
use crate::port::QueueStore;
use tracing::{debug, info};

/// Execute add use case
///
/// Inserts `task_id` on the discipline's side of the pending list and marks it
/// PENDING, in one atomic step guarded by "not already tracked" and, when
/// `max_pending` is set, "pending list not full".
///
/// # Errors
/// - DomainError::AlreadyQueued if the task is PENDING or RUNNING
/// - DomainError::QueueFull if the pending list is at `max_pending`
/// - DomainError::QueueNotFound if the queue does not exist
pub async fn execute(
    store: &dyn QueueStore,
    queue_id: &QueueId,
    task_id: TaskId,
    start_params: StartParams,
) -> Result<Queue> {
    let entry = PendingEntry::new(task_id.clone(), start_params);

    let outcome = store
        .atomic_update(
            queue_id,
            &|q| !q.is_tracked(&task_id) && !q.is_pending_full(),
            &|q| q.enqueue(entry.clone()),
        )
        .await?;

    if !outcome.matched {
        let current = outcome.pre;
        if current.is_tracked(&task_id) {
            debug!(queue_id = %queue_id, task_id = %task_id, "Rejected duplicate add");
            return Err(DomainError::AlreadyQueued {
                queue_id: queue_id.clone(),
                task_id,
            }
            .into());
        }
        return Err(DomainError::QueueFull {
            queue_id: queue_id.clone(),
            max_pending: current.max_pending,
        }
        .into());
    }

    info!(
        queue_id = %queue_id,
        task_id = %task_id,
        pending = outcome.post.pending.len(),
        "Task queued"
    );

    Ok(outcome.post)
}

// Complete Use Case

use crate::domain::{Queue, QueueId, TaskStatus};
use crate::error::Result;
use crate::port::QueueStore;
use tracing::{debug, info};

/// Execute complete use case
///
/// Releases the slot of a RUNNING task and stops tracking it. Completing a
/// task that is not RUNNING (pending, already completed, never added) leaves
/// the record untouched and is not an error.
///
/// # Errors
/// - DomainError::QueueNotFound if the queue does not exist
pub async fn execute(store: &dyn QueueStore, queue_id: &QueueId, task_id: &str) -> Result<Queue> {
    let outcome = store
        .atomic_update(
            queue_id,
            &|q| q.status_of(task_id) == Some(TaskStatus::Running),
            &|q| {
                q.release(task_id);
            },
        )
        .await?;

    if outcome.matched {
        info!(
            queue_id = %queue_id,
            task_id = %task_id,
            running = outcome.post.running_count,
            "Task completed"
        );
    } else {
        debug!(
            queue_id = %queue_id,
            task_id = %task_id,
            status = ?outcome.pre.status_of(task_id),
            "Complete ignored (task not running)"
        );
    }

    Ok(outcome.post)
}

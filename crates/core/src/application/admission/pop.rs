// Pop & Drain Use Cases

use crate::domain::{Owner, PendingEntry, Queue, QueueId};
use crate::error::{AppError, Result};
use crate::port::{QueueStore, TaskLauncher};
use serde::Serialize;
use tracing::{debug, error, info};

/// Result of a drain: the record as of the last atomic step, and the
/// admitted entries in admission order
#[derive(Debug, Clone, Serialize)]
pub struct DrainOutcome {
    pub queue: Queue,
    pub admitted: Vec<PendingEntry>,
}

/// One admission step.
///
/// Slot increment, head removal and the RUNNING status write happen in the
/// same atomic update, so a crash can never leave a counted slot without a
/// RUNNING task behind it.
async fn admit(store: &dyn QueueStore, queue_id: &QueueId) -> Result<(Option<PendingEntry>, Queue)> {
    let outcome = store
        .atomic_update(queue_id, &|q| q.can_admit(), &|q| {
            q.admit_head();
        })
        .await?;

    if !outcome.matched {
        debug!(
            queue_id = %queue_id,
            running = outcome.pre.running_count,
            pending = outcome.pre.pending.len(),
            "No admission (no free slot or nothing pending)"
        );
        return Ok((None, outcome.post));
    }

    // The predicate guaranteed a non-empty pending list on `pre`
    let entry = outcome.pre.head().cloned().ok_or_else(|| {
        AppError::Internal(format!(
            "Queue {} admitted from an empty pending list",
            queue_id
        ))
    })?;

    info!(
        queue_id = %queue_id,
        task_id = %entry.task_id,
        running = outcome.post.running_count,
        "Task admitted"
    );

    Ok((Some(entry), outcome.post))
}

/// Single admission attempt. `None` means "no free slot or nothing pending".
pub async fn pop_one(store: &dyn QueueStore, queue_id: &QueueId) -> Result<Option<PendingEntry>> {
    let (entry, _) = admit(store, queue_id).await?;
    Ok(entry)
}

/// Admit up to `limit` tasks, launching each before the next admission.
///
/// Stops at the first backpressure signal.
///
/// # Errors
/// - AppError::LaunchFailed if the launcher refuses a task. Entries admitted
///   earlier in this drain stay launched and RUNNING and are reported in the
///   error; the failed task keeps its slot until it is completed.
pub async fn drain(
    store: &dyn QueueStore,
    launcher: &dyn TaskLauncher,
    queue_id: &QueueId,
    limit: usize,
    caller: &Owner,
) -> Result<DrainOutcome> {
    let mut admitted = Vec::new();
    let mut latest = None;

    while admitted.len() < limit {
        let (entry, post) = admit(store, queue_id).await?;
        latest = Some(post);

        let Some(entry) = entry else {
            break;
        };

        if let Err(e) = launcher
            .start(&entry.task_id, &entry.start_params, caller)
            .await
        {
            error!(
                queue_id = %queue_id,
                task_id = %entry.task_id,
                error = %e,
                "Launch failed; slot stays consumed until completed"
            );
            return Err(AppError::LaunchFailed {
                queue_id: queue_id.clone(),
                task_id: entry.task_id,
                launched: admitted,
                source: e,
            });
        }

        admitted.push(entry);
    }

    let queue = match latest {
        Some(queue) => queue,
        None => store.load(queue_id).await?,
    };

    Ok(DrainOutcome { queue, admitted })
}

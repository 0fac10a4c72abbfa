// Create Use Case

use crate::domain::{Discipline, DomainError, Owner, Queue, QueueId};
use crate::error::Result;
use crate::port::{IdProvider, QueueStore, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Maximum queue name length
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Create request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub name: String,
    pub owner: Owner,
    pub discipline: Discipline,

    /// 0 = unbounded
    #[serde(default)]
    pub max_concurrent: u32,

    /// 0 = unbounded
    #[serde(default)]
    pub max_pending: u32,
}

/// Validate a create request before touching the store
pub fn validate_request(req: &CreateQueueRequest) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(DomainError::ValidationError("Queue name must not be empty".to_string()).into());
    }

    if req.name.len() > MAX_QUEUE_NAME_LEN {
        return Err(DomainError::ValidationError(format!(
            "Queue name too long ({} > {} characters)",
            req.name.len(),
            MAX_QUEUE_NAME_LEN
        ))
        .into());
    }

    if !req
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(DomainError::ValidationError(format!(
            "Queue name '{}' must be alphanumeric ('_', '-' and '.' allowed)",
            req.name
        ))
        .into());
    }

    if req.owner.is_empty() {
        return Err(DomainError::ValidationError("Queue owner must not be empty".to_string()).into());
    }

    Ok(())
}

/// Execute create use case
///
/// # Errors
/// - DomainError::ValidationError for malformed names or owners
/// - DomainError::DuplicateName if the owner already uses `req.name`
pub async fn execute(
    store: &dyn QueueStore,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: CreateQueueRequest,
) -> Result<QueueId> {
    validate_request(&req)?;

    let mut queue = Queue::new(
        id_provider.generate_id(),
        req.name,
        req.owner,
        req.discipline,
        req.max_concurrent,
        time_provider.now_millis(),
    );
    queue.max_pending = req.max_pending;

    store.create(&queue).await?;

    info!(
        queue_id = %queue.id,
        name = %queue.name,
        discipline = %queue.discipline,
        max_concurrent = queue.max_concurrent,
        "Queue created"
    );

    Ok(queue.id)
}

// Queue Store Port (Interface)
//
// One record per queue; every state change goes through `atomic_update`,
// which checks a predicate and applies a mutation as one indivisible step
// relative to other atomic updates of the same record.

use crate::domain::{Owner, Queue, QueueId};
use crate::error::Result;
use async_trait::async_trait;

/// Condition evaluated against the currently stored record
pub type Predicate<'a> = &'a (dyn Fn(&Queue) -> bool + Send + Sync);

/// In-place change applied only when the predicate holds.
/// May be invoked more than once per call by optimistic stores (on a fresh
/// copy each time), so it must be a pure function of the record.
pub type Mutation<'a> = &'a (dyn Fn(&mut Queue) + Send + Sync);

/// Result of an atomic conditional update
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub matched: bool,
    /// Record the predicate was evaluated against
    pub pre: Queue,
    /// Record after the mutation (equal to `pre` when not matched)
    pub post: Queue,
}

impl UpdateOutcome {
    pub fn matched(pre: Queue, post: Queue) -> Self {
        Self {
            matched: true,
            pre,
            post,
        }
    }

    pub fn unmatched(current: Queue) -> Self {
        Self {
            matched: false,
            post: current.clone(),
            pre: current,
        }
    }
}

/// Listing filter (all fields optional)
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub name: Option<String>,
    pub owner: Option<Owner>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl QueueFilter {
    pub fn by_owner_and_name(owner: impl Into<Owner>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            owner: Some(owner.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, queue: &Queue) -> bool {
        self.name.as_ref().map_or(true, |n| *n == queue.name)
            && self.owner.as_ref().map_or(true, |o| *o == queue.owner)
    }
}

/// Repository interface for queue records
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    /// - DomainError::DuplicateName if the owner already has a queue with this name
    async fn create(&self, queue: &Queue) -> Result<()>;

    /// Load a record by id.
    ///
    /// # Errors
    /// - DomainError::QueueNotFound if absent
    async fn load(&self, id: &QueueId) -> Result<Queue>;

    /// List records matching the filter, oldest first
    async fn find(&self, filter: &QueueFilter) -> Result<Vec<Queue>>;

    /// Atomic conditional update (check-then-mutate).
    ///
    /// # Errors
    /// - DomainError::QueueNotFound if absent
    /// - AppError::Conflict if an optimistic store keeps losing races
    async fn atomic_update(
        &self,
        id: &QueueId,
        predicate: Predicate<'_>,
        mutation: Mutation<'_>,
    ) -> Result<UpdateOutcome>;
}

// ============================================================================
// Single-process implementation
// ============================================================================

pub mod memory {
    use super::*;
    use crate::domain::DomainError;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    /// Mutex-guarded map of records. The predicate and the mutation run under
    /// the lock, so callers never observe an intermediate state.
    #[derive(Default)]
    pub struct InMemoryQueueStore {
        queues: Mutex<HashMap<QueueId, Queue>>,
    }

    impl InMemoryQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> Result<MutexGuard<'_, HashMap<QueueId, Queue>>> {
            self.queues
                .lock()
                .map_err(|_| AppError::Internal("queue store lock poisoned".to_string()))
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn create(&self, queue: &Queue) -> Result<()> {
            let mut queues = self.lock()?;

            let taken = queues
                .values()
                .any(|q| q.owner == queue.owner && q.name == queue.name);
            if taken {
                return Err(DomainError::DuplicateName {
                    owner: queue.owner.clone(),
                    name: queue.name.clone(),
                }
                .into());
            }
            if queues.contains_key(&queue.id) {
                return Err(AppError::Conflict(format!(
                    "Queue id {} already exists",
                    queue.id
                )));
            }

            queues.insert(queue.id.clone(), queue.clone());
            Ok(())
        }

        async fn load(&self, id: &QueueId) -> Result<Queue> {
            self.lock()?
                .get(id)
                .cloned()
                .ok_or_else(|| DomainError::QueueNotFound(id.clone()).into())
        }

        async fn find(&self, filter: &QueueFilter) -> Result<Vec<Queue>> {
            let queues = self.lock()?;

            let mut found: Vec<Queue> = queues
                .values()
                .filter(|q| filter.matches(q))
                .cloned()
                .collect();
            found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

            Ok(found
                .into_iter()
                .skip(filter.offset)
                .take(filter.limit.unwrap_or(usize::MAX))
                .collect())
        }

        async fn atomic_update(
            &self,
            id: &QueueId,
            predicate: Predicate<'_>,
            mutation: Mutation<'_>,
        ) -> Result<UpdateOutcome> {
            let mut queues = self.lock()?;
            let record = queues
                .get_mut(id)
                .ok_or_else(|| DomainError::QueueNotFound(id.clone()))?;

            if !predicate(record) {
                return Ok(UpdateOutcome::unmatched(record.clone()));
            }

            let pre = record.clone();
            mutation(record);
            Ok(UpdateOutcome::matched(pre, record.clone()))
        }
    }

}

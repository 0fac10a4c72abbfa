// Domain Layer - Pure business logic and entities

pub mod error;
pub mod queue;

// Re-exports
pub use error::DomainError;
pub use queue::{
    Discipline, Owner, PendingEntry, Queue, QueueId, StartParams, TaskId, TaskStatus,
};

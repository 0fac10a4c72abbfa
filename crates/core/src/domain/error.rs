// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Queue name \"{name}\" has already been taken by owner {owner}")]
    DuplicateName { owner: String, name: String },

    #[error("Task {task_id} is already queued in {queue_id}")]
    AlreadyQueued { queue_id: String, task_id: String },

    #[error("Queue {queue_id} is full ({max_pending} pending)")]
    QueueFull { queue_id: String, max_pending: u32 },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

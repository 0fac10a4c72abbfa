// Central Error Type for the Application

use crate::domain::{PendingEntry, QueueId, TaskId};
use crate::port::LaunchError;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The launcher refused an admitted task. The slot stays consumed until
    /// the caller completes `task_id`. `launched` holds the entries the same
    /// drain started before the failure.
    #[error("Launch of task {task_id} from queue {queue_id} failed: {source}")]
    LaunchFailed {
        queue_id: QueueId,
        task_id: TaskId,
        launched: Vec<PendingEntry>,
        #[source]
        source: LaunchError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True when the error means the queue id is unknown
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::Domain(crate::domain::DomainError::QueueNotFound(_))
        )
    }
}

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)

// Task Launcher Port
// Starts the workflow behind an admitted task (subprocess, remote engine, ...)

use crate::domain::{Owner, StartParams, TaskId};
use async_trait::async_trait;
use thiserror::Error;

/// Lifetime of the scoped credential handed to launched workflows (7 days)
pub const DEFAULT_CREDENTIAL_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Launch errors
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Invalid start params: {0}")]
    InvalidParams(String),

    #[error("Launch rejected: {0}")]
    Rejected(String),
}

/// Reported by launchers that observe the workflow terminating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskExit {
    pub task_id: TaskId,
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// Task Launcher trait
///
/// Implementations:
/// - SubprocessLauncher: spawns an external process per task
///
/// Launching is fire-and-forget: `start` returns once the workflow has been
/// handed off, not when it finishes.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    /// Start the workflow for `task_id` on behalf of `caller`
    ///
    /// # Errors
    /// - LaunchError::InvalidParams if start params are malformed
    /// - LaunchError::SpawnFailed if the workflow cannot be started
    async fn start(
        &self,
        task_id: &TaskId,
        start_params: &StartParams,
        caller: &Owner,
    ) -> Result<(), LaunchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock launcher behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Fail only for the given task
        FailFor(TaskId),
    }

    /// Records every launch in call order
    pub struct RecordingLauncher {
        behavior: Arc<Mutex<MockBehavior>>,
        launched: Arc<Mutex<Vec<(TaskId, StartParams, Owner)>>>,
    }

    impl RecordingLauncher {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                launched: Arc::new(Mutex::new(Vec::new())),
            }
        }
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }
        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }
        pub fn new_fail_for(task_id: impl Into<TaskId>) -> Self {
            Self::new(MockBehavior::FailFor(task_id.into()))
        }
        /// Task ids passed to `start`, including failed attempts
        pub fn launched_ids(&self) -> Vec<TaskId> {
            self.launched
                .lock()
                .unwrap()
                .iter()
                .map(|(id, _, _)| id.clone())
                .collect()
        }
        pub fn launched(&self) -> Vec<(TaskId, StartParams, Owner)> {
            self.launched.lock().unwrap().clone()
        }
        pub fn call_count(&self) -> usize {
            self.launched.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TaskLauncher for RecordingLauncher {
        async fn start(
            &self,
            task_id: &TaskId,
            start_params: &StartParams,
            caller: &Owner,
        ) -> Result<(), LaunchError> {
            self.launched.lock().unwrap().push((
                task_id.clone(),
                start_params.clone(),
                caller.clone(),
            ));

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(LaunchError::SpawnFailed(msg)),
                MockBehavior::FailFor(id) if id == *task_id => {
                    Err(LaunchError::Rejected(format!("task {} refused", id)))
                }
                MockBehavior::FailFor(_) => Ok(()),
            }
        }
    }
}

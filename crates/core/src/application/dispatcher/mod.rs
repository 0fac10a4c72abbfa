// Dispatcher - Drain loop for one queue

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::AdmissionController;
use crate::domain::{Owner, QueueId, TaskId};
use crate::error::{AppError, Result};
use crate::port::TaskExit;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Drives admission for a single queue: drains on every tick and completes
/// tasks as the launcher reports them finished.
pub struct Dispatcher {
    queue_id: QueueId,
    caller: Owner,
    drain_limit: usize,
    poll_interval: Duration,
    controller: Arc<AdmissionController>,
}

impl Dispatcher {
    pub fn new(
        queue_id: impl Into<QueueId>,
        caller: impl Into<Owner>,
        controller: Arc<AdmissionController>,
    ) -> Self {
        Self {
            queue_id: queue_id.into(),
            caller: caller.into(),
            drain_limit: DEFAULT_DRAIN_LIMIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            controller,
        }
    }

    pub fn with_drain_limit(mut self, drain_limit: usize) -> Self {
        self.drain_limit = drain_limit;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run dispatch loop with graceful shutdown support
    ///
    /// Exits are kept until their completion commits; a store error leaves
    /// them queued for the next pass instead of dropping the slot.
    pub async fn run(
        &self,
        mut shutdown: ShutdownToken,
        mut exits: mpsc::UnboundedReceiver<TaskExit>,
    ) -> Result<()> {
        info!(queue_id = %self.queue_id, "Dispatcher started");
        let mut unreleased: VecDeque<TaskExit> = VecDeque::new();
        loop {
            if shutdown.is_shutdown() {
                info!(queue_id = %self.queue_id, "Dispatcher shutting down");
                break;
            }

            let result = tokio::select! {
                _ = shutdown.wait() => {
                    info!(queue_id = %self.queue_id, "Dispatcher interrupted");
                    break;
                }
                Some(exit) = exits.recv() => {
                    self.log_exit(&exit);
                    unreleased.push_back(exit);
                    self.settle(&mut unreleased).await
                }
                _ = sleep(self.poll_interval) => self.settle(&mut unreleased).await,
            };

            if let Err(e) = result {
                error!(
                    queue_id = %self.queue_id,
                    error = %e,
                    unreleased = unreleased.len(),
                    "Dispatcher error"
                );
                tokio::select! {
                    _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                    _ = shutdown.wait() => {
                        info!("Dispatcher interrupted during error recovery");
                        break;
                    }
                }
            }
        }

        if !unreleased.is_empty() {
            let task_ids: Vec<&TaskId> = unreleased.iter().map(|exit| &exit.task_id).collect();
            warn!(
                queue_id = %self.queue_id,
                task_ids = ?task_ids,
                "Stopping with finished tasks still holding slots"
            );
        }
        info!(queue_id = %self.queue_id, "Dispatcher stopped");
        Ok(())
    }

    /// Complete every queued exit in arrival order, then drain.
    ///
    /// Nothing is drained while a completion is outstanding.
    async fn settle(&self, unreleased: &mut VecDeque<TaskExit>) -> Result<()> {
        while let Some(exit) = unreleased.front() {
            self.controller
                .complete(&self.queue_id, &exit.task_id)
                .await?;
            unreleased.pop_front();
        }
        self.dispatch_once().await?;
        Ok(())
    }

    /// Drain once; returns the number of launched tasks.
    ///
    /// A task the launcher refuses is completed right away so its slot is not
    /// held by a workflow that never started.
    pub async fn dispatch_once(&self) -> Result<usize> {
        match self
            .controller
            .drain(&self.queue_id, self.drain_limit, &self.caller)
            .await
        {
            Ok(outcome) => {
                let launched = outcome.admitted.len();
                if launched > 0 {
                    info!(
                        queue_id = %self.queue_id,
                        launched,
                        running = outcome.queue.running_count,
                        pending = outcome.queue.pending.len(),
                        "Drained queue"
                    );
                }
                Ok(launched)
            }
            Err(AppError::LaunchFailed {
                task_id,
                launched,
                source,
                ..
            }) => {
                warn!(
                    queue_id = %self.queue_id,
                    task_id = %task_id,
                    launched = launched.len(),
                    error = %source,
                    "Releasing slot of task that failed to launch"
                );
                self.controller.complete(&self.queue_id, &task_id).await?;
                Ok(launched.len())
            }
            Err(e) => Err(e),
        }
    }

    /// Complete a finished task, then refill the freed slot
    pub async fn handle_exit(&self, exit: TaskExit) -> Result<()> {
        self.log_exit(&exit);
        self.controller
            .complete(&self.queue_id, &exit.task_id)
            .await?;
        self.dispatch_once().await?;
        Ok(())
    }

    fn log_exit(&self, exit: &TaskExit) {
        if exit.success {
            info!(queue_id = %self.queue_id, task_id = %exit.task_id, "Task finished");
        } else {
            warn!(
                queue_id = %self.queue_id,
                task_id = %exit.task_id,
                exit_code = ?exit.exit_code,
                "Task finished unsuccessfully"
            );
        }
    }
}

// Subprocess launcher implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use taskq_core::domain::{Owner, StartParams, TaskId};
use taskq_core::port::task_launcher::{
    LaunchError, TaskExit, TaskLauncher, DEFAULT_CREDENTIAL_TTL_MS,
};
use taskq_core::port::{IdProvider, TimeProvider};

// Environment handed to every launched workflow
pub const ENV_TASK_ID: &str = "TASKQ_TASK_ID";
pub const ENV_OWNER: &str = "TASKQ_OWNER";
pub const ENV_TOKEN: &str = "TASKQ_TOKEN";
pub const ENV_TOKEN_EXPIRES_AT: &str = "TASKQ_TOKEN_EXPIRES_AT";
pub const ENV_API_URL: &str = "TASKQ_API_URL";
pub const ENV_START_PARAMS: &str = "TASKQ_START_PARAMS";

/// Scoped credential a workflow uses to call back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCredential {
    pub token: String,
    pub expires_at: i64, // epoch ms
}

/// Launch parameters read from a task's start params
#[derive(Debug, Deserialize)]
struct LaunchSpec {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default = "default_working_dir")]
    working_dir: String,
}

fn default_working_dir() -> String {
    ".".to_string()
}

/// Subprocess launcher
/// Spawns one child process per admitted task, with environment allowlisting.
/// Children are not awaited by `start`; a background task reaps each one and
/// reports its exit when a notifier is configured.
pub struct SubprocessLauncher {
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
    api_url: String,
    credential_ttl_ms: i64,
    exit_tx: Option<mpsc::UnboundedSender<TaskExit>>,
}

impl SubprocessLauncher {
    /// Create a new subprocess launcher
    ///
    /// # Arguments
    /// * `id_provider` - Token generator for launch credentials
    /// * `time_provider` - Clock for credential expiry
    /// * `env_allowlist` - Variables passed through from the launcher's own
    ///   environment and from start params (everything else is dropped)
    /// * `api_url` - Callback URL handed to workflows
    ///
    /// # Example
    /// ```ignore
    /// let launcher = SubprocessLauncher::new(
    ///     Arc::new(UuidProvider),
    ///     Arc::new(SystemTimeProvider),
    ///     vec!["PATH".to_string(), "HOME".to_string()],
    ///     "http://127.0.0.1:8080/api/v1",
    /// );
    /// ```
    pub fn new(
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        env_allowlist: Vec<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            id_provider,
            time_provider,
            env_allowlist,
            api_url: api_url.into(),
            credential_ttl_ms: DEFAULT_CREDENTIAL_TTL_MS,
            exit_tx: None,
        }
    }

    /// Report every child's exit on `exit_tx`
    pub fn with_exit_notifier(mut self, exit_tx: mpsc::UnboundedSender<TaskExit>) -> Self {
        self.exit_tx = Some(exit_tx);
        self
    }

    pub fn with_credential_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.credential_ttl_ms = ttl_ms;
        self
    }

    /// Filter environment variables to allowlist only
    fn filter_env(&self, env: &HashMap<String, String>) -> HashMap<String, String> {
        env.iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Allowlisted variables from the launcher's own environment
    fn inherited_env(&self) -> HashMap<String, String> {
        self.filter_env(&std::env::vars().collect())
    }

    /// Null start params count as an empty object
    fn parse_params(start_params: &StartParams) -> Result<LaunchSpec, LaunchError> {
        let value = match start_params.as_value() {
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };

        let spec: LaunchSpec = serde_json::from_value(value)
            .map_err(|e| LaunchError::InvalidParams(e.to_string()))?;

        if spec.command.trim().is_empty() {
            return Err(LaunchError::InvalidParams(
                "'command' must not be empty".to_string(),
            ));
        }

        Ok(spec)
    }

    fn issue_credential(&self) -> LaunchCredential {
        LaunchCredential {
            token: self.id_provider.generate_id(),
            expires_at: self.time_provider.now_millis() + self.credential_ttl_ms,
        }
    }

    fn build_command(
        &self,
        spec: &LaunchSpec,
        task_id: &TaskId,
        start_params: &StartParams,
        caller: &Owner,
        credential: &LaunchCredential,
    ) -> Command {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .env_clear()
            .envs(self.inherited_env())
            .envs(self.filter_env(&spec.env))
            .env(ENV_TASK_ID, task_id)
            .env(ENV_OWNER, caller)
            .env(ENV_TOKEN, &credential.token)
            .env(ENV_TOKEN_EXPIRES_AT, credential.expires_at.to_string())
            .env(ENV_API_URL, &self.api_url)
            .env(ENV_START_PARAMS, start_params.as_value().to_string())
            .stdin(Stdio::null());
        command
    }
}

#[async_trait]
impl TaskLauncher for SubprocessLauncher {
    async fn start(
        &self,
        task_id: &TaskId,
        start_params: &StartParams,
        caller: &Owner,
    ) -> Result<(), LaunchError> {
        let spec = Self::parse_params(start_params)?;
        let credential = self.issue_credential();

        let mut child = self
            .build_command(&spec, task_id, start_params, caller, &credential)
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed(format!("{}: {}", spec.command, e)))?;

        info!(
            task_id = %task_id,
            pid = ?child.id(),
            command = %spec.command,
            args = ?spec.args,
            working_dir = %spec.working_dir,
            "Workflow launched"
        );

        let task_id = task_id.clone();
        let exit_tx = self.exit_tx.clone();
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => TaskExit {
                    task_id,
                    success: status.success(),
                    exit_code: status.code(),
                },
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Failed to wait for workflow process");
                    TaskExit {
                        task_id,
                        success: false,
                        exit_code: None,
                    }
                }
            };

            debug!(task_id = %exit.task_id, exit_code = ?exit.exit_code, "Workflow process exited");
            if let Some(tx) = exit_tx {
                if tx.send(exit).is_err() {
                    debug!("Exit receiver dropped; exit not reported");
                }
            }
        });

        Ok(())
    }
}

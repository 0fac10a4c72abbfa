//! Daemon configuration, read from `TASKQ_*` environment variables

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;
use taskq_core::application::dispatcher::constants::{DEFAULT_DRAIN_LIMIT, DEFAULT_POLL_INTERVAL};
use taskq_core::domain::{Discipline, Queue};

const DEFAULT_DB_PATH: &str = "~/.taskq/queues.db";
const DEFAULT_QUEUE: &str = "default";
const DEFAULT_OWNER: &str = "taskq-daemon";
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api/v1";
const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER"];

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: String,
    pub queue_name: String,
    pub owner: String,
    pub discipline: Discipline,
    pub max_concurrent: u32,
    pub max_pending: u32,
    pub drain_limit: usize,
    pub poll_interval: Duration,
    pub api_url: String,
    pub env_allowlist: Vec<String>,
    pub log_format: String,
    pub log_dir: Option<String>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("TASKQ_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = shellexpand::tilde(&db_path).into_owned();

        let discipline = match lookup("TASKQ_DISCIPLINE") {
            Some(raw) => Discipline::from_str(&raw).context("TASKQ_DISCIPLINE")?,
            None => Discipline::Fifo,
        };

        let env_allowlist = match lookup("TASKQ_ENV_ALLOWLIST") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            db_path,
            queue_name: lookup("TASKQ_QUEUE").unwrap_or_else(|| DEFAULT_QUEUE.to_string()),
            owner: lookup("TASKQ_OWNER").unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            discipline,
            max_concurrent: parse_or(&lookup, "TASKQ_MAX_CONCURRENT", 0)?,
            max_pending: parse_or(&lookup, "TASKQ_MAX_PENDING", 0)?,
            drain_limit: parse_or(&lookup, "TASKQ_DRAIN_LIMIT", DEFAULT_DRAIN_LIMIT)?,
            poll_interval: match lookup("TASKQ_POLL_INTERVAL_MS") {
                Some(raw) => Duration::from_millis(
                    raw.parse().context("TASKQ_POLL_INTERVAL_MS must be an integer")?,
                ),
                None => DEFAULT_POLL_INTERVAL,
            },
            api_url: lookup("TASKQ_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            env_allowlist,
            log_format: lookup("TASKQ_LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
            log_dir: lookup("TASKQ_LOG_DIR"),
        })
    }

    /// Settings of an existing queue that differ from this configuration
    pub fn mismatches(&self, queue: &Queue) -> Vec<String> {
        let mut diffs = Vec::new();
        if queue.discipline != self.discipline {
            diffs.push(format!(
                "discipline: queue={} configured={}",
                queue.discipline, self.discipline
            ));
        }
        if queue.max_concurrent != self.max_concurrent {
            diffs.push(format!(
                "max_concurrent: queue={} configured={}",
                queue.max_concurrent, self.max_concurrent
            ));
        }
        if queue.max_pending != self.max_pending {
            diffs.push(format!(
                "max_pending: queue={} configured={}",
                queue.max_pending, self.max_pending
            ));
        }
        diffs
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw)),
        None => Ok(default),
    }
}

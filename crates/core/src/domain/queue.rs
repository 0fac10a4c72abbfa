// Queue Domain Model
//
// A queue record is the unit of atomicity: every admission step reads and
// rewrites one record as a whole, so all mutators here are pure and are only
// ever applied inside a store's atomic update.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;

use super::DomainError;

/// Queue identifier (UUID v4)
pub type QueueId = String;

/// Task identifier, supplied by the producer
pub type TaskId = String;

/// Opaque owner token (only compared for equality)
pub type Owner = String;

/// Insertion-side policy for pending entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    Fifo,
    Lifo,
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discipline::Fifo => write!(f, "fifo"),
            Discipline::Lifo => write!(f, "lifo"),
        }
    }
}

impl FromStr for Discipline {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Discipline::Fifo),
            "lifo" => Ok(Discipline::Lifo),
            other => Err(DomainError::ValidationError(format!(
                "Unknown queue discipline '{}' (expected fifo or lifo)",
                other
            ))),
        }
    }
}

/// Lifecycle status of a tracked task. Absence from the map means the task
/// is untracked (never added, or completed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
        }
    }
}

/// Launcher payload (JSON serializable, opaque to the queue)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartParams(serde_json::Value);

impl StartParams {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl Default for StartParams {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub task_id: TaskId,
    pub start_params: StartParams,
}

impl PendingEntry {
    pub fn new(task_id: impl Into<TaskId>, start_params: StartParams) -> Self {
        Self {
            task_id: task_id.into(),
            start_params,
        }
    }
}

/// Queue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub id: QueueId,
    pub name: String,
    pub owner: Owner,
    pub discipline: Discipline,

    /// 0 = unbounded
    pub max_concurrent: u32,
    /// 0 = unbounded
    pub max_pending: u32,
    pub running_count: u32,

    /// Head is always the next entry to be admitted
    pub pending: VecDeque<PendingEntry>,
    pub task_status: BTreeMap<TaskId, TaskStatus>,

    pub created_at: i64, // epoch ms
}

impl Queue {
    pub fn new(
        id: impl Into<QueueId>,
        name: impl Into<String>,
        owner: impl Into<Owner>,
        discipline: Discipline,
        max_concurrent: u32,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: owner.into(),
            discipline,
            max_concurrent,
            max_pending: 0,
            running_count: 0,
            pending: VecDeque::new(),
            task_status: BTreeMap::new(),
            created_at,
        }
    }

    /// Cap used for admission checks; 0 maps to unbounded
    pub fn effective_cap(&self) -> u32 {
        if self.max_concurrent == 0 {
            u32::MAX
        } else {
            self.max_concurrent
        }
    }

    /// Pop predicate: a free slot and something to admit
    pub fn can_admit(&self) -> bool {
        self.running_count < self.effective_cap() && !self.pending.is_empty()
    }

    pub fn is_tracked(&self, task_id: &str) -> bool {
        self.task_status.contains_key(task_id)
    }

    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.task_status.get(task_id).copied()
    }

    pub fn is_pending_full(&self) -> bool {
        self.max_pending > 0 && self.pending.len() >= self.max_pending as usize
    }

    /// Next entry to be admitted
    pub fn head(&self) -> Option<&PendingEntry> {
        self.pending.front()
    }

    /// Insert an entry on the discipline's side and mark it PENDING.
    /// Callers check `is_tracked` first.
    pub fn enqueue(&mut self, entry: PendingEntry) {
        self.task_status
            .insert(entry.task_id.clone(), TaskStatus::Pending);
        match self.discipline {
            Discipline::Fifo => self.pending.push_back(entry),
            Discipline::Lifo => self.pending.push_front(entry),
        }
    }

    /// Take the head entry, consume a slot and mark it RUNNING.
    /// Removal is head-wise for both disciplines.
    pub fn admit_head(&mut self) -> Option<PendingEntry> {
        let entry = self.pending.pop_front()?;
        self.running_count += 1;
        self.task_status
            .insert(entry.task_id.clone(), TaskStatus::Running);
        Some(entry)
    }

    /// Release a RUNNING task's slot and stop tracking it.
    /// Returns false (and changes nothing) for any other status.
    pub fn release(&mut self, task_id: &str) -> bool {
        if self.status_of(task_id) != Some(TaskStatus::Running) {
            return false;
        }
        self.task_status.remove(task_id);
        self.running_count = self.running_count.saturating_sub(1);
        true
    }

    pub fn running_tasks(&self) -> impl Iterator<Item = &TaskId> {
        self.task_status
            .iter()
            .filter(|(_, status)| **status == TaskStatus::Running)
            .map(|(id, _)| id)
    }

    pub fn pending_tasks(&self) -> impl Iterator<Item = &TaskId> {
        self.pending.iter().map(|entry| &entry.task_id)
    }

    /// Create a test queue with generated id
    #[cfg(test)]
    pub fn new_test(discipline: Discipline, max_concurrent: u32) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            "test_queue",
            "test_owner",
            discipline,
            max_concurrent,
            chrono::Utc::now().timestamp_millis(),
        )
    }
}

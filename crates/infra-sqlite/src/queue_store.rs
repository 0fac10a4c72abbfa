// SQLite QueueStore Implementation
//
// Atomic conditional updates are optimistic: read the record, evaluate the
// predicate, apply the mutation in memory, then write back only if the row's
// version is still the one that was read. A lost race re-reads and retries,
// so every committed mutation was computed from the record it replaced.

use async_trait::async_trait;
use rand::Rng;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use taskq_core::domain::{
    Discipline, DomainError, PendingEntry, Queue, QueueId, TaskId, TaskStatus,
};
use taskq_core::error::{AppError, Result};
use taskq_core::port::{Mutation, Predicate, QueueFilter, QueueStore, UpdateOutcome};
use tracing::{debug, warn};

/// Compare-and-swap attempts before giving up with `AppError::Conflict`
const MAX_CAS_ATTEMPTS: u32 = 64;

/// Upper bound of the random pause between attempts
const CAS_RETRY_MAX_JITTER_MS: u64 = 5;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "275" => AppError::Database(format!(
                        "Check constraint violation: {}",
                        db_err.message()
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

/// SQLITE_CONSTRAINT_UNIQUE (as opposed to a primary key collision)
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|c| c == "2067"),
        _ => false,
    }
}

fn to_column(value: u32) -> i64 {
    i64::from(value)
}

fn from_column(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Database(format!("Column {} out of range: {}", column, value)))
}

pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_row(&self, id: &QueueId) -> Result<QueueRow> {
        sqlx::query_as::<_, QueueRow>("SELECT * FROM queues WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| DomainError::QueueNotFound(id.clone()).into())
    }

    /// Write the mutable part of `queue` if the row is still at `version`.
    /// Returns false when another writer got there first.
    async fn compare_and_swap(&self, queue: &Queue, version: i64) -> Result<bool> {
        let pending = serde_json::to_string(&queue.pending)?;
        let task_status = serde_json::to_string(&queue.task_status)?;

        let result = sqlx::query(
            r#"
            UPDATE queues
            SET running_count = ?, pending = ?, task_status = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(to_column(queue.running_count))
        .bind(&pending)
        .bind(&task_status)
        .bind(&queue.id)
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn create(&self, queue: &Queue) -> Result<()> {
        let pending = serde_json::to_string(&queue.pending)?;
        let task_status = serde_json::to_string(&queue.task_status)?;

        sqlx::query(
            r#"
            INSERT INTO queues (
                id, name, owner, discipline,
                max_concurrent, max_pending, running_count,
                pending, task_status, created_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&queue.id)
        .bind(&queue.name)
        .bind(&queue.owner)
        .bind(queue.discipline.to_string())
        .bind(to_column(queue.max_concurrent))
        .bind(to_column(queue.max_pending))
        .bind(to_column(queue.running_count))
        .bind(&pending)
        .bind(&task_status)
        .bind(queue.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::DuplicateName {
                    owner: queue.owner.clone(),
                    name: queue.name.clone(),
                }
                .into()
            } else {
                map_sqlx_error(e)
            }
        })?;

        Ok(())
    }

    async fn load(&self, id: &QueueId) -> Result<Queue> {
        self.fetch_row(id).await?.into_queue()
    }

    async fn find(&self, filter: &QueueFilter) -> Result<Vec<Queue>> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = filter
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let offset = i64::try_from(filter.offset).unwrap_or(i64::MAX);

        let rows: Vec<QueueRow> = sqlx::query_as(
            r#"
            SELECT * FROM queues
            WHERE (? IS NULL OR name = ?)
              AND (? IS NULL OR owner = ?)
            ORDER BY created_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&filter.name)
        .bind(&filter.name)
        .bind(&filter.owner)
        .bind(&filter.owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(QueueRow::into_queue).collect()
    }

    async fn atomic_update(
        &self,
        id: &QueueId,
        predicate: Predicate<'_>,
        mutation: Mutation<'_>,
    ) -> Result<UpdateOutcome> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let row = self.fetch_row(id).await?;
            let version = row.version;
            let pre = row.into_queue()?;

            if !predicate(&pre) {
                return Ok(UpdateOutcome::unmatched(pre));
            }

            let mut post = pre.clone();
            mutation(&mut post);

            if self.compare_and_swap(&post, version).await? {
                return Ok(UpdateOutcome::matched(pre, post));
            }

            debug!(queue_id = %id, attempt, version, "Lost compare-and-swap race, retrying");
            let jitter = rand::thread_rng().gen_range(0..=CAS_RETRY_MAX_JITTER_MS);
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }

        warn!(queue_id = %id, attempts = MAX_CAS_ATTEMPTS, "Atomic update gave up under contention");
        Err(AppError::Conflict(format!(
            "Queue {} kept changing during {} update attempts",
            id, MAX_CAS_ATTEMPTS
        )))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    id: String,
    name: String,
    owner: String,
    discipline: String,
    max_concurrent: i64,
    max_pending: i64,
    running_count: i64,
    pending: String,     // JSON array of PendingEntry
    task_status: String, // JSON object task_id -> status
    created_at: i64,
    version: i64,
}

impl QueueRow {
    fn into_queue(self) -> Result<Queue> {
        let discipline: Discipline = self.discipline.parse().map_err(|e: DomainError| {
            AppError::Database(format!("Queue {} has corrupt discipline: {}", self.id, e))
        })?;
        let pending: VecDeque<PendingEntry> = serde_json::from_str(&self.pending)?;
        let task_status: BTreeMap<TaskId, TaskStatus> = serde_json::from_str(&self.task_status)?;

        Ok(Queue {
            max_concurrent: from_column("max_concurrent", self.max_concurrent)?,
            max_pending: from_column("max_pending", self.max_pending)?,
            running_count: from_column("running_count", self.running_count)?,
            id: self.id,
            name: self.name,
            owner: self.owner,
            discipline,
            pending,
            task_status,
            created_at: self.created_at,
        })
    }
}

//! Shared setup for SQLite-backed integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;
use taskq_core::application::{AdmissionController, CreateQueueRequest};
use taskq_core::domain::{Discipline, QueueId};
use taskq_core::port::id_provider::UuidProvider;
use taskq_core::port::time_provider::SystemTimeProvider;
use taskq_core::port::TaskLauncher;
use taskq_infra_sqlite::{create_pool, run_migrations, SqliteQueueStore};

pub async fn memory_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Unique database file under the system temp dir; removed on drop
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("taskq-test-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub async fn pool(&self) -> SqlitePool {
        let pool = create_pool(self.path.to_str().unwrap()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub fn controller(pool: SqlitePool, launcher: Arc<dyn TaskLauncher>) -> AdmissionController {
    AdmissionController::new(
        Arc::new(SqliteQueueStore::new(pool)),
        launcher,
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    )
}

pub async fn create_queue(
    controller: &AdmissionController,
    name: &str,
    discipline: Discipline,
    max_concurrent: u32,
) -> QueueId {
    controller
        .create(CreateQueueRequest {
            name: name.to_string(),
            owner: "alice".to_string(),
            discipline,
            max_concurrent,
            max_pending: 0,
        })
        .await
        .unwrap()
}

//! Concurrency on a shared database file
//!
//! Separate pools stand in for separate processes sharing one queue record.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use taskq_core::application::AdmissionController;
use taskq_core::domain::{Discipline, DomainError, StartParams};
use taskq_core::port::task_launcher::mocks::RecordingLauncher;
use taskq_core::AppError;
use tokio::task::JoinSet;

use common::{controller, create_queue, TempDb};

const CAP: u32 = 3;
const TASKS: usize = 30;
const WORKERS_PER_POOL: usize = 3;

/// Pop/complete workers on two pools never exceed the cap or admit twice
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_running_count_bounded_across_pools() {
    let db = TempDb::new();
    let first = Arc::new(controller(
        db.pool().await,
        Arc::new(RecordingLauncher::new_success()),
    ));
    let second = Arc::new(controller(
        db.pool().await,
        Arc::new(RecordingLauncher::new_success()),
    ));

    let queue_id = create_queue(&first, "shared", Discipline::Fifo, CAP).await;
    for i in 0..TASKS {
        first
            .add(&queue_id, format!("task-{}", i), StartParams::empty())
            .await
            .unwrap();
    }

    let mut workers = JoinSet::new();
    for controller in [&first, &second] {
        for _ in 0..WORKERS_PER_POOL {
            let controller: Arc<AdmissionController> = Arc::clone(controller);
            let queue_id = queue_id.clone();
            workers.spawn(async move {
                let mut admitted = Vec::new();
                loop {
                    match controller.pop(&queue_id).await.unwrap() {
                        Some(entry) => {
                            let queue = controller.load(&queue_id).await.unwrap();
                            assert!(queue.running_count <= CAP);

                            tokio::time::sleep(Duration::from_millis(1)).await;
                            controller.complete(&queue_id, &entry.task_id).await.unwrap();
                            admitted.push(entry.task_id);
                        }
                        None => {
                            let queue = controller.load(&queue_id).await.unwrap();
                            if queue.pending.is_empty() {
                                break;
                            }
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                    }
                }
                admitted
            });
        }
    }

    let mut all = Vec::new();
    while let Some(result) = workers.join_next().await {
        all.extend(result.unwrap());
    }

    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), TASKS, "every task admitted exactly once");
    assert_eq!(unique.len(), TASKS);

    let queue = second.load(&queue_id).await.unwrap();
    assert_eq!(queue.running_count, 0);
    assert!(queue.task_status.is_empty());
}

/// Racing adds of the same task id: one wins, the rest see AlreadyQueued
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_adds() {
    let db = TempDb::new();
    let controller = Arc::new(controller(
        db.pool().await,
        Arc::new(RecordingLauncher::new_success()),
    ));
    let queue_id = create_queue(&controller, "dupes", Discipline::Lifo, 0).await;

    let mut adds = JoinSet::new();
    for _ in 0..8 {
        let controller = controller.clone();
        let queue_id = queue_id.clone();
        adds.spawn(async move { controller.add(&queue_id, "same", StartParams::empty()).await });
    }

    let mut accepted = 0;
    let mut rejected = 0;
    while let Some(result) = adds.join_next().await {
        match result.unwrap() {
            Ok(_) => accepted += 1,
            Err(AppError::Domain(DomainError::AlreadyQueued { .. })) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(rejected, 7);
    let queue = controller.load(&queue_id).await.unwrap();
    assert_eq!(queue.pending.len(), 1);
}

/// Concurrent drains split the pending list without overlap
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_drains_never_double_admit() {
    let db = TempDb::new();
    let launcher = Arc::new(RecordingLauncher::new_success());
    let controller = Arc::new(controller(db.pool().await, launcher.clone()));
    let queue_id = create_queue(&controller, "drains", Discipline::Fifo, 5).await;

    for i in 0..12 {
        controller
            .add(&queue_id, format!("task-{}", i), StartParams::empty())
            .await
            .unwrap();
    }

    let mut drains = JoinSet::new();
    for _ in 0..4 {
        let controller = controller.clone();
        let queue_id = queue_id.clone();
        drains.spawn(async move {
            controller
                .drain(&queue_id, 12, &"alice".to_string())
                .await
                .unwrap()
                .admitted
                .len()
        });
    }

    let mut total = 0;
    while let Some(result) = drains.join_next().await {
        total += result.unwrap();
    }

    assert_eq!(total, 5, "cap bounds the admissions of all drains together");
    let launched: HashSet<_> = launcher.launched_ids().into_iter().collect();
    assert_eq!(launched.len(), 5);

    let queue = controller.load(&queue_id).await.unwrap();
    assert_eq!(queue.running_count, 5);
    assert_eq!(queue.pending.len(), 7);
}

//! Admission scenarios end to end on the SQLite store

mod common;

use std::sync::Arc;

use serde_json::json;
use taskq_core::application::CreateQueueRequest;
use taskq_core::domain::{Discipline, DomainError, StartParams, TaskStatus};
use taskq_core::port::task_launcher::mocks::RecordingLauncher;
use taskq_core::AppError;
use tokio_test::{assert_err, assert_ok};

use common::{controller, create_queue, memory_pool};

/// FIFO with cap 1: admission blocks until the running task completes
#[tokio::test]
async fn test_fifo_cap_one_scenario() {
    let launcher = Arc::new(RecordingLauncher::new_success());
    let controller = controller(memory_pool().await, launcher.clone());
    let queue_id = create_queue(&controller, "fifo", Discipline::Fifo, 1).await;

    assert_ok!(controller.add(&queue_id, "A", StartParams::empty()).await);
    assert_ok!(controller.add(&queue_id, "B", StartParams::empty()).await);

    let popped = controller.pop(&queue_id).await.unwrap().unwrap();
    assert_eq!(popped.task_id, "A");

    let queue = controller.load(&queue_id).await.unwrap();
    assert_eq!(queue.running_count, 1);
    assert_eq!(queue.pending_tasks().collect::<Vec<_>>(), vec!["B"]);
    assert_eq!(queue.status_of("A"), Some(TaskStatus::Running));

    assert!(controller.pop(&queue_id).await.unwrap().is_none());

    let queue = controller.complete(&queue_id, "A").await.unwrap();
    assert_eq!(queue.running_count, 0);
    assert!(!queue.is_tracked("A"));

    let popped = controller.pop(&queue_id).await.unwrap().unwrap();
    assert_eq!(popped.task_id, "B");
}

/// LIFO unbounded: drain admits most recent first and launches each one
#[tokio::test]
async fn test_lifo_drain_scenario() {
    let launcher = Arc::new(RecordingLauncher::new_success());
    let controller = controller(memory_pool().await, launcher.clone());
    let queue_id = create_queue(&controller, "lifo", Discipline::Lifo, 0).await;

    for id in ["A", "B", "C"] {
        controller
            .add(&queue_id, id, StartParams::new(json!({ "command": id })))
            .await
            .unwrap();
    }
    let queue = controller.load(&queue_id).await.unwrap();
    assert_eq!(queue.pending_tasks().collect::<Vec<_>>(), vec!["C", "B", "A"]);

    let outcome = controller
        .drain(&queue_id, 3, &"alice".to_string())
        .await
        .unwrap();

    let admitted: Vec<_> = outcome.admitted.iter().map(|e| e.task_id.as_str()).collect();
    assert_eq!(admitted, vec!["C", "B", "A"]);
    assert_eq!(launcher.launched_ids(), vec!["C", "B", "A"]);
    assert_eq!(outcome.queue.running_count, 3);
    assert!(outcome.queue.pending.is_empty());

    // Start params and caller reach the launcher untouched
    let (task_id, params, caller) = launcher.launched().remove(0);
    assert_eq!(task_id, "C");
    assert_eq!(params.as_value(), &json!({ "command": "C" }));
    assert_eq!(caller, "alice");
}

#[tokio::test]
async fn test_tracked_task_is_rejected_until_completed() {
    let controller = controller(
        memory_pool().await,
        Arc::new(RecordingLauncher::new_success()),
    );
    let queue_id = create_queue(&controller, "dedupe", Discipline::Fifo, 0).await;

    controller.add(&queue_id, "A", StartParams::empty()).await.unwrap();
    let err = controller
        .add(&queue_id, "A", StartParams::empty())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::AlreadyQueued { .. })));

    controller.pop(&queue_id).await.unwrap();
    assert_err!(controller.add(&queue_id, "A", StartParams::empty()).await);

    controller.complete(&queue_id, "A").await.unwrap();
    assert_ok!(controller.add(&queue_id, "A", StartParams::empty()).await);
}

#[tokio::test]
async fn test_complete_is_idempotent() {
    let controller = controller(
        memory_pool().await,
        Arc::new(RecordingLauncher::new_success()),
    );
    let queue_id = create_queue(&controller, "idem", Discipline::Fifo, 2).await;

    controller.add(&queue_id, "A", StartParams::empty()).await.unwrap();
    controller.add(&queue_id, "B", StartParams::empty()).await.unwrap();
    controller.pop(&queue_id).await.unwrap();

    let before = controller.load(&queue_id).await.unwrap();
    let after_unknown = controller.complete(&queue_id, "never-added").await.unwrap();
    let after_pending = controller.complete(&queue_id, "B").await.unwrap();
    assert_eq!(after_unknown, before);
    assert_eq!(after_pending, before);

    controller.complete(&queue_id, "A").await.unwrap();
    let queue = controller.complete(&queue_id, "A").await.unwrap();
    assert_eq!(queue.running_count, 0);
    assert_eq!(queue.pending_tasks().collect::<Vec<_>>(), vec!["B"]);
}

#[tokio::test]
async fn test_launch_failure_keeps_slot_until_completed() {
    let launcher = Arc::new(RecordingLauncher::new_fail_for("A"));
    let controller = controller(memory_pool().await, launcher.clone());
    let queue_id = create_queue(&controller, "failing", Discipline::Fifo, 1).await;

    controller.add(&queue_id, "A", StartParams::empty()).await.unwrap();
    controller.add(&queue_id, "B", StartParams::empty()).await.unwrap();

    let err = controller
        .drain(&queue_id, 2, &"alice".to_string())
        .await
        .unwrap_err();
    match err {
        AppError::LaunchFailed { task_id, .. } => assert_eq!(task_id, "A"),
        other => panic!("unexpected error: {:?}", other),
    }

    let queue = controller.load(&queue_id).await.unwrap();
    assert_eq!(queue.running_count, 1);
    assert_eq!(queue.status_of("A"), Some(TaskStatus::Running));
    assert_eq!(launcher.call_count(), 1);

    controller.complete(&queue_id, "A").await.unwrap();
    let outcome = controller
        .drain(&queue_id, 2, &"alice".to_string())
        .await
        .unwrap();
    assert_eq!(outcome.admitted.len(), 1);
    assert_eq!(outcome.admitted[0].task_id, "B");
}

#[tokio::test]
async fn test_pending_cap_rejects_with_queue_full() {
    let controller = controller(
        memory_pool().await,
        Arc::new(RecordingLauncher::new_success()),
    );
    let queue_id = controller
        .create(CreateQueueRequest {
            name: "bounded".to_string(),
            owner: "alice".to_string(),
            discipline: Discipline::Fifo,
            max_concurrent: 1,
            max_pending: 2,
        })
        .await
        .unwrap();

    controller.add(&queue_id, "A", StartParams::empty()).await.unwrap();
    controller.add(&queue_id, "B", StartParams::empty()).await.unwrap();
    let err = controller
        .add(&queue_id, "C", StartParams::empty())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::QueueFull { max_pending: 2, .. })
    ));

    // Admission frees a pending slot
    controller.pop(&queue_id).await.unwrap();
    assert_ok!(controller.add(&queue_id, "C", StartParams::empty()).await);
}

#[tokio::test]
async fn test_queue_names_are_unique_per_owner() {
    let controller = controller(
        memory_pool().await,
        Arc::new(RecordingLauncher::new_success()),
    );
    create_queue(&controller, "shared", Discipline::Fifo, 0).await;

    let err = controller
        .create(CreateQueueRequest {
            name: "shared".to_string(),
            owner: "alice".to_string(),
            discipline: Discipline::Lifo,
            max_concurrent: 0,
            max_pending: 0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::DuplicateName { .. })));

    assert_ok!(
        controller
            .create(CreateQueueRequest {
                name: "shared".to_string(),
                owner: "bob".to_string(),
                discipline: Discipline::Lifo,
                max_concurrent: 0,
                max_pending: 0,
            })
            .await
    );
}

#[tokio::test]
async fn test_unknown_queue_is_not_found() {
    let controller = controller(
        memory_pool().await,
        Arc::new(RecordingLauncher::new_success()),
    );
    let missing = "no-such-queue".to_string();

    assert!(controller.load(&missing).await.unwrap_err().is_not_found());
    assert!(controller
        .add(&missing, "A", StartParams::empty())
        .await
        .unwrap_err()
        .is_not_found());
    assert!(controller.pop(&missing).await.unwrap_err().is_not_found());
    assert!(controller
        .drain(&missing, 1, &"alice".to_string())
        .await
        .unwrap_err()
        .is_not_found());
    assert!(controller
        .complete(&missing, "A")
        .await
        .unwrap_err()
        .is_not_found());
}

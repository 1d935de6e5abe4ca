mod common;

use std::time::Duration;

use tempfile::TempDir;

use common::*;
use tdp::auth::Actor;
use tdp::backup::{Collection, ContentStore};
use tdp::database::entities::{restore_tasks, RestoreStatus};
use tdp::errors::CoreErrorKind;
use tdp::{AppContext, BackupConfig, BackupError};

async fn context(media: &TempDir) -> AppContext {
    AppContext::new(
        setup_db().await,
        BackupConfig {
            media_root: media.path().to_path_buf(),
            max_upload_bytes: 64 * 1024,
            ..BackupConfig::default()
        },
    )
}

fn operator() -> Actor {
    Actor::user(1).with_roles("staff")
}

async fn wait_until_finished(context: &AppContext, task_id: &str) -> restore_tasks::Model {
    for _ in 0..200 {
        let task = context
            .restore_service()
            .get_task(&Actor::system(), task_id)
            .await
            .unwrap();
        if task.status().is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("restore {} did not finish", task_id);
}

#[tokio::test]
async fn test_submit_runs_in_background() {
    let media = TempDir::new().unwrap();
    let context = context(&media).await;

    let task_id = context
        .restore_service()
        .submit(&operator(), ARCHIVE_NAME, phi_phi_archive())
        .await
        .unwrap();

    let task = wait_until_finished(&context, &task_id).await;
    assert_eq!(task.status(), RestoreStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.imported_tours, 1);
    assert_eq!(task.user_id, Some(1));
    assert_eq!(task.filename, ARCHIVE_NAME);

    assert_eq!(
        ContentStore::new(context.db())
            .count(Collection::Tours)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_submit_rejects_bad_uploads() {
    let media = TempDir::new().unwrap();
    let context = context(&media).await;
    let service = context.restore_service();

    let err = service
        .submit(&operator(), "backup.zip", phi_phi_archive())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Validation);
    assert_eq!(err.code(), "INVALID_ARCHIVE_NAME");

    let err = service
        .submit(&operator(), ARCHIVE_NAME, vec![0u8; 64 * 1024 + 1])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ARCHIVE_TOO_LARGE");

    let err = service
        .submit(&Actor::user(2).with_role("editor"), ARCHIVE_NAME, phi_phi_archive())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);

    let err = service
        .submit(&Actor::anonymous(), ARCHIVE_NAME, phi_phi_archive())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Unauthorized);

    // Nothing was queued
    assert!(service.list_tasks(&Actor::system()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_pending_task() {
    let media = TempDir::new().unwrap();
    let context = context(&media).await;
    let service = context.restore_service();
    let bytes = phi_phi_archive();

    let task = service
        .prepare(&operator(), ARCHIVE_NAME, bytes.len() as u64)
        .await
        .unwrap();
    assert_eq!(task.status(), RestoreStatus::Pending);

    let cancelled = service.cancel(&operator(), &task.id).await.unwrap();
    assert_eq!(cancelled.status(), RestoreStatus::Cancelled);

    // A cancelled task never starts
    let err = service.execute(&task.id, &bytes).await.unwrap_err();
    assert!(matches!(err, BackupError::Cancelled));
    assert!(!service.is_running(&task.id).await);

    let task = service.get_task(&operator(), &task.id).await.unwrap();
    assert_eq!(task.status(), RestoreStatus::Cancelled);
    assert_eq!(
        ContentStore::new(context.db())
            .count(Collection::Tours)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_cancel_finished_task_is_a_no_op() {
    let media = TempDir::new().unwrap();
    let context = context(&media).await;
    let service = context.restore_service();
    let bytes = phi_phi_archive();

    let task = service
        .prepare(&operator(), ARCHIVE_NAME, bytes.len() as u64)
        .await
        .unwrap();
    service.execute(&task.id, &bytes).await.unwrap();

    let unchanged = service.cancel(&operator(), &task.id).await.unwrap();
    assert_eq!(unchanged.status(), RestoreStatus::Completed);
    assert_eq!(unchanged.progress, 100);
}

#[tokio::test]
async fn test_tasks_are_scoped_to_their_owner() {
    let media = TempDir::new().unwrap();
    let context = context(&media).await;
    let service = context.restore_service();

    let task = service
        .prepare(&operator(), ARCHIVE_NAME, 10)
        .await
        .unwrap();

    let other = Actor::user(2).with_role("admin");
    let err = service.get_task(&other, &task.id).await.unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::NotFound);
    assert_eq!(
        service.cancel(&other, &task.id).await.unwrap_err().kind(),
        CoreErrorKind::NotFound
    );

    assert_eq!(service.list_tasks(&operator()).await.unwrap().len(), 1);
    assert!(service.list_tasks(&other).await.unwrap().is_empty());
    assert_eq!(service.list_tasks(&Actor::system()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_subscriber_after_completion_gets_final_snapshot() {
    let media = TempDir::new().unwrap();
    let context = context(&media).await;
    let service = context.restore_service();
    let bytes = phi_phi_archive();

    let task = service
        .prepare(&operator(), ARCHIVE_NAME, bytes.len() as u64)
        .await
        .unwrap();
    service.execute(&task.id, &bytes).await.unwrap();

    let (snapshot, receiver) = service.subscribe(&operator(), &task.id).await.unwrap();
    assert_eq!(snapshot.status, RestoreStatus::Completed);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(snapshot.imported_counts.tours, 1);
    assert!(receiver.is_none());
    assert_eq!(context.reporter().active_channels().await, 0);

    let snapshot = service.snapshot(&operator(), &task.id).await.unwrap();
    assert_eq!(snapshot.status, RestoreStatus::Completed);
}

#[tokio::test]
async fn test_subscriber_of_pending_task_receives_updates() {
    let media = TempDir::new().unwrap();
    let context = context(&media).await;
    let service = context.restore_service();
    let bytes = phi_phi_archive();

    let task = service
        .prepare(&operator(), ARCHIVE_NAME, bytes.len() as u64)
        .await
        .unwrap();
    let (snapshot, receiver) = service.subscribe(&operator(), &task.id).await.unwrap();
    assert_eq!(snapshot.status, RestoreStatus::Pending);
    let mut receiver = receiver.unwrap();

    service.execute(&task.id, &bytes).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = receiver.recv().await {
        seen.push(event.progress);
    }
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
}

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::backup::restore::ImportCounts;
use crate::database::entities::{restore_tasks, RestoreStatus};
use crate::services::restore_task_service::RestoreTaskService;
use crate::utils::EventBroadcaster;

/// One checkpoint as seen by subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: String,
    pub status: RestoreStatus,
    pub progress: i32,
    pub message: String,
    pub imported_counts: ImportCounts,
}

impl ProgressEvent {
    pub fn from_task(task: &restore_tasks::Model) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.status(),
            progress: task.progress,
            message: task.message.clone(),
            imported_counts: ImportCounts::from_task(task),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Outbound side of restore progress.
///
/// Publishing is best effort: implementations log delivery problems and never
/// fail the restore.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn publish(&self, event: ProgressEvent);

    /// Current state of a task, `None` when the task is unknown.
    async fn snapshot(&self, task_id: &str) -> Option<ProgressEvent>;
}

/// Fans progress out to per-task broadcast channels.
///
/// The latest event of every running task is kept in memory, so snapshots
/// are current even while the restore transaction is still open. Channels are
/// torn down after a terminal event; later snapshots come from the task table.
#[derive(Clone)]
pub struct BroadcastProgressReporter {
    broadcaster: EventBroadcaster<String, ProgressEvent>,
    db: DatabaseConnection,
}

impl BroadcastProgressReporter {
    pub fn new(db: DatabaseConnection, buffer_size: usize) -> Self {
        Self {
            broadcaster: EventBroadcaster::new(buffer_size),
            db,
        }
    }

    /// Latest in-memory event plus a receiver for the events after it.
    pub async fn subscribe(
        &self,
        task_id: &str,
    ) -> (Option<ProgressEvent>, broadcast::Receiver<ProgressEvent>) {
        self.broadcaster.subscribe(task_id.to_string()).await
    }

    /// Drop a task's channel; used when a subscriber learns the task is over.
    pub async fn close(&self, task_id: &str) {
        self.broadcaster.close(&task_id.to_string()).await;
    }

    pub async fn active_channels(&self) -> usize {
        self.broadcaster.channel_count().await
    }
}

#[async_trait]
impl ProgressReporter for BroadcastProgressReporter {
    async fn publish(&self, event: ProgressEvent) {
        let task_id = event.task_id.clone();
        let terminal = event.is_terminal();
        let reached = self.broadcaster.publish(task_id.clone(), event).await;
        debug!("Progress for restore {} delivered to {} subscribers", task_id, reached);

        if terminal {
            self.broadcaster.close(&task_id).await;
        }
    }

    async fn snapshot(&self, task_id: &str) -> Option<ProgressEvent> {
        if let Some(event) = self.broadcaster.latest(&task_id.to_string()).await {
            return Some(event);
        }
        match RestoreTaskService::new(&self.db).find(task_id).await {
            Ok(task) => task.as_ref().map(ProgressEvent::from_task),
            Err(e) => {
                warn!("Could not load restore {} for snapshot: {}", task_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use tokio::sync::broadcast::error::RecvError;

    fn event(task_id: &str, status: RestoreStatus, progress: i32) -> ProgressEvent {
        ProgressEvent {
            task_id: task_id.to_string(),
            status,
            progress,
            message: format!("{}%", progress),
            imported_counts: ImportCounts::default(),
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_latest_event() {
        let db = setup_test_db().await;
        let reporter = BroadcastProgressReporter::new(db, 8);

        reporter.publish(event("t1", RestoreStatus::Processing, 10)).await;
        reporter.publish(event("t1", RestoreStatus::Processing, 20)).await;

        let (latest, _receiver) = reporter.subscribe("t1").await;
        assert_eq!(latest.map(|event| event.progress), Some(20));
        assert_eq!(
            reporter.snapshot("t1").await.map(|event| event.progress),
            Some(20)
        );
    }

    #[tokio::test]
    async fn test_terminal_event_closes_channel() {
        let db = setup_test_db().await;
        let reporter = BroadcastProgressReporter::new(db, 8);

        let (_, mut receiver) = reporter.subscribe("t2").await;
        reporter.publish(event("t2", RestoreStatus::Processing, 50)).await;
        reporter.publish(event("t2", RestoreStatus::Completed, 100)).await;

        assert_eq!(receiver.recv().await.map(|event| event.progress).ok(), Some(50));
        assert_eq!(receiver.recv().await.map(|event| event.progress).ok(), Some(100));
        assert!(matches!(receiver.recv().await, Err(RecvError::Closed)));
        assert_eq!(reporter.active_channels().await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_task() {
        let db = setup_test_db().await;
        let reporter = BroadcastProgressReporter::new(db, 8);
        assert!(reporter.snapshot("missing").await.is_none());
    }
}

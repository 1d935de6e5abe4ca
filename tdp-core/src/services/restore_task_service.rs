use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::backup::restore::ImportCounts;
use crate::database::entities::{restore_tasks, RestoreStatus};
use crate::errors::{BackupError, BackupResult};

/// Task rows older than this many entries are not listed.
pub const TASK_LIST_LIMIT: u64 = 50;

/// Persistence of restore task rows.
///
/// Borrows any connection so the pipeline can write checkpoints through its
/// open transaction.
pub struct RestoreTaskService<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RestoreTaskService<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: Option<i32>,
        filename: &str,
        file_size: u64,
    ) -> BackupResult<restore_tasks::Model> {
        let id = Uuid::new_v4().to_string();
        let file_size = i64::try_from(file_size).unwrap_or(i64::MAX);
        let task = restore_tasks::ActiveModel::pending(id, user_id, filename.to_string(), file_size)
            .insert(self.db)
            .await?;
        Ok(task)
    }

    pub async fn find(&self, task_id: &str) -> BackupResult<Option<restore_tasks::Model>> {
        Ok(restore_tasks::Entity::find_by_id(task_id.to_string())
            .one(self.db)
            .await?)
    }

    pub async fn get(&self, task_id: &str) -> BackupResult<restore_tasks::Model> {
        self.find(task_id)
            .await?
            .ok_or_else(|| BackupError::TaskNotFound(task_id.to_string()))
    }

    /// A user's tasks, newest first
    pub async fn list_for_user(&self, user_id: i32) -> BackupResult<Vec<restore_tasks::Model>> {
        Ok(restore_tasks::Entity::find()
            .filter(restore_tasks::Column::UserId.eq(user_id))
            .order_by_desc(restore_tasks::Column::CreatedAt)
            .limit(TASK_LIST_LIMIT)
            .all(self.db)
            .await?)
    }

    pub async fn list_all(&self) -> BackupResult<Vec<restore_tasks::Model>> {
        Ok(restore_tasks::Entity::find()
            .order_by_desc(restore_tasks::Column::CreatedAt)
            .limit(TASK_LIST_LIMIT)
            .all(self.db)
            .await?)
    }

    /// Mark the task processing at `progress`. Progress never moves backwards.
    pub async fn checkpoint(
        &self,
        task_id: &str,
        progress: i32,
        message: &str,
        counts: &ImportCounts,
    ) -> BackupResult<restore_tasks::Model> {
        let task = self.get(task_id).await?;
        task.status().transition(RestoreStatus::Processing)?;

        let progress = progress.clamp(0, 100).max(task.progress);
        let started_at = task.started_at.unwrap_or_else(Utc::now);
        let mut active: restore_tasks::ActiveModel = task.into();
        active.status = Set(RestoreStatus::Processing.as_str().to_string());
        active.progress = Set(progress);
        active.message = Set(message.to_string());
        active.started_at = Set(Some(started_at));
        counts.apply(&mut active);
        Ok(active.update(self.db).await?)
    }

    pub async fn complete(
        &self,
        task_id: &str,
        message: &str,
        counts: &ImportCounts,
    ) -> BackupResult<restore_tasks::Model> {
        self.finish(task_id, RestoreStatus::Completed, 100, message, None, counts)
            .await
    }

    /// Terminal failure. `progress` is the last checkpoint reached.
    pub async fn fail(
        &self,
        task_id: &str,
        progress: i32,
        message: &str,
        details: &str,
        counts: &ImportCounts,
    ) -> BackupResult<restore_tasks::Model> {
        self.finish(
            task_id,
            RestoreStatus::Failed,
            progress,
            message,
            Some(details.to_string()),
            counts,
        )
        .await
    }

    pub async fn mark_cancelled(
        &self,
        task_id: &str,
        progress: i32,
        message: &str,
        counts: &ImportCounts,
    ) -> BackupResult<restore_tasks::Model> {
        self.finish(task_id, RestoreStatus::Cancelled, progress, message, None, counts)
            .await
    }

    /// Cancel a task that has not started. Running and finished tasks are
    /// returned unchanged.
    pub async fn cancel_pending(&self, task_id: &str) -> BackupResult<restore_tasks::Model> {
        let task = self.get(task_id).await?;
        if task.status() != RestoreStatus::Pending {
            return Ok(task);
        }
        self.mark_cancelled(
            task_id,
            task.progress,
            "Restore cancelled before it started",
            &ImportCounts::from_task(&task),
        )
        .await
    }

    async fn finish(
        &self,
        task_id: &str,
        status: RestoreStatus,
        progress: i32,
        message: &str,
        details: Option<String>,
        counts: &ImportCounts,
    ) -> BackupResult<restore_tasks::Model> {
        let task = self.get(task_id).await?;
        task.status().transition(status)?;

        let progress = progress.clamp(0, 100).max(task.progress);
        let mut active: restore_tasks::ActiveModel = task.into();
        active.status = Set(status.as_str().to_string());
        active.progress = Set(progress);
        active.message = Set(message.to_string());
        active.error_details = Set(details);
        active.completed_at = Set(Some(Utc::now()));
        counts.apply(&mut active);
        Ok(active.update(self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_task_lifecycle() {
        let db = setup_test_db().await;
        let service = RestoreTaskService::new(&db);

        let task = service.create(Some(7), "TDP_20250909.zip", 1024).await.unwrap();
        assert_eq!(task.status(), RestoreStatus::Pending);
        assert_eq!(task.message, "Waiting to start");
        assert!(task.started_at.is_none());

        let task = service
            .checkpoint(&task.id, 20, "Importing categories", &ImportCounts::default())
            .await
            .unwrap();
        assert_eq!(task.status(), RestoreStatus::Processing);
        assert!(task.started_at.is_some());

        let counts = ImportCounts {
            tours: 3,
            ..ImportCounts::default()
        };
        let task = service.complete(&task.id, "done", &counts).await.unwrap();
        assert_eq!(task.progress, 100);
        assert_eq!(task.imported_tours, 3);
        assert!(task.completed_at.is_some());

        let err = service
            .checkpoint(&task.id, 50, "again", &counts)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let db = setup_test_db().await;
        let service = RestoreTaskService::new(&db);
        let task = service.create(None, "TDP_20250909.zip", 10).await.unwrap();

        service
            .checkpoint(&task.id, 40, "Importing tags", &ImportCounts::default())
            .await
            .unwrap();
        let task = service
            .fail(&task.id, 10, "Restore failed", "details", &ImportCounts::default())
            .await
            .unwrap();
        assert_eq!(task.progress, 40);
        assert_eq!(task.status(), RestoreStatus::Failed);
        assert_eq!(task.error_details.as_deref(), Some("details"));
    }

    #[tokio::test]
    async fn test_cancel_pending_only() {
        let db = setup_test_db().await;
        let service = RestoreTaskService::new(&db);

        let pending = service.create(Some(1), "TDP_20250909.zip", 10).await.unwrap();
        let cancelled = service.cancel_pending(&pending.id).await.unwrap();
        assert_eq!(cancelled.status(), RestoreStatus::Cancelled);

        let done = service.create(Some(1), "TDP_20250910.zip", 10).await.unwrap();
        service
            .checkpoint(&done.id, 0, "Starting restore", &ImportCounts::default())
            .await
            .unwrap();
        service
            .complete(&done.id, "done", &ImportCounts::default())
            .await
            .unwrap();
        let unchanged = service.cancel_pending(&done.id).await.unwrap();
        assert_eq!(unchanged.status(), RestoreStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_for_user_is_scoped() {
        let db = setup_test_db().await;
        let service = RestoreTaskService::new(&db);
        service.create(Some(1), "TDP_20250901.zip", 1).await.unwrap();
        service.create(Some(2), "TDP_20250902.zip", 1).await.unwrap();
        service.create(Some(1), "TDP_20250903.zip", 1).await.unwrap();

        let tasks = service.list_for_user(1).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|task| task.user_id == Some(1)));
        assert_eq!(service.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_task() {
        let db = setup_test_db().await;
        let err = RestoreTaskService::new(&db).get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

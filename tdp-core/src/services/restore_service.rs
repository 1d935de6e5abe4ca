use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::auth::{Actor, Authorizer, ACTION_RESTORE};
use crate::backup::codec::validate_archive_name;
use crate::backup::restore::{ImportCounts, RestorePipeline};
use crate::config::BackupConfig;
use crate::database::entities::restore_tasks;
use crate::errors::{BackupError, BackupResult, CoreError};
use crate::services::progress_reporter::{
    BroadcastProgressReporter, ProgressEvent, ProgressReporter,
};
use crate::services::restore_task_service::RestoreTaskService;

/// Accepts uploaded archives and runs restores in the background.
#[derive(Clone)]
pub struct RestoreService {
    db: DatabaseConnection,
    config: Arc<BackupConfig>,
    reporter: Arc<BroadcastProgressReporter>,
    authorizer: Arc<dyn Authorizer>,
    active: Arc<RwLock<HashMap<String, Arc<AtomicBool>>>>,
}

impl RestoreService {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<BackupConfig>,
        reporter: Arc<BroadcastProgressReporter>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            db,
            config,
            reporter,
            authorizer,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn reporter(&self) -> &Arc<BroadcastProgressReporter> {
        &self.reporter
    }

    /// Validate an upload and create its pending task without starting it.
    pub async fn prepare(
        &self,
        actor: &Actor,
        filename: &str,
        size: u64,
    ) -> Result<restore_tasks::Model, CoreError> {
        self.authorizer.authorize(actor, ACTION_RESTORE)?;
        validate_archive_name(filename, &self.config.archive_prefix)?;
        if size > self.config.max_upload_bytes {
            return Err(BackupError::ArchiveTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            }
            .into());
        }

        let task = RestoreTaskService::new(&self.db)
            .create(actor.user_id, filename, size)
            .await?;
        info!("Restore {} queued for {} ({} bytes)", task.id, filename, size);
        self.reporter.publish(ProgressEvent::from_task(&task)).await;
        Ok(task)
    }

    /// Queue a restore and return its task id immediately.
    pub async fn submit(
        &self,
        actor: &Actor,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, CoreError> {
        let task = self.prepare(actor, filename, bytes.len() as u64).await?;
        let task_id = task.id.clone();
        let cancel = self.register(&task_id).await;

        let service = self.clone();
        let spawned_id = task_id.clone();
        tokio::spawn(async move {
            if let Err(e) = service.run_registered(&spawned_id, &bytes, cancel).await {
                warn!("Background restore {} ended with: {}", spawned_id, e);
            }
        });

        Ok(task_id)
    }

    /// Run a prepared task inline, returning once it is terminal.
    pub async fn execute(&self, task_id: &str, bytes: &[u8]) -> BackupResult<ImportCounts> {
        let cancel = self.register(task_id).await;
        self.run_registered(task_id, bytes, cancel).await
    }

    async fn register(&self, task_id: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.active
            .write()
            .await
            .insert(task_id.to_string(), Arc::clone(&flag));
        flag
    }

    async fn run_registered(
        &self,
        task_id: &str,
        bytes: &[u8],
        cancel: Arc<AtomicBool>,
    ) -> BackupResult<ImportCounts> {
        let reporter: Arc<dyn ProgressReporter> = self.reporter.clone();
        let result = RestorePipeline::new(self.db.clone(), Arc::clone(&self.config), reporter, task_id)
            .with_cancel_flag(cancel)
            .run(bytes)
            .await;
        self.active.write().await.remove(task_id);
        result
    }

    pub async fn is_running(&self, task_id: &str) -> bool {
        self.active.read().await.contains_key(task_id)
    }

    /// Request cancellation.
    ///
    /// A running task stops at its next checkpoint; a pending one is
    /// cancelled right away; a finished one is left as it is.
    pub async fn cancel(
        &self,
        actor: &Actor,
        task_id: &str,
    ) -> Result<restore_tasks::Model, CoreError> {
        let task = self.get_task(actor, task_id).await?;

        if let Some(flag) = self.active.read().await.get(task_id) {
            flag.store(true, Ordering::SeqCst);
            info!("Cancellation requested for running restore {}", task_id);
            return Ok(task);
        }

        let task = RestoreTaskService::new(&self.db).cancel_pending(task_id).await?;
        if task.status().is_terminal() {
            self.reporter.publish(ProgressEvent::from_task(&task)).await;
        }
        Ok(task)
    }

    /// A task visible to the actor; other users' tasks read as missing.
    pub async fn get_task(
        &self,
        actor: &Actor,
        task_id: &str,
    ) -> Result<restore_tasks::Model, CoreError> {
        let task = RestoreTaskService::new(&self.db)
            .find(task_id)
            .await?
            .filter(|task| actor.can_view_owned_by(task.user_id))
            .ok_or_else(|| CoreError::not_found("restore_task", task_id))?;
        Ok(task)
    }

    pub async fn list_tasks(&self, actor: &Actor) -> Result<Vec<restore_tasks::Model>, CoreError> {
        let service = RestoreTaskService::new(&self.db);
        let tasks = match actor.user_id {
            _ if actor.is_system() => service.list_all().await?,
            Some(user_id) => service.list_for_user(user_id).await?,
            None => Vec::new(),
        };
        Ok(tasks)
    }

    /// Current state, preferring the in-memory latest checkpoint.
    pub async fn snapshot(&self, actor: &Actor, task_id: &str) -> Result<ProgressEvent, CoreError> {
        let task = self.get_task(actor, task_id).await?;
        Ok(self
            .reporter
            .snapshot(task_id)
            .await
            .unwrap_or_else(|| ProgressEvent::from_task(&task)))
    }

    /// Snapshot plus a live receiver; no receiver once the task is terminal.
    pub async fn subscribe(
        &self,
        actor: &Actor,
        task_id: &str,
    ) -> Result<(ProgressEvent, Option<broadcast::Receiver<ProgressEvent>>), CoreError> {
        self.get_task(actor, task_id).await?;
        let (latest, receiver) = self.reporter.subscribe(task_id).await;
        // Read the row only after subscribing so a terminal event cannot slip
        // between the two.
        let snapshot = match latest {
            Some(event) => event,
            None => ProgressEvent::from_task(&RestoreTaskService::new(&self.db).get(task_id).await?),
        };

        if snapshot.is_terminal() {
            self.reporter.close(task_id).await;
            return Ok((snapshot, None));
        }
        Ok((snapshot, Some(receiver)))
    }
}

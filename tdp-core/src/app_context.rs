use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{Authorizer, BackupOperatorAuthorizer};
use crate::config::BackupConfig;
use crate::services::{BroadcastProgressReporter, ExportService, RestoreService};

/// Shared application context exposing the backup services to the HTTP and
/// CLI layers.
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    config: Arc<BackupConfig>,
    reporter: Arc<BroadcastProgressReporter>,
    export_service: Arc<ExportService>,
    restore_service: RestoreService,
}

impl AppContext {
    pub fn new(db: DatabaseConnection, config: BackupConfig) -> Self {
        Self::with_authorizer(db, config, Arc::new(BackupOperatorAuthorizer))
    }

    pub fn with_authorizer(
        db: DatabaseConnection,
        config: BackupConfig,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let config = Arc::new(config);
        let reporter = Arc::new(BroadcastProgressReporter::new(
            db.clone(),
            config.progress_buffer,
        ));
        let export_service = Arc::new(ExportService::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&authorizer),
        ));
        let restore_service = RestoreService::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&reporter),
            authorizer,
        );

        Self {
            db,
            config,
            reporter,
            export_service,
            restore_service,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn reporter(&self) -> Arc<BroadcastProgressReporter> {
        self.reporter.clone()
    }

    pub fn export_service(&self) -> Arc<ExportService> {
        self.export_service.clone()
    }

    pub fn restore_service(&self) -> &RestoreService {
        &self.restore_service
    }
}

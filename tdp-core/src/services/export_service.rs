use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::info;

use crate::auth::{Actor, Authorizer, ACTION_EXPORT};
use crate::backup::codec::archive_file_name;
use crate::backup::export::{ExportPipeline, ExportSummary};
use crate::config::BackupConfig;
use crate::errors::{BackupError, CoreError};

/// A finished export, ready to be written or streamed
pub struct ArchiveFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub summary: ExportSummary,
}

pub struct ExportService {
    db: DatabaseConnection,
    config: Arc<BackupConfig>,
    authorizer: Arc<dyn Authorizer>,
}

impl ExportService {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<BackupConfig>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            db,
            config,
            authorizer,
        }
    }

    /// Build `<PREFIX>_<YYYYMMDD>.zip` from one consistent read of the store.
    pub async fn export(&self, actor: &Actor) -> Result<ArchiveFile, CoreError> {
        self.authorizer.authorize(actor, ACTION_EXPORT)?;

        let txn = self.db.begin().await.map_err(BackupError::from)?;
        let (bytes, summary) = ExportPipeline::new(&txn, &self.config.media_root)
            .run()
            .await?;
        txn.commit().await.map_err(BackupError::from)?;

        let filename = archive_file_name(&self.config.archive_prefix, Utc::now().date_naive());
        info!("Exported {} ({} bytes)", filename, bytes.len());
        Ok(ArchiveFile {
            filename,
            bytes,
            summary,
        })
    }
}

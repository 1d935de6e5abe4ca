use std::collections::HashMap;
use std::path::Path;

use sea_orm::ConnectionTrait;
use tracing::{debug, info};

use super::codec::{encode_collection, encode_singleton, ArchiveWriter};
use super::manifest::{Collection, Identity};
use super::store::ContentStore;
use crate::errors::BackupResult;

/// Record counts of one export, in archive order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub collections: Vec<(Collection, usize)>,
    pub media_files: usize,
}

impl ExportSummary {
    pub fn count(&self, collection: Collection) -> usize {
        self.collections
            .iter()
            .find(|(candidate, _)| *candidate == collection)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Serializes the whole store plus the media root into one archive.
///
/// Read-only: run it on a transaction to get a consistent snapshot.
pub struct ExportPipeline<'a, C: ConnectionTrait> {
    store: ContentStore<'a, C>,
    media_root: &'a Path,
}

impl<'a, C: ConnectionTrait> ExportPipeline<'a, C> {
    pub fn new(db: &'a C, media_root: &'a Path) -> Self {
        Self {
            store: ContentStore::new(db),
            media_root,
        }
    }

    pub async fn run(&self) -> BackupResult<(Vec<u8>, ExportSummary)> {
        let mut natural_keys: HashMap<Collection, HashMap<i64, String>> = HashMap::new();
        for collection in Collection::EXPORT_ORDER {
            if collection.identity() == Identity::Slug {
                natural_keys.insert(collection, self.store.natural_keys(collection).await?);
            }
        }
        let natural_key = |target: Collection, id: i64| {
            natural_keys
                .get(&target)
                .and_then(|keys| keys.get(&id))
                .cloned()
        };

        let mut writer = ArchiveWriter::new();
        let mut summary = ExportSummary::default();

        for collection in Collection::EXPORT_ORDER {
            if collection.identity() == Identity::Singleton {
                let settings = self.store.load_settings().await?;
                let document = encode_singleton(collection, settings.as_ref())?;
                writer.write_collection(collection, &document)?;
                summary
                    .collections
                    .push((collection, usize::from(settings.is_some())));
                continue;
            }

            let records = self.store.list(collection).await?;
            let document = encode_collection(collection, &records, natural_key)?;
            writer.write_collection(collection, &document)?;
            debug!("Exported {} {} records", records.len(), collection);
            summary.collections.push((collection, records.len()));
        }

        summary.media_files = writer.write_media(self.media_root)?;
        let bytes = writer.finish()?;

        info!(
            "Export finished: {} collections, {} media files, {} bytes",
            summary.collections.len(),
            summary.media_files,
            bytes.len()
        );
        Ok((bytes, summary))
    }
}

//! Restore pipeline
//!
//! One run takes an uploaded archive through the checkpoints below, persisting
//! and publishing each one before the step starts:
//!
//! | progress | step |
//! |---------:|------|
//! | 0 | start |
//! | 5 | extract into a temporary directory |
//! | 10 | purge the collections the archive covers |
//! | 20..85 | import collections in dependency order |
//! | 90 | copy media files |
//! | 100 | completed |
//!
//! Purge through site settings run inside one database transaction; media is
//! copied after the commit. A failure rolls the transaction back and marks the
//! task `failed` with the last reached progress.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::codec::{self, ExtractedArchive};
use super::manifest::{Collection, Identity};
use super::record::EntityRecord;
use super::resolver::{target_slug, NaturalKeyResolver};
use super::store::ContentStore;
use crate::config::BackupConfig;
use crate::database::entities::restore_tasks;
use crate::errors::{BackupError, BackupResult};
use crate::services::progress_reporter::{ProgressEvent, ProgressReporter};
use crate::services::restore_task_service::RestoreTaskService;

/// Per-collection counters mirrored on the task row
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub categories: i32,
    pub tour_categories: i32,
    pub service_categories: i32,
    pub tags: i32,
    pub tours: i32,
    pub services: i32,
    pub reviews: i32,
    pub news: i32,
    pub blog: i32,
    pub prices: i32,
    pub files: i32,
}

impl ImportCounts {
    pub fn from_task(task: &restore_tasks::Model) -> Self {
        Self {
            categories: task.imported_categories,
            tour_categories: task.imported_tour_categories,
            service_categories: task.imported_service_categories,
            tags: task.imported_tags,
            tours: task.imported_tours,
            services: task.imported_services,
            reviews: task.imported_reviews,
            news: task.imported_news,
            blog: task.imported_blog,
            prices: task.imported_prices,
            files: task.imported_files,
        }
    }

    pub fn apply(&self, task: &mut restore_tasks::ActiveModel) {
        task.imported_categories = Set(self.categories);
        task.imported_tour_categories = Set(self.tour_categories);
        task.imported_service_categories = Set(self.service_categories);
        task.imported_tags = Set(self.tags);
        task.imported_tours = Set(self.tours);
        task.imported_services = Set(self.services);
        task.imported_reviews = Set(self.reviews);
        task.imported_news = Set(self.news);
        task.imported_blog = Set(self.blog);
        task.imported_prices = Set(self.prices);
        task.imported_files = Set(self.files);
    }

    fn counter(&mut self, collection: Collection) -> Option<&mut i32> {
        match collection {
            Collection::Categories => Some(&mut self.categories),
            Collection::TourCategories => Some(&mut self.tour_categories),
            Collection::ServiceCategories => Some(&mut self.service_categories),
            Collection::Tags => Some(&mut self.tags),
            Collection::Tours => Some(&mut self.tours),
            Collection::Services => Some(&mut self.services),
            Collection::Reviews => Some(&mut self.reviews),
            Collection::News => Some(&mut self.news),
            Collection::Blog => Some(&mut self.blog),
            Collection::Prices => Some(&mut self.prices),
            Collection::SiteSettings => None,
        }
    }

    pub fn increment(&mut self, collection: Collection) {
        if let Some(counter) = self.counter(collection) {
            *counter += 1;
        }
    }

    pub fn get(&self, collection: Collection) -> i32 {
        match collection {
            Collection::Categories => self.categories,
            Collection::TourCategories => self.tour_categories,
            Collection::ServiceCategories => self.service_categories,
            Collection::Tags => self.tags,
            Collection::Tours => self.tours,
            Collection::Services => self.services,
            Collection::Reviews => self.reviews,
            Collection::News => self.news,
            Collection::Blog => self.blog,
            Collection::Prices => self.prices,
            Collection::SiteSettings => 0,
        }
    }

    /// `categories: 1, tour categories: 0, ...` for the completion message
    pub fn summary(&self) -> String {
        format!(
            "categories: {}, tour categories: {}, service categories: {}, tags: {}, tours: {}, \
             services: {}, reviews: {}, news: {}, blog posts: {}, price lists: {}, media files: {}",
            self.categories,
            self.tour_categories,
            self.service_categories,
            self.tags,
            self.tours,
            self.services,
            self.reviews,
            self.news,
            self.blog,
            self.prices,
            self.files
        )
    }
}

/// Import checkpoint per collection, in dependency order
const IMPORT_STEPS: [(Collection, i32, &str); 11] = [
    (Collection::Categories, 20, "Importing categories"),
    (Collection::TourCategories, 30, "Importing tour categories"),
    (Collection::ServiceCategories, 35, "Importing service categories"),
    (Collection::Tags, 40, "Importing tags"),
    (Collection::Tours, 50, "Importing tours"),
    (Collection::Services, 60, "Importing services"),
    (Collection::Reviews, 65, "Importing reviews"),
    (Collection::News, 70, "Importing news"),
    (Collection::Blog, 75, "Importing blog posts"),
    (Collection::Prices, 80, "Importing price lists"),
    (Collection::SiteSettings, 85, "Importing site settings"),
];

pub struct RestorePipeline {
    db: DatabaseConnection,
    config: Arc<BackupConfig>,
    reporter: Arc<dyn ProgressReporter>,
    task_id: String,
    cancel: Arc<AtomicBool>,
    counts: ImportCounts,
    progress: i32,
    resolver: NaturalKeyResolver,
    data_committed: bool,
}

impl RestorePipeline {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<BackupConfig>,
        reporter: Arc<dyn ProgressReporter>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            db,
            config,
            reporter,
            task_id: task_id.into(),
            cancel: Arc::new(AtomicBool::new(false)),
            counts: ImportCounts::default(),
            progress: 0,
            resolver: NaturalKeyResolver::new(),
            data_committed: false,
        }
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the restore to a terminal state.
    ///
    /// The task row always ends `completed`, `failed` or `cancelled`; the
    /// error that stopped the run is returned unchanged.
    pub async fn run(mut self, bytes: &[u8]) -> BackupResult<ImportCounts> {
        let task = RestoreTaskService::new(&self.db).get(&self.task_id).await?;
        if task.status().is_terminal() {
            info!("Restore {} is already {}, not starting", self.task_id, task.status);
            return Err(BackupError::Cancelled);
        }

        let mut completion_failed = false;
        let err = match self.execute(bytes).await {
            Ok(()) => {
                let message = format!("Restore completed: {}", self.counts.summary());
                match RestoreTaskService::new(&self.db)
                    .complete(&self.task_id, &message, &self.counts)
                    .await
                {
                    Ok(task) => {
                        info!("Restore {} completed ({})", self.task_id, self.counts.summary());
                        self.reporter.publish(ProgressEvent::from_task(&task)).await;
                        return Ok(self.counts);
                    }
                    Err(err) => {
                        completion_failed = true;
                        err
                    }
                }
            }
            Err(err) => err,
        };

        // The rollback undid every record counted so far
        if !self.data_committed {
            self.counts = ImportCounts::default();
        }

        match err {
            BackupError::Cancelled => {
                info!("Restore {} cancelled at {}%", self.task_id, self.progress);
                let message = if self.data_committed {
                    "Restore cancelled after data import; media files were not copied"
                } else {
                    "Restore cancelled; no data was changed"
                };
                match RestoreTaskService::new(&self.db)
                    .mark_cancelled(&self.task_id, self.progress, message, &self.counts)
                    .await
                {
                    Ok(task) => self.reporter.publish(ProgressEvent::from_task(&task)).await,
                    Err(e) => error!("Failed to mark restore {} cancelled: {}", self.task_id, e),
                }
                Err(BackupError::Cancelled)
            }
            err => {
                error!("Restore {} failed at {}%: {}", self.task_id, self.progress, err);
                let message = if completion_failed {
                    format!("Restore finished but its completion could not be recorded: {}", err)
                } else if self.data_committed {
                    format!("Media import failed after data was committed: {}", err)
                } else {
                    format!("Restore failed: {}", err)
                };
                match RestoreTaskService::new(&self.db)
                    .fail(&self.task_id, self.progress, &message, &err.diagnostic(), &self.counts)
                    .await
                {
                    Ok(task) => self.reporter.publish(ProgressEvent::from_task(&task)).await,
                    Err(e) => error!("Failed to mark restore {} failed: {}", self.task_id, e),
                }
                Err(err)
            }
        }
    }

    async fn execute(&mut self, bytes: &[u8]) -> BackupResult<()> {
        let db = self.db.clone();
        self.checkpoint(&db, 0, "Starting restore").await?;
        self.checkpoint(&db, 5, "Extracting archive").await?;

        // Dropping the extracted archive removes the temporary directory on
        // every exit path below.
        let archive = codec::extract(bytes, &self.config.temp_prefix)?;
        debug!("Restore {} extracted into {:?}", self.task_id, archive.root());

        let txn = db.begin().await?;
        match self.import_structured(&txn, &archive).await {
            Ok(()) => txn.commit().await?,
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!("Rollback of restore {} failed: {}", self.task_id, rollback);
                }
                return Err(err);
            }
        }
        self.data_committed = true;

        self.checkpoint(&db, 90, "Importing media files").await?;
        let files = archive.media_files()?;
        let copied = codec::copy_media_tree(&archive.media_dir(), &files, &self.config.media_root)?;
        self.counts.files = i32::try_from(copied).unwrap_or(i32::MAX);
        debug!("Restore {} copied {} media files", self.task_id, copied);

        Ok(())
    }

    async fn import_structured(
        &mut self,
        txn: &DatabaseTransaction,
        archive: &ExtractedArchive,
    ) -> BackupResult<()> {
        let store = ContentStore::new(txn);

        self.checkpoint(txn, 10, "Purging existing data").await?;
        let covered: BTreeSet<Collection> = Collection::EXPORT_ORDER
            .into_iter()
            .filter(|collection| collection.identity() != Identity::Singleton)
            .filter(|collection| archive.contains(*collection))
            .collect();
        let purged = store.purge(&covered).await?;
        info!("Restore {} purged {:?}", self.task_id, purged);

        // Rows that survive the purge stay linkable by slug
        for collection in Collection::EXPORT_ORDER {
            if collection.identity() == Identity::Slug && !purged.contains(&collection) {
                let existing = store.slugs(collection).await?;
                self.resolver.seed(collection, existing);
            }
        }

        for (collection, progress, message) in IMPORT_STEPS {
            self.checkpoint(txn, progress, message).await?;
            self.import_collection(&store, archive, collection).await?;
        }
        Ok(())
    }

    async fn import_collection(
        &mut self,
        store: &ContentStore<'_, DatabaseTransaction>,
        archive: &ExtractedArchive,
        collection: Collection,
    ) -> BackupResult<()> {
        if collection.identity() == Identity::Singleton {
            match archive.singleton(collection)? {
                Some(fields) => store.replace_settings(&fields).await?,
                None => debug!("No site settings in archive, keeping current settings"),
            }
            return Ok(());
        }

        let records = archive.records(collection)?;
        self.resolver.register_records(collection, &records);

        if collection.is_taxonomy() {
            return self.import_taxonomy(store, collection, &records).await;
        }

        for record in &records {
            let id = match collection {
                Collection::Tours => self.import_tour(store, record).await?,
                Collection::Services => self.import_service(store, record).await?,
                Collection::News => {
                    let slug = target_slug(collection, record)?;
                    let id = store.upsert_news(&slug, record).await?;
                    self.resolver.record(collection, slug, id);
                    id
                }
                Collection::Blog => {
                    let slug = target_slug(collection, record)?;
                    let id = store.upsert_blog(&slug, record).await?;
                    self.resolver.record(collection, slug, id);
                    id
                }
                Collection::Reviews => store.insert_review(record).await?,
                Collection::Prices => store.insert_price(record).await?,
                _ => continue,
            };
            debug!("Imported {} #{}", collection, id);
            self.counts.increment(collection);
        }
        Ok(())
    }

    async fn import_taxonomy(
        &mut self,
        store: &ContentStore<'_, DatabaseTransaction>,
        collection: Collection,
        records: &[EntityRecord],
    ) -> BackupResult<()> {
        for index in taxonomy_order(collection, records, &self.resolver)? {
            let record = &records[index];
            let slug = record.slug().ok_or_else(|| missing_slug(collection, record))?;
            let name = record.fields.non_empty_text("name").unwrap_or_else(|| slug.clone());
            let parent_id = match record.reference("parent") {
                Some(reference) => Some(
                    self.resolver
                        .resolve(collection, "parent", collection, reference)?
                        .id,
                ),
                None => None,
            };

            let id = store.upsert_term(collection, &slug, name, parent_id).await?;
            self.resolver.record(collection, slug, id);
            self.counts.increment(collection);
        }
        Ok(())
    }

    async fn import_tour(
        &mut self,
        store: &ContentStore<'_, DatabaseTransaction>,
        record: &EntityRecord,
    ) -> BackupResult<i32> {
        let slug = target_slug(Collection::Tours, record)?;
        let category = record.reference("category").ok_or_else(|| {
            BackupError::validation(format!("tour '{}' has no category", slug))
        })?;
        let category = self.resolver.resolve(
            Collection::Tours,
            "category",
            Collection::Categories,
            category,
        )?;
        let categories = self.resolver.resolve_many(
            Collection::Tours,
            "categories",
            Collection::TourCategories,
            record.relation("categories"),
        );
        let tags = self.resolver.resolve_many(
            Collection::Tours,
            "tags",
            Collection::Tags,
            record.relation("tags"),
        );

        let id = store
            .upsert_tour(&slug, record, category.id, &categories, &tags)
            .await?;
        self.resolver.record(Collection::Tours, slug, id);
        Ok(id)
    }

    async fn import_service(
        &mut self,
        store: &ContentStore<'_, DatabaseTransaction>,
        record: &EntityRecord,
    ) -> BackupResult<i32> {
        let slug = target_slug(Collection::Services, record)?;
        let categories = self.resolver.resolve_many(
            Collection::Services,
            "categories",
            Collection::ServiceCategories,
            record.relation("categories"),
        );
        let tags = self.resolver.resolve_many(
            Collection::Services,
            "tags",
            Collection::Tags,
            record.relation("tags"),
        );

        let id = store.upsert_service(&slug, record, &categories, &tags).await?;
        self.resolver.record(Collection::Services, slug, id);
        Ok(id)
    }

    /// Persist and publish a checkpoint, unless the run was cancelled.
    async fn checkpoint<C: ConnectionTrait>(
        &mut self,
        db: &C,
        progress: i32,
        message: &str,
    ) -> BackupResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(BackupError::Cancelled);
        }

        let task = RestoreTaskService::new(db)
            .checkpoint(&self.task_id, progress, message, &self.counts)
            .await?;
        self.progress = progress;
        info!("Restore {}: {}% {}", self.task_id, progress, message);
        self.reporter.publish(ProgressEvent::from_task(&task)).await;
        Ok(())
    }
}

fn missing_slug(collection: Collection, record: &EntityRecord) -> BackupError {
    BackupError::validation(format!(
        "{} record {} has no slug",
        collection,
        record
            .pk
            .map(|pk| format!("#{}", pk))
            .unwrap_or_else(|| "without pk".to_string())
    ))
}

/// Indices of `records` ordered so that every parent precedes its children.
///
/// A parent outside the file must already be known to the resolver; a parent
/// chain that loops back on itself is rejected.
pub fn taxonomy_order(
    collection: Collection,
    records: &[EntityRecord],
    resolver: &NaturalKeyResolver,
) -> BackupResult<Vec<usize>> {
    let mut by_slug: HashMap<String, usize> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let slug = record.slug().ok_or_else(|| missing_slug(collection, record))?;
        by_slug.entry(slug).or_insert(index);
    }

    let parent_of = |index: usize| -> BackupResult<Option<usize>> {
        let Some(reference) = records[index].reference("parent") else {
            return Ok(None);
        };
        let in_file = resolver
            .natural_key(collection, reference)
            .and_then(|slug| by_slug.get(&slug).copied());
        match in_file {
            Some(parent) => Ok(Some(parent)),
            None => {
                let known = resolver
                    .natural_key(collection, reference)
                    .and_then(|slug| resolver.lookup(collection, &slug));
                if known.is_some() {
                    Ok(None)
                } else {
                    Err(BackupError::unresolved(
                        collection.name(),
                        "parent",
                        reference.describe(),
                    ))
                }
            }
        }
    };

    let mut order = Vec::with_capacity(records.len());
    let mut done: HashSet<usize> = HashSet::new();

    for start in 0..records.len() {
        let mut chain: Vec<usize> = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if done.contains(&index) {
                break;
            }
            if chain.contains(&index) {
                return Err(BackupError::validation(format!(
                    "{} parent cycle through '{}'",
                    collection,
                    records[index].slug().unwrap_or_default()
                )));
            }
            chain.push(index);
            current = parent_of(index)?;
        }
        for index in chain.into_iter().rev() {
            if done.insert(index) {
                order.push(index);
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::record::{FieldValue, Reference};

    fn term(slug: &str, parent: Option<&str>) -> EntityRecord {
        let record = EntityRecord::new(None)
            .with_field("name", FieldValue::text(slug))
            .with_field("slug", FieldValue::text(slug));
        match parent {
            Some(parent) => record.with_reference("parent", Reference::slug(parent)),
            None => record,
        }
    }

    fn slugs(records: &[EntityRecord], order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|index| records[*index].slug().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_taxonomy_order_parents_first() {
        let records = vec![
            term("snorkeling", Some("sea")),
            term("sea", Some("tours")),
            term("tours", None),
            term("city", Some("tours")),
        ];
        let order = taxonomy_order(Collection::Categories, &records, &NaturalKeyResolver::new())
            .unwrap();
        assert_eq!(slugs(&records, &order), vec!["tours", "sea", "snorkeling", "city"]);
    }

    #[test]
    fn test_taxonomy_order_rejects_cycles() {
        let records = vec![term("a", Some("b")), term("b", Some("a"))];
        let err = taxonomy_order(Collection::Categories, &records, &NaturalKeyResolver::new())
            .unwrap_err();
        assert!(matches!(err, BackupError::Validation(_)));

        let records = vec![term("self", Some("self"))];
        assert!(taxonomy_order(Collection::Categories, &records, &NaturalKeyResolver::new()).is_err());
    }

    #[test]
    fn test_taxonomy_order_unknown_parent() {
        let records = vec![term("child", Some("ghost"))];
        let err = taxonomy_order(Collection::Categories, &records, &NaturalKeyResolver::new())
            .unwrap_err();
        assert_eq!(err.error_code(), "UNRESOLVED_REFERENCE");

        let mut resolver = NaturalKeyResolver::new();
        resolver.record(Collection::Categories, "ghost", 3);
        assert_eq!(
            taxonomy_order(Collection::Categories, &records, &resolver).unwrap(),
            vec![0]
        );
    }

    #[test]
    fn test_taxonomy_without_slug_is_fatal() {
        let records = vec![EntityRecord::new(Some(9)).with_field("name", FieldValue::text("Nameless"))];
        let err = taxonomy_order(Collection::Tags, &records, &NaturalKeyResolver::new())
            .unwrap_err();
        assert!(err.to_string().contains("#9"));
    }

    #[test]
    fn test_import_counts() {
        let mut counts = ImportCounts::default();
        counts.increment(Collection::Tours);
        counts.increment(Collection::Tours);
        counts.increment(Collection::SiteSettings);
        assert_eq!(counts.get(Collection::Tours), 2);
        assert_eq!(counts.get(Collection::SiteSettings), 0);
        assert!(counts.summary().contains("tours: 2"));
    }
}

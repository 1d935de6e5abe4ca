#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tokio::sync::Mutex;

use tdp::backup::ArchiveWriter;
use tdp::database::connection::{establish_connection, MEMORY_DATABASE_URL};
use tdp::database::entities::{categories, tags, tour_tags, tours};
use tdp::database::Migrator;
use tdp::services::{ProgressEvent, ProgressReporter, RestoreTaskService};
use tdp::BackupConfig;

pub const ARCHIVE_NAME: &str = "TDP_20250909.zip";

pub async fn setup_db() -> DatabaseConnection {
    let db = establish_connection(MEMORY_DATABASE_URL)
        .await
        .expect("Failed to connect to test database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub fn config_with_media(media_root: &Path) -> Arc<BackupConfig> {
    Arc::new(BackupConfig {
        media_root: media_root.to_path_buf(),
        ..BackupConfig::default()
    })
}

/// Zip the given `(entry name, JSON or raw bytes)` pairs.
pub fn archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ArchiveWriter::new();
    for (name, bytes) in entries {
        writer.write_bytes(name, bytes).expect("write entry");
    }
    writer.finish().expect("finish archive")
}

pub fn json(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).expect("serialize document")
}

/// The one-category, one-tag, one-tour archive used across tests.
pub fn phi_phi_archive() -> Vec<u8> {
    archive(&[
        (
            "data/categories.json",
            json(serde_json::json!([{"slug": "boat-tours", "name": "Boat Tours"}])),
        ),
        (
            "data/tags.json",
            json(serde_json::json!([{"slug": "family", "name": "Family"}])),
        ),
        (
            "data/tours.json",
            json(serde_json::json!([{
                "pk": 1,
                "slug": "phi-phi-day-trip",
                "title": "Phi Phi Day Trip",
                "category_slug": "boat-tours",
                "price_adult": "45.00",
                "_m2m": {"tags": ["family"]}
            }])),
        ),
    ])
}

pub async fn create_task(db: &DatabaseConnection) -> String {
    RestoreTaskService::new(db)
        .create(Some(1), ARCHIVE_NAME, 0)
        .await
        .expect("create task")
        .id
}

/// Keeps every published event in order.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }

    pub async fn progress(&self) -> Vec<i32> {
        self.events().await.iter().map(|event| event.progress).collect()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn publish(&self, event: ProgressEvent) {
        self.events.lock().await.push(event);
    }

    async fn snapshot(&self, task_id: &str) -> Option<ProgressEvent> {
        self.events
            .lock()
            .await
            .iter()
            .rev()
            .find(|event| event.task_id == task_id)
            .cloned()
    }
}

/// `(category slug, sorted tag slugs)` of the tour with `slug`
pub async fn tour_links(db: &DatabaseConnection, slug: &str) -> (String, Vec<String>) {
    let tour = tours::Entity::find()
        .filter(tours::Column::Slug.eq(slug))
        .one(db)
        .await
        .expect("query tour")
        .unwrap_or_else(|| panic!("tour {} not found", slug));

    let category = categories::Entity::find_by_id(tour.category_id)
        .one(db)
        .await
        .expect("query category")
        .expect("tour category exists");

    let tag_ids: Vec<i32> = tour_tags::Entity::find()
        .filter(tour_tags::Column::TourId.eq(tour.id))
        .all(db)
        .await
        .expect("query tour tags")
        .into_iter()
        .map(|link| link.tag_id)
        .collect();
    let mut tag_slugs: Vec<String> = tags::Entity::find()
        .filter(tags::Column::Id.is_in(tag_ids))
        .all(db)
        .await
        .expect("query tags")
        .into_iter()
        .map(|tag| tag.slug)
        .collect();
    tag_slugs.sort();

    (category.slug, tag_slugs)
}

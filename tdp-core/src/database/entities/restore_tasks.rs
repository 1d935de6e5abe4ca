use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use super::restore_status::RestoreStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "restore_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: Option<i32>,
    pub filename: String,
    pub file_size: i64,
    pub status: String,
    pub progress: i32,
    pub message: String,
    pub error_details: Option<String>,
    pub imported_categories: i32,
    pub imported_tour_categories: i32,
    pub imported_service_categories: i32,
    pub imported_tags: i32,
    pub imported_tours: i32,
    pub imported_services: i32,
    pub imported_reviews: i32,
    pub imported_news: i32,
    pub imported_blog: i32,
    pub imported_prices: i32,
    pub imported_files: i32,
    pub created_at: ChronoDateTimeUtc,
    pub started_at: Option<ChronoDateTimeUtc>,
    pub completed_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn pending(id: String, user_id: Option<i32>, filename: String, file_size: i64) -> Self {
        Self {
            id: Set(id),
            user_id: Set(user_id),
            filename: Set(filename),
            file_size: Set(file_size),
            status: Set(RestoreStatus::Pending.as_str().to_string()),
            progress: Set(0),
            message: Set("Waiting to start".to_string()),
            error_details: Set(None),
            imported_categories: Set(0),
            imported_tour_categories: Set(0),
            imported_service_categories: Set(0),
            imported_tags: Set(0),
            imported_tours: Set(0),
            imported_services: Set(0),
            imported_reviews: Set(0),
            imported_news: Set(0),
            imported_blog: Set(0),
            imported_prices: Set(0),
            imported_files: Set(0),
            created_at: Set(chrono::Utc::now()),
            started_at: Set(None),
            completed_at: Set(None),
        }
    }
}

impl Model {
    /// Unknown strings read back as `Failed` so a corrupt row is never resumed.
    pub fn status(&self) -> RestoreStatus {
        RestoreStatus::from_str(&self.status).unwrap_or(RestoreStatus::Failed)
    }
}

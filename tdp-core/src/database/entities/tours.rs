use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Decimal columns hold the canonical string form (`"45.00"`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tours")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub category_id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub short_desc: String,
    pub description: String,
    pub duration: String,
    pub location: String,
    pub youtube_url: String,
    pub price_adult: String,
    pub price_child: Option<String>,
    pub price_extra: Option<String>,
    pub price_old_adult: Option<String>,
    pub price_old_child: Option<String>,
    pub rating: Option<String>,
    pub reviews_count: i32,
    pub is_popular: bool,
    pub is_active: bool,
    pub cover: Option<String>,
    pub meta_title: String,
    pub meta_desc: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Categories,
    #[sea_orm(has_many = "super::tour_tags::Entity")]
    TourTags,
    #[sea_orm(has_many = "super::tour_category_links::Entity")]
    TourCategoryLinks,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::tour_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourTags.def()
    }
}

impl Related<super::tour_category_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourCategoryLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

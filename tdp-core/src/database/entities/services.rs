use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub short_desc: String,
    pub description: String,
    pub location: String,
    pub youtube_url: String,
    pub price_adult: String,
    pub price_child: Option<String>,
    pub price_extra: Option<String>,
    pub cover: Option<String>,
    pub is_active: bool,
    pub meta_title: String,
    pub meta_desc: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::service_tags::Entity")]
    ServiceTags,
    #[sea_orm(has_many = "super::service_category_links::Entity")]
    ServiceCategoryLinks,
}

impl Related<super::service_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceTags.def()
    }
}

impl Related<super::service_category_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceCategoryLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

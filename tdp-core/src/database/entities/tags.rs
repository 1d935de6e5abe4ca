use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tour_tags::Entity")]
    TourTags,
    #[sea_orm(has_many = "super::service_tags::Entity")]
    ServiceTags,
}

impl Related<super::tour_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourTags.def()
    }
}

impl Related<super::service_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

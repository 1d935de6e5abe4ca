use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tour_category_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tour_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub tour_category_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tours::Entity",
        from = "Column::TourId",
        to = "super::tours::Column::Id",
        on_delete = "Cascade"
    )]
    Tours,
    #[sea_orm(
        belongs_to = "super::tour_categories::Entity",
        from = "Column::TourCategoryId",
        to = "super::tour_categories::Column::Id",
        on_delete = "Cascade"
    )]
    TourCategories,
}

impl Related<super::tours::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tours.def()
    }
}

impl Related<super::tour_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourCategories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

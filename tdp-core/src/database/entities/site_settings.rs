use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Singleton row; the service always reads and writes `SINGLETON_ID`.
pub const SINGLETON_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "site_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub site_name: String,
    pub phone: String,
    pub phone_alt: String,
    pub email: String,
    pub address: String,
    pub whatsapp: String,
    pub telegram: String,
    pub instagram: String,
    pub about_short: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub use sea_orm_migration::prelude::*;

mod m20250909_000001_create_taxonomy;
mod m20250909_000002_create_content;
mod m20250909_000003_create_restore_tasks;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250909_000001_create_taxonomy::Migration),
            Box::new(m20250909_000002_create_content::Migration),
            Box::new(m20250909_000003_create_restore_tasks::Migration),
        ]
    }
}

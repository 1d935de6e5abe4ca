use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(RestoreTasks::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(RestoreTasks::Id)
                    .string_len(36)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(RestoreTasks::UserId).integer())
            .col(ColumnDef::new(RestoreTasks::Filename).string_len(255).not_null())
            .col(
                ColumnDef::new(RestoreTasks::FileSize)
                    .big_integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(RestoreTasks::Status)
                    .string_len(20)
                    .not_null()
                    .default("pending"),
            )
            .col(
                ColumnDef::new(RestoreTasks::Progress)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(RestoreTasks::Message).text().not_null().default(""))
            .col(ColumnDef::new(RestoreTasks::ErrorDetails).text());

        for counter in [
            RestoreTasks::ImportedCategories,
            RestoreTasks::ImportedTourCategories,
            RestoreTasks::ImportedServiceCategories,
            RestoreTasks::ImportedTags,
            RestoreTasks::ImportedTours,
            RestoreTasks::ImportedServices,
            RestoreTasks::ImportedReviews,
            RestoreTasks::ImportedNews,
            RestoreTasks::ImportedBlog,
            RestoreTasks::ImportedPrices,
            RestoreTasks::ImportedFiles,
        ] {
            table.col(ColumnDef::new(counter).integer().not_null().default(0));
        }

        table
            .col(
                ColumnDef::new(RestoreTasks::CreatedAt)
                    .timestamp()
                    .default(Expr::current_timestamp())
                    .not_null(),
            )
            .col(ColumnDef::new(RestoreTasks::StartedAt).timestamp())
            .col(ColumnDef::new(RestoreTasks::CompletedAt).timestamp());

        manager.create_table(table.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-restore-tasks-user-created")
                    .table(RestoreTasks::Table)
                    .col(RestoreTasks::UserId)
                    .col(RestoreTasks::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RestoreTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RestoreTasks {
    Table,
    Id,
    UserId,
    Filename,
    FileSize,
    Status,
    Progress,
    Message,
    ErrorDetails,
    ImportedCategories,
    ImportedTourCategories,
    ImportedServiceCategories,
    ImportedTags,
    ImportedTours,
    ImportedServices,
    ImportedReviews,
    ImportedNews,
    ImportedBlog,
    ImportedPrices,
    ImportedFiles,
    CreatedAt,
    StartedAt,
    CompletedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(taxonomy_table(Categories::Table, Some("fk_categories_parent_id")))
            .await?;
        manager
            .create_table(taxonomy_table(
                TourCategories::Table,
                Some("fk_tour_categories_parent_id"),
            ))
            .await?;
        manager
            .create_table(taxonomy_table(
                ServiceCategories::Table,
                Some("fk_service_categories_parent_id"),
            ))
            .await?;
        manager
            .create_table(taxonomy_table(Tags::Table, None))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ServiceCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TourCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await
    }
}

/// Slug-keyed term table, optionally a tree through `parent_id`.
fn taxonomy_table<T>(table: T, parent_fk: Option<&str>) -> TableCreateStatement
where
    T: Iden + Copy + 'static,
{
    let mut statement = Table::create();
    statement
        .table(table)
        .if_not_exists()
        .col(
            ColumnDef::new(Term::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Term::Name).string_len(120).not_null())
        .col(
            ColumnDef::new(Term::Slug)
                .string_len(140)
                .not_null()
                .unique_key(),
        );

    if let Some(fk_name) = parent_fk {
        statement.col(ColumnDef::new(Term::ParentId).integer()).foreign_key(
            ForeignKey::create()
                .name(fk_name)
                .from(table, Term::ParentId)
                .to(table, Term::Id)
                .on_delete(ForeignKeyAction::SetNull),
        );
    }

    statement.to_owned()
}

#[derive(DeriveIden)]
enum Term {
    Id,
    Name,
    Slug,
    ParentId,
}

#[derive(DeriveIden, Clone, Copy)]
enum Categories {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum TourCategories {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum ServiceCategories {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum Tags {
    Table,
}

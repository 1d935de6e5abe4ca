use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tours::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tours::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tours::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Tours::Title).string_len(200).not_null())
                    .col(
                        ColumnDef::new(Tours::Slug)
                            .string_len(200)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Tours::ShortDesc).text().not_null().default(""))
                    .col(ColumnDef::new(Tours::Description).text().not_null().default(""))
                    .col(ColumnDef::new(Tours::Duration).string_len(80).not_null().default(""))
                    .col(ColumnDef::new(Tours::Location).string_len(160).not_null().default(""))
                    .col(ColumnDef::new(Tours::YoutubeUrl).string_len(200).not_null().default(""))
                    .col(ColumnDef::new(Tours::PriceAdult).string_len(32).not_null())
                    .col(ColumnDef::new(Tours::PriceChild).string_len(32))
                    .col(ColumnDef::new(Tours::PriceExtra).string_len(32))
                    .col(ColumnDef::new(Tours::PriceOldAdult).string_len(32))
                    .col(ColumnDef::new(Tours::PriceOldChild).string_len(32))
                    .col(ColumnDef::new(Tours::Rating).string_len(8))
                    .col(
                        ColumnDef::new(Tours::ReviewsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Tours::IsPopular)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Tours::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Tours::Cover).string_len(255))
                    .col(ColumnDef::new(Tours::MetaTitle).string_len(180).not_null().default(""))
                    .col(ColumnDef::new(Tours::MetaDesc).string_len(300).not_null().default(""))
                    .col(
                        ColumnDef::new(Tours::CreatedAt)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tours::UpdatedAt)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tours_category_id")
                            .from(Tours::Table, Tours::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Services::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Services::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Services::Title).string_len(200).not_null())
                    .col(
                        ColumnDef::new(Services::Slug)
                            .string_len(200)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Services::ShortDesc).text().not_null().default(""))
                    .col(ColumnDef::new(Services::Description).text().not_null().default(""))
                    .col(ColumnDef::new(Services::Location).string_len(160).not_null().default(""))
                    .col(ColumnDef::new(Services::YoutubeUrl).string_len(200).not_null().default(""))
                    .col(ColumnDef::new(Services::PriceAdult).string_len(32).not_null())
                    .col(ColumnDef::new(Services::PriceChild).string_len(32))
                    .col(ColumnDef::new(Services::PriceExtra).string_len(32))
                    .col(ColumnDef::new(Services::Cover).string_len(255))
                    .col(
                        ColumnDef::new(Services::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Services::MetaTitle).string_len(180).not_null().default(""))
                    .col(ColumnDef::new(Services::MetaDesc).string_len(300).not_null().default(""))
                    .col(
                        ColumnDef::new(Services::CreatedAt)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Services::UpdatedAt)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reviews::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reviews::Name).string_len(120).not_null())
                    .col(ColumnDef::new(Reviews::Email).string_len(254).not_null().default(""))
                    .col(ColumnDef::new(Reviews::Message).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Reviews::IsApproved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reviews::Image).string_len(255))
                    .col(
                        ColumnDef::new(Reviews::CreatedAt)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NewsPosts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NewsPosts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NewsPosts::Title).string_len(200).not_null())
                    .col(
                        ColumnDef::new(NewsPosts::Slug)
                            .string_len(200)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(NewsPosts::Content).text().not_null().default(""))
                    .col(
                        ColumnDef::new(NewsPosts::IsPublished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(NewsPosts::Cover).string_len(255))
                    .col(
                        ColumnDef::new(NewsPosts::PubDate)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BlogPosts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlogPosts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BlogPosts::Title).string_len(200).not_null())
                    .col(
                        ColumnDef::new(BlogPosts::Slug)
                            .string_len(200)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(BlogPosts::Content).text().not_null().default(""))
                    .col(
                        ColumnDef::new(BlogPosts::IsPublished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(BlogPosts::Cover).string_len(255))
                    .col(ColumnDef::new(BlogPosts::YoutubeUrl).string_len(200))
                    .col(
                        ColumnDef::new(BlogPosts::PubDate)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PricePdfs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PricePdfs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PricePdfs::Name).string_len(200).not_null().default(""))
                    .col(ColumnDef::new(PricePdfs::File).string_len(255).not_null())
                    .col(
                        ColumnDef::new(PricePdfs::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PricePdfs::UploadedAt)
                            .timestamp()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SiteSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SiteSettings::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SiteSettings::SiteName)
                            .string_len(120)
                            .not_null()
                            .default("TravelWorld"),
                    )
                    .col(ColumnDef::new(SiteSettings::Phone).string_len(50).not_null().default(""))
                    .col(ColumnDef::new(SiteSettings::PhoneAlt).string_len(50).not_null().default(""))
                    .col(ColumnDef::new(SiteSettings::Email).string_len(254).not_null().default(""))
                    .col(ColumnDef::new(SiteSettings::Address).string_len(255).not_null().default(""))
                    .col(ColumnDef::new(SiteSettings::Whatsapp).string_len(120).not_null().default(""))
                    .col(ColumnDef::new(SiteSettings::Telegram).string_len(120).not_null().default(""))
                    .col(ColumnDef::new(SiteSettings::Instagram).string_len(120).not_null().default(""))
                    .col(ColumnDef::new(SiteSettings::AboutShort).text().not_null().default(""))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(link_table(
                Links::TourTags,
                Links::TourId,
                Tours::Table,
                Links::TagId,
                Tags::Table,
            ))
            .await?;
        manager
            .create_table(link_table(
                Links::TourCategoryLinks,
                Links::TourId,
                Tours::Table,
                Links::TourCategoryId,
                TourCategories::Table,
            ))
            .await?;
        manager
            .create_table(link_table(
                Links::ServiceTags,
                Links::ServiceId,
                Services::Table,
                Links::TagId,
                Tags::Table,
            ))
            .await?;
        manager
            .create_table(link_table(
                Links::ServiceCategoryLinks,
                Links::ServiceId,
                Services::Table,
                Links::ServiceCategoryId,
                ServiceCategories::Table,
            ))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Links::ServiceCategoryLinks,
            Links::ServiceTags,
            Links::TourCategoryLinks,
            Links::TourTags,
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        manager
            .drop_table(Table::drop().table(SiteSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PricePdfs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BlogPosts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NewsPosts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Reviews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Services::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tours::Table).to_owned())
            .await
    }
}

/// Composite-key join table with cascading foreign keys on both sides.
fn link_table<O, T>(
    table: Links,
    owner_col: Links,
    owner: O,
    target_col: Links,
    target: T,
) -> TableCreateStatement
where
    O: Iden + 'static,
    T: Iden + 'static,
{
    let table_name = table.to_string();
    Table::create()
        .table(table)
        .if_not_exists()
        .col(ColumnDef::new(owner_col).integer().not_null())
        .col(ColumnDef::new(target_col).integer().not_null())
        .primary_key(Index::create().col(owner_col).col(target_col))
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{}_{}", table_name, owner_col.to_string()))
                .from(table, owner_col)
                .to(owner, Alias::new("id"))
                .on_delete(ForeignKeyAction::Cascade),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{}_{}", table_name, target_col.to_string()))
                .from(table, target_col)
                .to(target, Alias::new("id"))
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

#[derive(DeriveIden, Clone, Copy)]
enum Links {
    TourTags,
    TourCategoryLinks,
    ServiceTags,
    ServiceCategoryLinks,
    TourId,
    ServiceId,
    TagId,
    TourCategoryId,
    ServiceCategoryId,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum TourCategories {
    Table,
}

#[derive(DeriveIden)]
enum ServiceCategories {
    Table,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
}

#[derive(DeriveIden)]
enum Tours {
    Table,
    Id,
    CategoryId,
    Title,
    Slug,
    ShortDesc,
    Description,
    Duration,
    Location,
    YoutubeUrl,
    PriceAdult,
    PriceChild,
    PriceExtra,
    PriceOldAdult,
    PriceOldChild,
    Rating,
    ReviewsCount,
    IsPopular,
    IsActive,
    Cover,
    MetaTitle,
    MetaDesc,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Services {
    Table,
    Id,
    Title,
    Slug,
    ShortDesc,
    Description,
    Location,
    YoutubeUrl,
    PriceAdult,
    PriceChild,
    PriceExtra,
    Cover,
    IsActive,
    MetaTitle,
    MetaDesc,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    Name,
    Email,
    Message,
    IsApproved,
    Image,
    CreatedAt,
}

#[derive(DeriveIden)]
enum NewsPosts {
    Table,
    Id,
    Title,
    Slug,
    Content,
    IsPublished,
    Cover,
    PubDate,
}

#[derive(DeriveIden)]
enum BlogPosts {
    Table,
    Id,
    Title,
    Slug,
    Content,
    IsPublished,
    Cover,
    YoutubeUrl,
    PubDate,
}

#[derive(DeriveIden)]
enum PricePdfs {
    Table,
    Id,
    Name,
    File,
    IsActive,
    UploadedAt,
}

#[derive(DeriveIden)]
enum SiteSettings {
    Table,
    Id,
    SiteName,
    Phone,
    PhoneAlt,
    Email,
    Address,
    Whatsapp,
    Telegram,
    Instagram,
    AboutShort,
}

//! Database side of export and restore
//!
//! `ContentStore` is generic over `ConnectionTrait` so the same code reads from
//! a plain connection during export and writes through the restore
//! transaction.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use super::manifest::Collection;
use super::record::{EntityRecord, FieldValue, Fields, Reference};
use crate::database::entities::{
    blog_posts, categories, news_posts, price_pdfs, reviews, service_categories,
    service_category_links, service_tags, services, site_settings, tags, tour_categories,
    tour_category_links, tour_tags, tours,
};
use crate::errors::{BackupError, BackupResult};

/// Deletion order: content before taxonomy, links before either side.
const PURGE_ORDER: [Collection; 10] = [
    Collection::Prices,
    Collection::Blog,
    Collection::News,
    Collection::Reviews,
    Collection::Services,
    Collection::Tours,
    Collection::ServiceCategories,
    Collection::TourCategories,
    Collection::Tags,
    Collection::Categories,
];

macro_rules! list_terms {
    ($db:expr, $entity:ident) => {
        $entity::Entity::find()
            .order_by_asc($entity::Column::Id)
            .all($db)
            .await?
            .into_iter()
            .map(|term| {
                let record = EntityRecord::new(Some(i64::from(term.id)))
                    .with_field("name", FieldValue::Text(term.name))
                    .with_field("slug", FieldValue::Text(term.slug));
                match term.parent_id {
                    Some(parent) => record.with_reference("parent", Reference::LegacyId(i64::from(parent))),
                    None => record,
                }
            })
            .collect()
    };
}

macro_rules! upsert_term {
    ($db:expr, $entity:ident, $slug:expr, $name:expr, $parent:expr) => {{
        let existing = $entity::Entity::find()
            .filter($entity::Column::Slug.eq($slug))
            .one($db)
            .await?;
        let model = match existing {
            Some(model) => {
                let mut active: $entity::ActiveModel = model.into();
                active.name = Set($name);
                active.parent_id = Set($parent);
                active.update($db).await?
            }
            None => {
                $entity::ActiveModel {
                    id: NotSet,
                    name: Set($name),
                    slug: Set($slug.to_string()),
                    parent_id: Set($parent),
                }
                .insert($db)
                .await?
            }
        };
        model.id
    }};
}

macro_rules! slug_map {
    ($db:expr, $entity:ident) => {
        $entity::Entity::find()
            .all($db)
            .await?
            .into_iter()
            .map(|model| (model.slug, model.id))
            .collect()
    };
}

pub struct ContentStore<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ContentStore<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    // ----- Reading -----

    /// All records of a collection in id order, references as stored ids.
    pub async fn list(&self, collection: Collection) -> BackupResult<Vec<EntityRecord>> {
        let records: Vec<EntityRecord> = match collection {
            Collection::Categories => list_terms!(self.db, categories),
            Collection::TourCategories => list_terms!(self.db, tour_categories),
            Collection::ServiceCategories => list_terms!(self.db, service_categories),
            Collection::Tags => tags::Entity::find()
                .order_by_asc(tags::Column::Id)
                .all(self.db)
                .await?
                .into_iter()
                .map(|tag| {
                    EntityRecord::new(Some(i64::from(tag.id)))
                        .with_field("name", FieldValue::Text(tag.name))
                        .with_field("slug", FieldValue::Text(tag.slug))
                })
                .collect(),
            Collection::Tours => self.list_tours().await?,
            Collection::Services => self.list_services().await?,
            Collection::Reviews => reviews::Entity::find()
                .order_by_asc(reviews::Column::Id)
                .all(self.db)
                .await?
                .into_iter()
                .map(|review| {
                    EntityRecord::new(Some(i64::from(review.id)))
                        .with_field("name", FieldValue::Text(review.name))
                        .with_field("email", FieldValue::Text(review.email))
                        .with_field("message", FieldValue::Text(review.message))
                        .with_field("is_approved", FieldValue::Boolean(review.is_approved))
                        .with_field("image", FieldValue::optional_text(review.image))
                        .with_field("created_at", FieldValue::Timestamp(review.created_at))
                })
                .collect(),
            Collection::News => news_posts::Entity::find()
                .order_by_asc(news_posts::Column::Id)
                .all(self.db)
                .await?
                .into_iter()
                .map(|post| {
                    EntityRecord::new(Some(i64::from(post.id)))
                        .with_field("title", FieldValue::Text(post.title))
                        .with_field("slug", FieldValue::Text(post.slug))
                        .with_field("content", FieldValue::Text(post.content))
                        .with_field("is_published", FieldValue::Boolean(post.is_published))
                        .with_field("cover", FieldValue::optional_text(post.cover))
                        .with_field("pub_date", FieldValue::Timestamp(post.pub_date))
                })
                .collect(),
            Collection::Blog => blog_posts::Entity::find()
                .order_by_asc(blog_posts::Column::Id)
                .all(self.db)
                .await?
                .into_iter()
                .map(|post| {
                    EntityRecord::new(Some(i64::from(post.id)))
                        .with_field("title", FieldValue::Text(post.title))
                        .with_field("slug", FieldValue::Text(post.slug))
                        .with_field("content", FieldValue::Text(post.content))
                        .with_field("is_published", FieldValue::Boolean(post.is_published))
                        .with_field("cover", FieldValue::optional_text(post.cover))
                        .with_field("youtube_url", FieldValue::optional_text(post.youtube_url))
                        .with_field("pub_date", FieldValue::Timestamp(post.pub_date))
                })
                .collect(),
            Collection::Prices => price_pdfs::Entity::find()
                .order_by_asc(price_pdfs::Column::Id)
                .all(self.db)
                .await?
                .into_iter()
                .map(|price| {
                    EntityRecord::new(Some(i64::from(price.id)))
                        .with_field("name", FieldValue::Text(price.name))
                        .with_field("file", FieldValue::Text(price.file))
                        .with_field("is_active", FieldValue::Boolean(price.is_active))
                        .with_field("uploaded_at", FieldValue::Timestamp(price.uploaded_at))
                })
                .collect(),
            Collection::SiteSettings => Vec::new(),
        };
        Ok(records)
    }

    async fn list_tours(&self) -> BackupResult<Vec<EntityRecord>> {
        let mut tag_links: HashMap<i32, Vec<Reference>> = HashMap::new();
        for link in tour_tags::Entity::find().all(self.db).await? {
            tag_links
                .entry(link.tour_id)
                .or_default()
                .push(Reference::LegacyId(i64::from(link.tag_id)));
        }
        let mut category_links: HashMap<i32, Vec<Reference>> = HashMap::new();
        for link in tour_category_links::Entity::find().all(self.db).await? {
            category_links
                .entry(link.tour_id)
                .or_default()
                .push(Reference::LegacyId(i64::from(link.tour_category_id)));
        }

        let tours = tours::Entity::find()
            .order_by_asc(tours::Column::Id)
            .all(self.db)
            .await?;

        Ok(tours
            .into_iter()
            .map(|tour| {
                let categories = category_links.remove(&tour.id).unwrap_or_default();
                let tags = tag_links.remove(&tour.id).unwrap_or_default();
                EntityRecord::new(Some(i64::from(tour.id)))
                    .with_reference("category", Reference::LegacyId(i64::from(tour.category_id)))
                    .with_field("title", FieldValue::Text(tour.title))
                    .with_field("slug", FieldValue::Text(tour.slug))
                    .with_field("short_desc", FieldValue::Text(tour.short_desc))
                    .with_field("description", FieldValue::Text(tour.description))
                    .with_field("duration", FieldValue::Text(tour.duration))
                    .with_field("location", FieldValue::Text(tour.location))
                    .with_field("youtube_url", FieldValue::Text(tour.youtube_url))
                    .with_field("price_adult", FieldValue::Decimal(tour.price_adult))
                    .with_field("price_child", FieldValue::optional_decimal(tour.price_child))
                    .with_field("price_extra", FieldValue::optional_decimal(tour.price_extra))
                    .with_field("price_old_adult", FieldValue::optional_decimal(tour.price_old_adult))
                    .with_field("price_old_child", FieldValue::optional_decimal(tour.price_old_child))
                    .with_field("rating", FieldValue::optional_decimal(tour.rating))
                    .with_field("reviews_count", FieldValue::Integer(i64::from(tour.reviews_count)))
                    .with_field("is_popular", FieldValue::Boolean(tour.is_popular))
                    .with_field("is_active", FieldValue::Boolean(tour.is_active))
                    .with_field("cover", FieldValue::optional_text(tour.cover))
                    .with_field("meta_title", FieldValue::Text(tour.meta_title))
                    .with_field("meta_desc", FieldValue::Text(tour.meta_desc))
                    .with_field("created_at", FieldValue::Timestamp(tour.created_at))
                    .with_field("updated_at", FieldValue::Timestamp(tour.updated_at))
                    .with_relation("categories", categories)
                    .with_relation("tags", tags)
            })
            .collect())
    }

    async fn list_services(&self) -> BackupResult<Vec<EntityRecord>> {
        let mut tag_links: HashMap<i32, Vec<Reference>> = HashMap::new();
        for link in service_tags::Entity::find().all(self.db).await? {
            tag_links
                .entry(link.service_id)
                .or_default()
                .push(Reference::LegacyId(i64::from(link.tag_id)));
        }
        let mut category_links: HashMap<i32, Vec<Reference>> = HashMap::new();
        for link in service_category_links::Entity::find().all(self.db).await? {
            category_links
                .entry(link.service_id)
                .or_default()
                .push(Reference::LegacyId(i64::from(link.service_category_id)));
        }

        let services = services::Entity::find()
            .order_by_asc(services::Column::Id)
            .all(self.db)
            .await?;

        Ok(services
            .into_iter()
            .map(|service| {
                let categories = category_links.remove(&service.id).unwrap_or_default();
                let tags = tag_links.remove(&service.id).unwrap_or_default();
                EntityRecord::new(Some(i64::from(service.id)))
                    .with_field("title", FieldValue::Text(service.title))
                    .with_field("slug", FieldValue::Text(service.slug))
                    .with_field("short_desc", FieldValue::Text(service.short_desc))
                    .with_field("description", FieldValue::Text(service.description))
                    .with_field("location", FieldValue::Text(service.location))
                    .with_field("youtube_url", FieldValue::Text(service.youtube_url))
                    .with_field("price_adult", FieldValue::Decimal(service.price_adult))
                    .with_field("price_child", FieldValue::optional_decimal(service.price_child))
                    .with_field("price_extra", FieldValue::optional_decimal(service.price_extra))
                    .with_field("cover", FieldValue::optional_text(service.cover))
                    .with_field("is_active", FieldValue::Boolean(service.is_active))
                    .with_field("meta_title", FieldValue::Text(service.meta_title))
                    .with_field("meta_desc", FieldValue::Text(service.meta_desc))
                    .with_field("created_at", FieldValue::Timestamp(service.created_at))
                    .with_field("updated_at", FieldValue::Timestamp(service.updated_at))
                    .with_relation("categories", categories)
                    .with_relation("tags", tags)
            })
            .collect())
    }

    /// Stored id → slug for collections with a natural key
    pub async fn natural_keys(&self, collection: Collection) -> BackupResult<HashMap<i64, String>> {
        let pairs: Vec<(String, i32)> = self.slugs(collection).await?;
        Ok(pairs
            .into_iter()
            .map(|(slug, id)| (i64::from(id), slug))
            .collect())
    }

    /// Slug → stored id for collections with a natural key
    pub async fn slugs(&self, collection: Collection) -> BackupResult<Vec<(String, i32)>> {
        let pairs: Vec<(String, i32)> = match collection {
            Collection::Categories => slug_map!(self.db, categories),
            Collection::TourCategories => slug_map!(self.db, tour_categories),
            Collection::ServiceCategories => slug_map!(self.db, service_categories),
            Collection::Tags => slug_map!(self.db, tags),
            Collection::Tours => slug_map!(self.db, tours),
            Collection::Services => slug_map!(self.db, services),
            Collection::News => slug_map!(self.db, news_posts),
            Collection::Blog => slug_map!(self.db, blog_posts),
            Collection::Reviews | Collection::Prices | Collection::SiteSettings => Vec::new(),
        };
        Ok(pairs)
    }

    pub async fn count(&self, collection: Collection) -> BackupResult<u64> {
        let count = match collection {
            Collection::Categories => categories::Entity::find().count(self.db).await?,
            Collection::TourCategories => tour_categories::Entity::find().count(self.db).await?,
            Collection::ServiceCategories => {
                service_categories::Entity::find().count(self.db).await?
            }
            Collection::Tags => tags::Entity::find().count(self.db).await?,
            Collection::Tours => tours::Entity::find().count(self.db).await?,
            Collection::Services => services::Entity::find().count(self.db).await?,
            Collection::Reviews => reviews::Entity::find().count(self.db).await?,
            Collection::News => news_posts::Entity::find().count(self.db).await?,
            Collection::Blog => blog_posts::Entity::find().count(self.db).await?,
            Collection::Prices => price_pdfs::Entity::find().count(self.db).await?,
            Collection::SiteSettings => site_settings::Entity::find().count(self.db).await?,
        };
        Ok(count)
    }

    pub async fn load_settings(&self) -> BackupResult<Option<Fields>> {
        let settings = site_settings::Entity::find_by_id(site_settings::SINGLETON_ID)
            .one(self.db)
            .await?;
        Ok(settings.map(|settings| {
            Fields::new()
                .with("site_name", FieldValue::Text(settings.site_name))
                .with("phone", FieldValue::Text(settings.phone))
                .with("phone_alt", FieldValue::Text(settings.phone_alt))
                .with("email", FieldValue::Text(settings.email))
                .with("address", FieldValue::Text(settings.address))
                .with("whatsapp", FieldValue::Text(settings.whatsapp))
                .with("telegram", FieldValue::Text(settings.telegram))
                .with("instagram", FieldValue::Text(settings.instagram))
                .with("about_short", FieldValue::Text(settings.about_short))
        }))
    }

    // ----- Writing -----

    /// Delete every row of the given collections plus the collections that
    /// depend on them. Returns the purged collections in deletion order.
    pub async fn purge(&self, collections: &BTreeSet<Collection>) -> BackupResult<Vec<Collection>> {
        let mut closure = collections.clone();
        for collection in collections {
            closure.extend(collection.dependents().iter().copied());
        }

        let mut purged = Vec::new();
        for collection in PURGE_ORDER {
            if !closure.contains(&collection) {
                continue;
            }
            let deleted = match collection {
                Collection::Prices => price_pdfs::Entity::delete_many().exec(self.db).await?,
                Collection::Blog => blog_posts::Entity::delete_many().exec(self.db).await?,
                Collection::News => news_posts::Entity::delete_many().exec(self.db).await?,
                Collection::Reviews => reviews::Entity::delete_many().exec(self.db).await?,
                Collection::Services => {
                    service_tags::Entity::delete_many().exec(self.db).await?;
                    service_category_links::Entity::delete_many().exec(self.db).await?;
                    services::Entity::delete_many().exec(self.db).await?
                }
                Collection::Tours => {
                    tour_tags::Entity::delete_many().exec(self.db).await?;
                    tour_category_links::Entity::delete_many().exec(self.db).await?;
                    tours::Entity::delete_many().exec(self.db).await?
                }
                Collection::ServiceCategories => {
                    service_category_links::Entity::delete_many().exec(self.db).await?;
                    service_categories::Entity::delete_many().exec(self.db).await?
                }
                Collection::TourCategories => {
                    tour_category_links::Entity::delete_many().exec(self.db).await?;
                    tour_categories::Entity::delete_many().exec(self.db).await?
                }
                Collection::Tags => {
                    tour_tags::Entity::delete_many().exec(self.db).await?;
                    service_tags::Entity::delete_many().exec(self.db).await?;
                    tags::Entity::delete_many().exec(self.db).await?
                }
                Collection::Categories => categories::Entity::delete_many().exec(self.db).await?,
                Collection::SiteSettings => continue,
            };
            debug!("Purged {} rows from {}", deleted.rows_affected, collection);
            purged.push(collection);
        }
        Ok(purged)
    }

    /// Insert or update a taxonomy term by slug. Returns the stored id.
    pub async fn upsert_term(
        &self,
        collection: Collection,
        slug: &str,
        name: String,
        parent_id: Option<i32>,
    ) -> BackupResult<i32> {
        let id = match collection {
            Collection::Categories => upsert_term!(self.db, categories, slug, name, parent_id),
            Collection::TourCategories => {
                upsert_term!(self.db, tour_categories, slug, name, parent_id)
            }
            Collection::ServiceCategories => {
                upsert_term!(self.db, service_categories, slug, name, parent_id)
            }
            Collection::Tags => {
                let existing = tags::Entity::find()
                    .filter(tags::Column::Slug.eq(slug))
                    .one(self.db)
                    .await?;
                let model = match existing {
                    Some(model) => {
                        let mut active: tags::ActiveModel = model.into();
                        active.name = Set(name);
                        active.update(self.db).await?
                    }
                    None => {
                        tags::ActiveModel {
                            id: NotSet,
                            name: Set(name),
                            slug: Set(slug.to_string()),
                        }
                        .insert(self.db)
                        .await?
                    }
                };
                model.id
            }
            other => {
                return Err(BackupError::validation(format!(
                    "{} is not a taxonomy collection",
                    other
                )))
            }
        };
        Ok(id)
    }

    /// Insert or update a tour by slug and replace its links.
    pub async fn upsert_tour(
        &self,
        slug: &str,
        record: &EntityRecord,
        category_id: i32,
        categories: &[i32],
        tags: &[i32],
    ) -> BackupResult<i32> {
        let fields = &record.fields;
        let now = Utc::now();
        let existing = tours::Entity::find()
            .filter(tours::Column::Slug.eq(slug))
            .one(self.db)
            .await?;

        let mut active = match existing {
            Some(model) => tours::ActiveModel::from(model),
            None => tours::ActiveModel {
                id: NotSet,
                slug: Set(slug.to_string()),
                created_at: Set(now),
                ..Default::default()
            },
        };
        active.category_id = Set(category_id);
        active.title = Set(fields.text_or_default("title"));
        active.short_desc = Set(fields.text_or_default("short_desc"));
        active.description = Set(fields.text_or_default("description"));
        active.duration = Set(fields.text_or_default("duration"));
        active.location = Set(fields.text_or_default("location"));
        active.youtube_url = Set(fields.text_or_default("youtube_url"));
        active.price_adult = Set(required_decimal(Collection::Tours, fields, "price_adult")?);
        active.price_child = Set(fields.decimal("price_child"));
        active.price_extra = Set(fields.decimal("price_extra"));
        active.price_old_adult = Set(fields.decimal("price_old_adult"));
        active.price_old_child = Set(fields.decimal("price_old_child"));
        active.rating = Set(fields.decimal("rating"));
        active.reviews_count = Set(small_integer(Collection::Tours, fields, "reviews_count")?);
        active.is_popular = Set(fields.boolean("is_popular").unwrap_or(false));
        active.is_active = Set(fields.boolean("is_active").unwrap_or(true));
        active.cover = Set(fields.non_empty_text("cover"));
        active.meta_title = Set(fields.text_or_default("meta_title"));
        active.meta_desc = Set(fields.text_or_default("meta_desc"));
        active.updated_at = Set(now);

        let tour = active.save(self.db).await?;
        let tour_id = stored_id(tour.id, Collection::Tours, slug)?;

        tour_category_links::Entity::delete_many()
            .filter(tour_category_links::Column::TourId.eq(tour_id))
            .exec(self.db)
            .await?;
        if !categories.is_empty() {
            tour_category_links::Entity::insert_many(categories.iter().map(|category_id| {
                tour_category_links::ActiveModel {
                    tour_id: Set(tour_id),
                    tour_category_id: Set(*category_id),
                }
            }))
            .exec_without_returning(self.db)
            .await?;
        }

        tour_tags::Entity::delete_many()
            .filter(tour_tags::Column::TourId.eq(tour_id))
            .exec(self.db)
            .await?;
        if !tags.is_empty() {
            tour_tags::Entity::insert_many(tags.iter().map(|tag_id| tour_tags::ActiveModel {
                tour_id: Set(tour_id),
                tag_id: Set(*tag_id),
            }))
            .exec_without_returning(self.db)
            .await?;
        }

        Ok(tour_id)
    }

    /// Insert or update a service by slug and replace its links.
    pub async fn upsert_service(
        &self,
        slug: &str,
        record: &EntityRecord,
        categories: &[i32],
        tags: &[i32],
    ) -> BackupResult<i32> {
        let fields = &record.fields;
        let now = Utc::now();
        let existing = services::Entity::find()
            .filter(services::Column::Slug.eq(slug))
            .one(self.db)
            .await?;

        let mut active = match existing {
            Some(model) => services::ActiveModel::from(model),
            None => services::ActiveModel {
                id: NotSet,
                slug: Set(slug.to_string()),
                created_at: Set(now),
                ..Default::default()
            },
        };
        active.title = Set(fields.text_or_default("title"));
        active.short_desc = Set(fields.text_or_default("short_desc"));
        active.description = Set(fields.text_or_default("description"));
        active.location = Set(fields.text_or_default("location"));
        active.youtube_url = Set(fields.text_or_default("youtube_url"));
        active.price_adult = Set(required_decimal(Collection::Services, fields, "price_adult")?);
        active.price_child = Set(fields.decimal("price_child"));
        active.price_extra = Set(fields.decimal("price_extra"));
        active.cover = Set(fields.non_empty_text("cover"));
        active.is_active = Set(fields.boolean("is_active").unwrap_or(true));
        active.meta_title = Set(fields.text_or_default("meta_title"));
        active.meta_desc = Set(fields.text_or_default("meta_desc"));
        active.updated_at = Set(now);

        let service = active.save(self.db).await?;
        let service_id = stored_id(service.id, Collection::Services, slug)?;

        service_category_links::Entity::delete_many()
            .filter(service_category_links::Column::ServiceId.eq(service_id))
            .exec(self.db)
            .await?;
        if !categories.is_empty() {
            service_category_links::Entity::insert_many(categories.iter().map(|category_id| {
                service_category_links::ActiveModel {
                    service_id: Set(service_id),
                    service_category_id: Set(*category_id),
                }
            }))
            .exec_without_returning(self.db)
            .await?;
        }

        service_tags::Entity::delete_many()
            .filter(service_tags::Column::ServiceId.eq(service_id))
            .exec(self.db)
            .await?;
        if !tags.is_empty() {
            service_tags::Entity::insert_many(tags.iter().map(|tag_id| {
                service_tags::ActiveModel {
                    service_id: Set(service_id),
                    tag_id: Set(*tag_id),
                }
            }))
            .exec_without_returning(self.db)
            .await?;
        }

        Ok(service_id)
    }

    /// Reviews are append-only; a stored `created_at` is kept.
    pub async fn insert_review(&self, record: &EntityRecord) -> BackupResult<i32> {
        let fields = &record.fields;
        let review = reviews::ActiveModel {
            id: NotSet,
            name: Set(fields.text_or_default("name")),
            email: Set(fields.text_or_default("email")),
            message: Set(fields.text_or_default("message")),
            is_approved: Set(fields.boolean("is_approved").unwrap_or(false)),
            image: Set(fields.non_empty_text("image")),
            created_at: Set(fields.timestamp("created_at").unwrap_or_else(Utc::now)),
        }
        .insert(self.db)
        .await?;
        Ok(review.id)
    }

    /// News posts keep their publication date on update; new posts get now.
    pub async fn upsert_news(&self, slug: &str, record: &EntityRecord) -> BackupResult<i32> {
        let fields = &record.fields;
        let existing = news_posts::Entity::find()
            .filter(news_posts::Column::Slug.eq(slug))
            .one(self.db)
            .await?;

        let mut active = match existing {
            Some(model) => news_posts::ActiveModel::from(model),
            None => news_posts::ActiveModel {
                id: NotSet,
                slug: Set(slug.to_string()),
                pub_date: Set(Utc::now()),
                ..Default::default()
            },
        };
        active.title = Set(fields.text_or_default("title"));
        active.content = Set(fields.text_or_default("content"));
        active.is_published = Set(fields.boolean("is_published").unwrap_or(false));
        active.cover = Set(fields.non_empty_text("cover"));

        let post = active.save(self.db).await?;
        stored_id(post.id, Collection::News, slug)
    }

    pub async fn upsert_blog(&self, slug: &str, record: &EntityRecord) -> BackupResult<i32> {
        let fields = &record.fields;
        let existing = blog_posts::Entity::find()
            .filter(blog_posts::Column::Slug.eq(slug))
            .one(self.db)
            .await?;

        let mut active = match existing {
            Some(model) => blog_posts::ActiveModel::from(model),
            None => blog_posts::ActiveModel {
                id: NotSet,
                slug: Set(slug.to_string()),
                pub_date: Set(Utc::now()),
                ..Default::default()
            },
        };
        active.title = Set(fields.text_or_default("title"));
        active.content = Set(fields.text_or_default("content"));
        active.is_published = Set(fields.boolean("is_published").unwrap_or(false));
        active.cover = Set(fields.non_empty_text("cover"));
        active.youtube_url = Set(fields.non_empty_text("youtube_url"));

        let post = active.save(self.db).await?;
        stored_id(post.id, Collection::Blog, slug)
    }

    pub async fn insert_price(&self, record: &EntityRecord) -> BackupResult<i32> {
        let fields = &record.fields;
        let file = fields.non_empty_text("file").ok_or_else(|| {
            BackupError::validation("prices record is missing required field 'file'")
        })?;
        let price = price_pdfs::ActiveModel {
            id: NotSet,
            name: Set(fields.text_or_default("name")),
            file: Set(file),
            is_active: Set(fields.boolean("is_active").unwrap_or(true)),
            uploaded_at: Set(Utc::now()),
        }
        .insert(self.db)
        .await?;
        Ok(price.id)
    }

    /// Overwrite the singleton settings row, creating it when missing.
    pub async fn replace_settings(&self, fields: &Fields) -> BackupResult<()> {
        let existing = site_settings::Entity::find_by_id(site_settings::SINGLETON_ID)
            .one(self.db)
            .await?;

        let mut active = match existing {
            Some(model) => site_settings::ActiveModel::from(model),
            None => site_settings::ActiveModel {
                id: Set(site_settings::SINGLETON_ID),
                ..Default::default()
            },
        };
        active.site_name = Set(fields
            .text("site_name")
            .unwrap_or_else(|| "TravelWorld".to_string()));
        active.phone = Set(fields.text_or_default("phone"));
        active.phone_alt = Set(fields.text_or_default("phone_alt"));
        active.email = Set(fields.text_or_default("email"));
        active.address = Set(fields.text_or_default("address"));
        active.whatsapp = Set(fields.text_or_default("whatsapp"));
        active.telegram = Set(fields.text_or_default("telegram"));
        active.instagram = Set(fields.text_or_default("instagram"));
        active.about_short = Set(fields.text_or_default("about_short"));

        active.save(self.db).await?;
        Ok(())
    }
}

fn stored_id(
    id: sea_orm::ActiveValue<i32>,
    collection: Collection,
    slug: &str,
) -> BackupResult<i32> {
    match id {
        sea_orm::ActiveValue::Set(id) | sea_orm::ActiveValue::Unchanged(id) => Ok(id),
        sea_orm::ActiveValue::NotSet => Err(BackupError::validation(format!(
            "{} '{}' was not stored",
            collection, slug
        ))),
    }
}

fn required_decimal(collection: Collection, fields: &Fields, name: &str) -> BackupResult<String> {
    fields.decimal(name).ok_or_else(|| {
        BackupError::validation(format!(
            "{} record is missing required field '{}'",
            collection, name
        ))
    })
}

fn small_integer(collection: Collection, fields: &Fields, name: &str) -> BackupResult<i32> {
    let value = fields.integer(name).unwrap_or(0);
    i32::try_from(value).map_err(|_| BackupError::TypeMismatch {
        collection: collection.name().to_string(),
        field: name.to_string(),
        expected: "32-bit integer".to_string(),
        found: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_term_upsert_is_idempotent() {
        let db = setup_test_db().await;
        let store = ContentStore::new(&db);

        let first = store
            .upsert_term(Collection::Tags, "family", "Family".to_string(), None)
            .await
            .unwrap();
        let second = store
            .upsert_term(Collection::Tags, "family", "Family trips".to_string(), None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count(Collection::Tags).await.unwrap(), 1);
        let tags = store.list(Collection::Tags).await.unwrap();
        assert_eq!(tags[0].fields.text("name").as_deref(), Some("Family trips"));
    }

    #[tokio::test]
    async fn test_tour_round_trip_through_store() {
        let db = setup_test_db().await;
        let store = ContentStore::new(&db);

        let category = store
            .upsert_term(Collection::Categories, "boat-tours", "Boat tours".to_string(), None)
            .await
            .unwrap();
        let tag = store
            .upsert_term(Collection::Tags, "family", "Family".to_string(), None)
            .await
            .unwrap();

        let record = EntityRecord::new(Some(1))
            .with_field("title", FieldValue::text("Phi Phi"))
            .with_field("price_adult", FieldValue::Decimal("45.00".to_string()))
            .with_field("reviews_count", FieldValue::Integer(3));
        let id = store
            .upsert_tour("phi-phi", &record, category, &[], &[tag])
            .await
            .unwrap();
        let tours = store.list(Collection::Tours).await.unwrap();
        assert_eq!(tours.len(), 1);
        assert_eq!(tours[0].pk, Some(i64::from(id)));
        assert_eq!(
            tours[0].reference("category"),
            Some(&Reference::LegacyId(i64::from(category)))
        );
        assert_eq!(tours[0].relation("tags"), &[Reference::LegacyId(i64::from(tag))]);
        assert_eq!(tours[0].fields.integer("reviews_count"), Some(3));
    }

    #[tokio::test]
    async fn test_purge_follows_dependents() {
        let db = setup_test_db().await;
        let store = ContentStore::new(&db);

        let category = store
            .upsert_term(Collection::Categories, "boat-tours", "Boat tours".to_string(), None)
            .await
            .unwrap();
        let record = EntityRecord::new(None)
            .with_field("title", FieldValue::text("Phi Phi"))
            .with_field("price_adult", FieldValue::Decimal("45".to_string()));
        store
            .upsert_tour("phi-phi", &record, category, &[], &[])
            .await
            .unwrap();

        let purged = store
            .purge(&BTreeSet::from([Collection::Categories]))
            .await
            .unwrap();
        assert_eq!(purged, vec![Collection::Tours, Collection::Categories]);
        assert_eq!(store.count(Collection::Tours).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Categories).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settings_replace_and_load() {
        let db = setup_test_db().await;
        let store = ContentStore::new(&db);
        assert!(store.load_settings().await.unwrap().is_none());

        let fields = Fields::new()
            .with("site_name", FieldValue::text("Andaman Travel"))
            .with("phone", FieldValue::text("+66 1234"));
        store.replace_settings(&fields).await.unwrap();
        store.replace_settings(&fields).await.unwrap();

        let loaded = store.load_settings().await.unwrap().unwrap();
        assert_eq!(loaded.text("site_name").as_deref(), Some("Andaman Travel"));
        assert_eq!(loaded.text("email").as_deref(), Some(""));
        assert_eq!(store.count(Collection::SiteSettings).await.unwrap(), 1);
    }
}

//! Per-collection field manifests
//!
//! Every collection in an archive is described by a fixed list of fields with
//! an explicit value type. The codec encodes and validates records against
//! these manifests; nothing is discovered from the live schema at runtime.

use std::fmt;

/// A collection stored in an archive as `data/<name>.json`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Categories,
    Tags,
    TourCategories,
    ServiceCategories,
    Tours,
    Services,
    Reviews,
    News,
    Blog,
    Prices,
    SiteSettings,
}

/// How records of a collection are matched on restore
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    /// Upserted by slug
    Slug,
    /// Append-only; the source pk is only kept for traceability
    SourcePk,
    /// Exactly one record, replaced wholesale
    Singleton,
}

impl Collection {
    /// Order used by export and, within the dependency constraints, by restore.
    pub const EXPORT_ORDER: [Collection; 11] = [
        Collection::Categories,
        Collection::Tags,
        Collection::TourCategories,
        Collection::ServiceCategories,
        Collection::Tours,
        Collection::Services,
        Collection::Reviews,
        Collection::News,
        Collection::Blog,
        Collection::Prices,
        Collection::SiteSettings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::Tags => "tags",
            Collection::TourCategories => "tour_categories",
            Collection::ServiceCategories => "service_categories",
            Collection::Tours => "tours",
            Collection::Services => "services",
            Collection::Reviews => "reviews",
            Collection::News => "news",
            Collection::Blog => "blog",
            Collection::Prices => "prices",
            Collection::SiteSettings => "site_settings",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::EXPORT_ORDER
            .into_iter()
            .find(|collection| collection.name() == name)
    }

    /// Path of the collection's document inside the archive
    pub fn archive_path(&self) -> String {
        format!("data/{}.json", self.name())
    }

    pub fn identity(&self) -> Identity {
        match self {
            Collection::Reviews | Collection::Prices => Identity::SourcePk,
            Collection::SiteSettings => Identity::Singleton,
            _ => Identity::Slug,
        }
    }

    pub fn is_taxonomy(&self) -> bool {
        matches!(
            self,
            Collection::Categories
                | Collection::Tags
                | Collection::TourCategories
                | Collection::ServiceCategories
        )
    }

    /// Type name used in synthesized `restored-<type>-<pk>` slugs
    pub fn slug_type(&self) -> Option<&'static str> {
        match self {
            Collection::Tours => Some("tour"),
            Collection::Services => Some("service"),
            Collection::News => Some("news"),
            Collection::Blog => Some("blog"),
            _ => None,
        }
    }

    /// Collections whose rows cannot survive a purge of this one.
    ///
    /// Tours hold a required category reference, so purging categories purges
    /// tours. Tag and secondary-category links are cleared with the purged side
    /// and do not remove the linked content.
    pub fn dependents(&self) -> &'static [Collection] {
        match self {
            Collection::Categories => &[Collection::Tours],
            _ => &[],
        }
    }

    pub fn manifest(&self) -> &'static [FieldSpec] {
        match self {
            Collection::Categories => CATEGORY_FIELDS,
            Collection::TourCategories => TOUR_CATEGORY_FIELDS,
            Collection::ServiceCategories => SERVICE_CATEGORY_FIELDS,
            Collection::Tags => TAG_FIELDS,
            Collection::Tours => TOUR_FIELDS,
            Collection::Services => SERVICE_FIELDS,
            Collection::Reviews => REVIEW_FIELDS,
            Collection::News => NEWS_FIELDS,
            Collection::Blog => BLOG_FIELDS,
            Collection::Prices => PRICE_FIELDS,
            Collection::SiteSettings => SITE_SETTINGS_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.manifest().iter().find(|field| field.name == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a scalar value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Boolean,
    /// Canonical string form `-?digits[.digits]`
    Decimal,
    /// RFC 3339
    Timestamp,
    /// Path relative to the media root
    Media,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Decimal => "decimal",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Media => "media",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ValueKind),
    /// Encoded as `<name>_slug` (legacy `<name>_id` is accepted on decode)
    Reference { target: Collection, required: bool },
    /// Encoded under `_m2m.<name>` as a list of natural keys
    MultiReference { target: Collection },
}

/// Value used when a scalar key is absent from a record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultValue {
    /// The key is mandatory (unless the field is nullable)
    Required,
    Text(&'static str),
    Integer(i64),
    Boolean(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: DefaultValue,
    /// Exported for traceability but always assigned by the store on import
    pub server_assigned: bool,
}

impl FieldSpec {
    const fn scalar(name: &'static str, kind: ValueKind, default: DefaultValue) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar(kind),
            nullable: false,
            default,
            server_assigned: false,
        }
    }

    /// Text that defaults to the empty string
    pub const fn text(name: &'static str) -> Self {
        Self::scalar(name, ValueKind::Text, DefaultValue::Text(""))
    }

    pub const fn required_text(name: &'static str) -> Self {
        Self::scalar(name, ValueKind::Text, DefaultValue::Required)
    }

    pub const fn integer(name: &'static str, default: i64) -> Self {
        Self::scalar(name, ValueKind::Integer, DefaultValue::Integer(default))
    }

    pub const fn boolean(name: &'static str, default: bool) -> Self {
        Self::scalar(name, ValueKind::Boolean, DefaultValue::Boolean(default))
    }

    pub const fn decimal(name: &'static str) -> Self {
        Self::scalar(name, ValueKind::Decimal, DefaultValue::Required)
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self::scalar(name, ValueKind::Timestamp, DefaultValue::Required)
    }

    pub const fn media(name: &'static str) -> Self {
        Self::scalar(name, ValueKind::Media, DefaultValue::Required)
    }

    pub const fn reference(name: &'static str, target: Collection, required: bool) -> Self {
        Self {
            name,
            kind: FieldKind::Reference { target, required },
            nullable: !required,
            default: DefaultValue::Required,
            server_assigned: false,
        }
    }

    pub const fn many(name: &'static str, target: Collection) -> Self {
        Self {
            name,
            kind: FieldKind::MultiReference { target },
            nullable: true,
            default: DefaultValue::Required,
            server_assigned: false,
        }
    }

    /// Absent or `null` reads back as null
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn server_assigned(mut self) -> Self {
        self.server_assigned = true;
        self.nullable = true;
        self
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        match self.kind {
            FieldKind::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    /// Archive key holding a reference field
    pub fn slug_key(&self) -> String {
        format!("{}_slug", self.name)
    }

    pub fn legacy_key(&self) -> String {
        format!("{}_id", self.name)
    }
}

const CATEGORY_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name"),
    FieldSpec::text("slug"),
    FieldSpec::reference("parent", Collection::Categories, false),
];

const TOUR_CATEGORY_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name"),
    FieldSpec::text("slug"),
    FieldSpec::reference("parent", Collection::TourCategories, false),
];

const SERVICE_CATEGORY_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name"),
    FieldSpec::text("slug"),
    FieldSpec::reference("parent", Collection::ServiceCategories, false),
];

const TAG_FIELDS: &[FieldSpec] = &[FieldSpec::text("name"), FieldSpec::text("slug")];

const TOUR_FIELDS: &[FieldSpec] = &[
    FieldSpec::reference("category", Collection::Categories, true),
    FieldSpec::required_text("title"),
    FieldSpec::text("slug"),
    FieldSpec::text("short_desc"),
    FieldSpec::text("description"),
    FieldSpec::text("duration"),
    FieldSpec::text("location"),
    FieldSpec::text("youtube_url"),
    FieldSpec::decimal("price_adult"),
    FieldSpec::decimal("price_child").nullable(),
    FieldSpec::decimal("price_extra").nullable(),
    FieldSpec::decimal("price_old_adult").nullable(),
    FieldSpec::decimal("price_old_child").nullable(),
    FieldSpec::decimal("rating").nullable(),
    FieldSpec::integer("reviews_count", 0),
    FieldSpec::boolean("is_popular", false),
    FieldSpec::boolean("is_active", true),
    FieldSpec::media("cover").nullable(),
    FieldSpec::text("meta_title"),
    FieldSpec::text("meta_desc"),
    FieldSpec::timestamp("created_at").server_assigned(),
    FieldSpec::timestamp("updated_at").server_assigned(),
    FieldSpec::many("categories", Collection::TourCategories),
    FieldSpec::many("tags", Collection::Tags),
];

const SERVICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("title"),
    FieldSpec::text("slug"),
    FieldSpec::text("short_desc"),
    FieldSpec::text("description"),
    FieldSpec::text("location"),
    FieldSpec::text("youtube_url"),
    FieldSpec::decimal("price_adult"),
    FieldSpec::decimal("price_child").nullable(),
    FieldSpec::decimal("price_extra").nullable(),
    FieldSpec::media("cover").nullable(),
    FieldSpec::boolean("is_active", true),
    FieldSpec::text("meta_title"),
    FieldSpec::text("meta_desc"),
    FieldSpec::timestamp("created_at").server_assigned(),
    FieldSpec::timestamp("updated_at").server_assigned(),
    FieldSpec::many("categories", Collection::ServiceCategories),
    FieldSpec::many("tags", Collection::Tags),
];

const REVIEW_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("name"),
    FieldSpec::text("email"),
    FieldSpec::text("message"),
    FieldSpec::boolean("is_approved", false),
    FieldSpec::media("image").nullable(),
    FieldSpec::timestamp("created_at").nullable(),
];

const NEWS_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("title"),
    FieldSpec::text("slug"),
    FieldSpec::text("content"),
    FieldSpec::boolean("is_published", false),
    FieldSpec::media("cover").nullable(),
    FieldSpec::timestamp("pub_date").server_assigned(),
];

const BLOG_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("title"),
    FieldSpec::text("slug"),
    FieldSpec::text("content"),
    FieldSpec::boolean("is_published", false),
    FieldSpec::media("cover").nullable(),
    FieldSpec::scalar("youtube_url", ValueKind::Text, DefaultValue::Required).nullable(),
    FieldSpec::timestamp("pub_date").server_assigned(),
];

const PRICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name"),
    FieldSpec::media("file"),
    FieldSpec::boolean("is_active", true),
    FieldSpec::timestamp("uploaded_at").server_assigned(),
];

const SITE_SETTINGS_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("site_name", ValueKind::Text, DefaultValue::Text("TravelWorld")),
    FieldSpec::text("phone"),
    FieldSpec::text("phone_alt"),
    FieldSpec::text("email"),
    FieldSpec::text("address"),
    FieldSpec::text("whatsapp"),
    FieldSpec::text("telegram"),
    FieldSpec::text("instagram"),
    FieldSpec::text("about_short"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::EXPORT_ORDER {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
        assert_eq!(Collection::from_name("users"), None);
        assert_eq!(Collection::News.archive_path(), "data/news.json");
    }

    #[test]
    fn test_identity() {
        assert_eq!(Collection::Tours.identity(), Identity::Slug);
        assert_eq!(Collection::Reviews.identity(), Identity::SourcePk);
        assert_eq!(Collection::SiteSettings.identity(), Identity::Singleton);
    }

    #[test]
    fn test_tour_manifest() {
        let category = Collection::Tours.field("category").unwrap();
        assert_eq!(
            category.kind,
            FieldKind::Reference {
                target: Collection::Categories,
                required: true
            }
        );
        assert_eq!(category.slug_key(), "category_slug");
        assert_eq!(category.legacy_key(), "category_id");

        let price = Collection::Tours.field("price_adult").unwrap();
        assert_eq!(price.value_kind(), Some(ValueKind::Decimal));
        assert!(!price.nullable);

        assert!(Collection::Tours.field("created_at").unwrap().server_assigned);
        assert!(!Collection::Reviews.field("created_at").unwrap().server_assigned);
    }

    #[test]
    fn test_slug_types() {
        assert_eq!(Collection::Tours.slug_type(), Some("tour"));
        assert_eq!(Collection::Blog.slug_type(), Some("blog"));
        assert_eq!(Collection::Tags.slug_type(), None);
    }
}

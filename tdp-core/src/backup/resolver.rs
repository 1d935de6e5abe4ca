//! Natural-key resolution during restore
//!
//! Archives link records by slug. Older archives link by the source pk, which
//! is only meaningful inside the archive that carried it, so every collection's
//! pk → slug map is registered before anything is imported. As records land in
//! the database their new ids are recorded under the same slug.

use std::collections::HashMap;

use tracing::warn;

use super::manifest::Collection;
use super::record::{EntityRecord, Reference};
use crate::errors::{BackupError, BackupResult};

/// A reference that resolved to a stored record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedKey {
    pub slug: String,
    pub id: i32,
}

#[derive(Debug, Default)]
pub struct NaturalKeyResolver {
    source_keys: HashMap<Collection, HashMap<i64, String>>,
    known: HashMap<Collection, HashMap<String, i32>>,
}

impl NaturalKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember which slug a source pk stood for in the archive.
    pub fn register_source(&mut self, collection: Collection, pk: i64, slug: impl Into<String>) {
        self.source_keys
            .entry(collection)
            .or_default()
            .insert(pk, slug.into());
    }

    /// Register every record of a decoded collection by its source pk.
    pub fn register_records(&mut self, collection: Collection, records: &[EntityRecord]) {
        for record in records {
            if let (Some(pk), Ok(slug)) = (record.pk, target_slug(collection, record)) {
                self.register_source(collection, pk, slug);
            }
        }
    }

    /// Record the id a slug received in the target database.
    pub fn record(&mut self, collection: Collection, slug: impl Into<String>, id: i32) {
        self.known
            .entry(collection)
            .or_default()
            .insert(slug.into(), id);
    }

    /// Preload existing records of a collection the archive does not replace.
    pub fn seed<I>(&mut self, collection: Collection, entries: I)
    where
        I: IntoIterator<Item = (String, i32)>,
    {
        let known = self.known.entry(collection).or_default();
        known.extend(entries);
    }

    pub fn lookup(&self, collection: Collection, slug: &str) -> Option<i32> {
        self.known
            .get(&collection)
            .and_then(|known| known.get(slug))
            .copied()
    }

    /// Slug a reference stands for, going through the source pk map for
    /// legacy ids.
    pub fn natural_key(&self, target: Collection, reference: &Reference) -> Option<String> {
        match reference {
            Reference::Slug(slug) => Some(slug.clone()),
            Reference::LegacyId(pk) => self
                .source_keys
                .get(&target)
                .and_then(|keys| keys.get(pk))
                .cloned(),
        }
    }

    /// Resolve a single reference or fail with `UnresolvedReference`.
    pub fn resolve(
        &self,
        owner: Collection,
        field: &str,
        target: Collection,
        reference: &Reference,
    ) -> BackupResult<ResolvedKey> {
        self.natural_key(target, reference)
            .and_then(|slug| self.lookup(target, &slug).map(|id| ResolvedKey { slug, id }))
            .ok_or_else(|| BackupError::unresolved(owner.name(), field, reference.describe()))
    }

    /// Resolve a multi reference, dropping entries that do not resolve.
    pub fn resolve_many(
        &self,
        owner: Collection,
        field: &str,
        target: Collection,
        references: &[Reference],
    ) -> Vec<i32> {
        let mut ids = Vec::with_capacity(references.len());
        for reference in references {
            match self.resolve(owner, field, target, reference) {
                Ok(key) => {
                    if !ids.contains(&key.id) {
                        ids.push(key.id);
                    }
                }
                Err(_) => warn!(
                    "{} {}: dropping unknown {} '{}'",
                    owner,
                    field,
                    target,
                    reference.describe()
                ),
            }
        }
        ids
    }
}

/// `restored-<type>-<pk>` for records that arrive without a slug
pub fn fallback_slug(slug_type: &str, pk: i64) -> String {
    format!("restored-{}-{}", slug_type, pk)
}

/// Natural key a record is stored under.
///
/// Content collections without a slug get the synthesized fallback when a
/// source pk is present; anything else without a slug is rejected.
pub fn target_slug(collection: Collection, record: &EntityRecord) -> BackupResult<String> {
    if let Some(slug) = record.slug() {
        return Ok(slug.trim().to_string());
    }
    match (collection.slug_type(), record.pk) {
        (Some(slug_type), Some(pk)) => Ok(fallback_slug(slug_type, pk)),
        _ => Err(BackupError::validation(format!(
            "{} record {} has no slug",
            collection,
            record
                .pk
                .map(|pk| format!("#{}", pk))
                .unwrap_or_else(|| "without pk".to_string())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::record::FieldValue;

    #[test]
    fn test_resolve_by_slug() {
        let mut resolver = NaturalKeyResolver::new();
        resolver.record(Collection::Categories, "boat-tours", 7);

        let key = resolver
            .resolve(
                Collection::Tours,
                "category",
                Collection::Categories,
                &Reference::slug("boat-tours"),
            )
            .unwrap();
        assert_eq!(key, ResolvedKey { slug: "boat-tours".to_string(), id: 7 });
    }

    #[test]
    fn test_resolve_legacy_id_through_source_map() {
        let mut resolver = NaturalKeyResolver::new();
        resolver.register_source(Collection::Categories, 12, "boat-tours");
        resolver.record(Collection::Categories, "boat-tours", 1);

        let key = resolver
            .resolve(
                Collection::Tours,
                "category",
                Collection::Categories,
                &Reference::LegacyId(12),
            )
            .unwrap();
        assert_eq!(key.id, 1);
    }

    #[test]
    fn test_unresolved_reference_names_the_key() {
        let resolver = NaturalKeyResolver::new();
        let err = resolver
            .resolve(
                Collection::Tours,
                "category",
                Collection::Categories,
                &Reference::slug("boat-tours"),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing category 'boat-tours' referenced from tours");
    }

    #[test]
    fn test_resolve_many_drops_unknown_and_duplicates() {
        let mut resolver = NaturalKeyResolver::new();
        resolver.seed(Collection::Tags, vec![("family".to_string(), 1), ("sea".to_string(), 2)]);

        let ids = resolver.resolve_many(
            Collection::Tours,
            "tags",
            Collection::Tags,
            &[
                Reference::slug("family"),
                Reference::slug("stale"),
                Reference::slug("sea"),
                Reference::slug("family"),
            ],
        );
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_target_slug_fallback() {
        let record = EntityRecord::new(Some(4)).with_field("title", FieldValue::text("No slug"));
        assert_eq!(
            target_slug(Collection::News, &record).unwrap(),
            "restored-news-4"
        );
        assert!(target_slug(Collection::Tags, &record).is_err());
        assert!(target_slug(Collection::Tours, &EntityRecord::new(None)).is_err());
    }
}

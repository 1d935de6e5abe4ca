use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// A scalar field value after decoding against its manifest type
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
    Decimal(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn optional_text(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }

    pub fn optional_decimal(value: Option<String>) -> Self {
        value.map(FieldValue::Decimal).unwrap_or(FieldValue::Null)
    }
}

/// Ordered scalar fields of one record, keyed by manifest name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields(IndexMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text or media value; `None` when null or absent
    pub fn text(&self, name: &str) -> Option<String> {
        match self.0.get(name) {
            Some(FieldValue::Text(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn text_or_default(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }

    /// Non-empty text only
    pub fn non_empty_text(&self, name: &str) -> Option<String> {
        self.text(name).filter(|value| !value.trim().is_empty())
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(FieldValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(FieldValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn decimal(&self, name: &str) -> Option<String> {
        match self.0.get(name) {
            Some(FieldValue::Decimal(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.0.get(name) {
            Some(FieldValue::Timestamp(value)) => Some(*value),
            _ => None,
        }
    }
}

/// A link to another record, by natural key or by legacy source id
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    Slug(String),
    /// Source-side pk; only meaningful through the restore's pk → slug map
    LegacyId(i64),
}

impl Reference {
    pub fn slug(value: impl Into<String>) -> Self {
        Reference::Slug(value.into())
    }

    /// Human form used in error messages
    pub fn describe(&self) -> String {
        match self {
            Reference::Slug(slug) => slug.clone(),
            Reference::LegacyId(id) => format!("#{}", id),
        }
    }
}

/// One record of a collection
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityRecord {
    /// Source-side identifier, advisory only
    pub pk: Option<i64>,
    pub fields: Fields,
    /// Single references keyed by field name; absent or null references are omitted
    pub references: IndexMap<String, Reference>,
    /// Multi references keyed by relation name
    pub relations: IndexMap<String, Vec<Reference>>,
}

impl EntityRecord {
    pub fn new(pk: Option<i64>) -> Self {
        Self {
            pk,
            ..Self::default()
        }
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.set(name, value);
        self
    }

    pub fn with_reference(mut self, name: &str, reference: Reference) -> Self {
        self.references.insert(name.to_string(), reference);
        self
    }

    pub fn with_relation(mut self, name: &str, references: Vec<Reference>) -> Self {
        self.relations.insert(name.to_string(), references);
        self
    }

    pub fn slug(&self) -> Option<String> {
        self.fields.non_empty_text("slug")
    }

    pub fn reference(&self, name: &str) -> Option<&Reference> {
        self.references.get(name)
    }

    pub fn relation(&self, name: &str) -> &[Reference] {
        self.relations
            .get(name)
            .map(|references| references.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let fields = Fields::new()
            .with("title", FieldValue::text("Phi Phi"))
            .with("price_adult", FieldValue::Decimal("45.00".to_string()))
            .with("cover", FieldValue::Null)
            .with("is_active", FieldValue::Boolean(true));

        assert_eq!(fields.text("title").as_deref(), Some("Phi Phi"));
        assert_eq!(fields.decimal("price_adult").as_deref(), Some("45.00"));
        assert_eq!(fields.text("cover"), None);
        assert_eq!(fields.boolean("is_active"), Some(true));
        assert_eq!(fields.text("price_adult"), None);
    }

    #[test]
    fn test_record_slug_ignores_blank() {
        let record = EntityRecord::new(Some(3)).with_field("slug", FieldValue::text("  "));
        assert_eq!(record.slug(), None);
        assert!(record.relation("tags").is_empty());
    }

    #[test]
    fn test_reference_describe() {
        assert_eq!(Reference::slug("family").describe(), "family");
        assert_eq!(Reference::LegacyId(7).describe(), "#7");
    }
}

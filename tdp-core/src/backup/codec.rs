//! Archive codec
//!
//! Layout of a backup archive:
//!
//! ```text
//! data/<collection>.json   JSON array of records (site_settings: one object)
//! media/<relative path>    files mirrored from the media root
//! ```
//!
//! Records are encoded against the collection manifest: scalars verbatim,
//! single references as `<field>_slug`, multi references under `_m2m`, and the
//! source `pk` for traceability.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};
use tempfile::TempDir;
use tracing::{debug, warn};
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use super::manifest::{Collection, DefaultValue, FieldKind, FieldSpec, ValueKind};
use super::record::{EntityRecord, FieldValue, Fields, Reference};
use crate::errors::{BackupError, BackupResult};

pub const DATA_DIR: &str = "data";
pub const MEDIA_DIR: &str = "media";
pub const PK_KEY: &str = "pk";
pub const M2M_KEY: &str = "_m2m";

static DECIMAL_PATTERN: OnceCell<Regex> = OnceCell::new();

fn decimal_pattern() -> BackupResult<&'static Regex> {
    DECIMAL_PATTERN
        .get_or_try_init(|| Regex::new(r"^-?\d+(\.\d+)?$"))
        .map_err(|e| BackupError::InvalidConfiguration(format!("decimal pattern: {}", e)))
}

// ----- Archive naming -----

/// `<PREFIX>_<YYYYMMDD>.zip`
pub fn archive_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.zip", prefix, date.format("%Y%m%d"))
}

/// Reject anything that is not `<PREFIX>_<YYYYMMDD>.zip` with a real date.
pub fn validate_archive_name(name: &str, prefix: &str) -> BackupResult<NaiveDate> {
    let pattern = Regex::new(&format!(r"^{}_(\d{{8}})\.zip$", regex::escape(prefix)))
        .map_err(|e| BackupError::InvalidConfiguration(format!("archive name pattern: {}", e)))?;

    pattern
        .captures(name)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| NaiveDate::parse_from_str(digits.as_str(), "%Y%m%d").ok())
        .ok_or_else(|| BackupError::InvalidArchiveName(name.to_string()))
}

// ----- Record encoding -----

/// Encode a collection as the JSON array stored in `data/<name>.json`.
///
/// `natural_key` maps a stored id of the target collection to its slug. A
/// reference it cannot map falls back to the legacy `<field>_id` form; an
/// unmappable multi-reference entry is dropped.
pub fn encode_collection<F>(
    collection: Collection,
    records: &[EntityRecord],
    natural_key: F,
) -> BackupResult<Value>
where
    F: Fn(Collection, i64) -> Option<String>,
{
    records
        .iter()
        .map(|record| encode_record(collection, record, &natural_key).map(Value::Object))
        .collect::<BackupResult<Vec<_>>>()
        .map(Value::Array)
}

fn encode_record<F>(
    collection: Collection,
    record: &EntityRecord,
    natural_key: &F,
) -> BackupResult<Map<String, Value>>
where
    F: Fn(Collection, i64) -> Option<String>,
{
    let mut row = Map::new();
    row.insert(
        PK_KEY.to_string(),
        record.pk.map(Value::from).unwrap_or(Value::Null),
    );

    let mut m2m = Map::new();
    for field in collection.manifest() {
        match field.kind {
            FieldKind::Scalar(kind) => {
                let value = record.fields.get(field.name).unwrap_or(&FieldValue::Null);
                row.insert(
                    field.name.to_string(),
                    encode_scalar(collection, field, kind, value)?,
                );
            }
            FieldKind::Reference { target, .. } => match record.reference(field.name) {
                Some(Reference::Slug(slug)) => {
                    row.insert(field.slug_key(), Value::String(slug.clone()));
                }
                Some(Reference::LegacyId(id)) => match natural_key(target, *id) {
                    Some(slug) => {
                        row.insert(field.slug_key(), Value::String(slug));
                    }
                    None => {
                        warn!(
                            "{} {}: no natural key for {} #{}, keeping legacy id",
                            collection, field.name, target, id
                        );
                        row.insert(field.legacy_key(), Value::from(*id));
                    }
                },
                None => {
                    row.insert(field.slug_key(), Value::Null);
                }
            },
            FieldKind::MultiReference { target } => {
                let keys: Vec<Value> = record
                    .relation(field.name)
                    .iter()
                    .filter_map(|reference| match reference {
                        Reference::Slug(slug) => Some(slug.clone()),
                        Reference::LegacyId(id) => {
                            let slug = natural_key(target, *id);
                            if slug.is_none() {
                                warn!(
                                    "{} {}: dropping {} #{} without natural key",
                                    collection, field.name, target, id
                                );
                            }
                            slug
                        }
                    })
                    .map(Value::String)
                    .collect();
                m2m.insert(field.name.to_string(), Value::Array(keys));
            }
        }
    }

    if !m2m.is_empty() {
        row.insert(M2M_KEY.to_string(), Value::Object(m2m));
    }
    Ok(row)
}

fn encode_scalar(
    collection: Collection,
    field: &FieldSpec,
    kind: ValueKind,
    value: &FieldValue,
) -> BackupResult<Value> {
    let mismatch = || BackupError::TypeMismatch {
        collection: collection.name().to_string(),
        field: field.name.to_string(),
        expected: kind.as_str().to_string(),
        found: value.type_name().to_string(),
    };

    match (kind, value) {
        (_, FieldValue::Null) if field.nullable => Ok(Value::Null),
        (ValueKind::Text | ValueKind::Media, FieldValue::Text(text)) => {
            Ok(Value::String(text.clone()))
        }
        (ValueKind::Integer, FieldValue::Integer(number)) => Ok(Value::from(*number)),
        (ValueKind::Boolean, FieldValue::Boolean(flag)) => Ok(Value::Bool(*flag)),
        (ValueKind::Decimal, FieldValue::Decimal(decimal)) => {
            if decimal_pattern()?.is_match(decimal) {
                Ok(Value::String(decimal.clone()))
            } else {
                Err(mismatch())
            }
        }
        (ValueKind::Timestamp, FieldValue::Timestamp(at)) => {
            Ok(Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        }
        _ => Err(mismatch()),
    }
}

/// Encode the singleton settings record; `None` becomes `{}`.
pub fn encode_singleton(collection: Collection, fields: Option<&Fields>) -> BackupResult<Value> {
    let mut object = Map::new();
    if let Some(fields) = fields {
        for field in collection.manifest() {
            if let FieldKind::Scalar(kind) = field.kind {
                let value = fields.get(field.name).unwrap_or(&FieldValue::Null);
                object.insert(
                    field.name.to_string(),
                    encode_scalar(collection, field, kind, value)?,
                );
            }
        }
    }
    Ok(Value::Object(object))
}

// ----- Record decoding -----

/// Decode `data/<name>.json`. An absent document is an empty collection.
pub fn decode_collection(
    collection: Collection,
    document: Option<&[u8]>,
) -> BackupResult<Vec<EntityRecord>> {
    let Some(bytes) = document else {
        return Ok(Vec::new());
    };

    let parsed: Value = serde_json::from_slice(bytes).map_err(|e| {
        BackupError::validation(format!("{} is not valid JSON: {}", collection.archive_path(), e))
    })?;

    let Value::Array(items) = parsed else {
        return Err(BackupError::validation(format!(
            "{} must contain a JSON array",
            collection.archive_path()
        )));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(object) => decode_record(collection, object),
            other => Err(BackupError::validation(format!(
                "{} entry {} is a {}, expected an object",
                collection.archive_path(),
                index,
                json_type(other)
            ))),
        })
        .collect()
}

/// Decode the singleton settings document. Absent or `{}` yields `None`,
/// which leaves the stored settings untouched.
pub fn decode_singleton(
    collection: Collection,
    document: Option<&[u8]>,
) -> BackupResult<Option<Fields>> {
    let Some(bytes) = document else {
        return Ok(None);
    };

    let parsed: Value = serde_json::from_slice(bytes).map_err(|e| {
        BackupError::validation(format!("{} is not valid JSON: {}", collection.archive_path(), e))
    })?;

    match parsed {
        Value::Object(object) if object.is_empty() => Ok(None),
        Value::Object(object) => {
            let mut fields = Fields::new();
            for field in collection.manifest() {
                if let FieldKind::Scalar(kind) = field.kind {
                    let value = decode_scalar(collection, field, kind, object.get(field.name))?;
                    fields.set(field.name, value);
                }
            }
            Ok(Some(fields))
        }
        other => Err(BackupError::validation(format!(
            "{} must contain a JSON object, found {}",
            collection.archive_path(),
            json_type(&other)
        ))),
    }
}

fn decode_record(collection: Collection, object: &Map<String, Value>) -> BackupResult<EntityRecord> {
    let pk = match object.get(PK_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) if number.as_i64().is_some() => number.as_i64(),
        Some(other) => return Err(type_mismatch(collection, PK_KEY, "integer", other)),
    };

    let mut record = EntityRecord::new(pk);
    let mut known_keys: Vec<String> = vec![PK_KEY.to_string(), M2M_KEY.to_string()];
    let m2m = match object.get(M2M_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::Object(m2m)) => Some(m2m),
        Some(other) => return Err(type_mismatch(collection, M2M_KEY, "object", other)),
    };

    for field in collection.manifest() {
        match field.kind {
            FieldKind::Scalar(kind) => {
                known_keys.push(field.name.to_string());
                if field.server_assigned {
                    continue;
                }
                let value = decode_scalar(collection, field, kind, object.get(field.name))?;
                record.fields.set(field.name, value);
            }
            FieldKind::Reference { .. } => {
                let slug_key = field.slug_key();
                let legacy_key = field.legacy_key();
                if let Some(reference) =
                    decode_reference(collection, object, &slug_key, &legacy_key)?
                {
                    record.references.insert(field.name.to_string(), reference);
                }
                known_keys.push(slug_key);
                known_keys.push(legacy_key);
                known_keys.push(field.name.to_string());
            }
            FieldKind::MultiReference { .. } => {
                if let Some(entries) = m2m.and_then(|m2m| m2m.get(field.name)) {
                    let references = decode_relation(collection, field.name, entries)?;
                    record.relations.insert(field.name.to_string(), references);
                }
            }
        }
    }

    for key in object.keys() {
        if !known_keys.iter().any(|known| known == key) {
            debug!("{}: ignoring unknown key '{}'", collection, key);
        }
    }

    Ok(record)
}

/// `<field>_slug` wins over the legacy `<field>_id`.
fn decode_reference(
    collection: Collection,
    object: &Map<String, Value>,
    slug_key: &str,
    legacy_key: &str,
) -> BackupResult<Option<Reference>> {
    match object.get(slug_key) {
        Some(Value::String(slug)) if !slug.trim().is_empty() => {
            return Ok(Some(Reference::Slug(slug.trim().to_string())));
        }
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(other) => return Err(type_mismatch(collection, slug_key, "text", other)),
    }

    match object.get(legacy_key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(|id| Some(Reference::LegacyId(id)))
            .ok_or_else(|| type_mismatch(collection, legacy_key, "integer", &Value::Number(number.clone()))),
        Some(other) => Err(type_mismatch(collection, legacy_key, "integer", other)),
    }
}

fn decode_relation(
    collection: Collection,
    name: &str,
    entries: &Value,
) -> BackupResult<Vec<Reference>> {
    let items = match entries {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => return Err(type_mismatch(collection, name, "array", other)),
    };

    let mut references = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(slug) if slug.trim().is_empty() => {}
            Value::String(slug) => references.push(Reference::Slug(slug.trim().to_string())),
            Value::Number(number) if number.as_i64().is_some() => {
                if let Some(id) = number.as_i64() {
                    references.push(Reference::LegacyId(id));
                }
            }
            Value::Null => {}
            other => return Err(type_mismatch(collection, name, "natural key", other)),
        }
    }
    Ok(references)
}

fn decode_scalar(
    collection: Collection,
    field: &FieldSpec,
    kind: ValueKind,
    raw: Option<&Value>,
) -> BackupResult<FieldValue> {
    let value = match raw {
        None => return default_value(collection, field, kind, None),
        Some(Value::Null) if field.nullable => return Ok(FieldValue::Null),
        Some(Value::Null) => return default_value(collection, field, kind, Some(&Value::Null)),
        Some(value) => value,
    };

    match (kind, value) {
        (ValueKind::Text, Value::String(text)) => Ok(FieldValue::Text(text.clone())),
        (ValueKind::Media, Value::String(path)) if path.trim().is_empty() => {
            default_value(collection, field, kind, Some(value))
        }
        (ValueKind::Media, Value::String(path)) => {
            let relative = sanitize_relative_path(path).map_err(|_| {
                BackupError::validation(format!(
                    "{} {}: media path '{}' must be relative to the media root",
                    collection, field.name, path
                ))
            })?;
            Ok(FieldValue::Text(relative.to_string_lossy().replace('\\', "/")))
        }
        (ValueKind::Integer, Value::Number(number)) if number.as_i64().is_some() => {
            Ok(number.as_i64().map(FieldValue::Integer).unwrap_or(FieldValue::Null))
        }
        (ValueKind::Boolean, Value::Bool(flag)) => Ok(FieldValue::Boolean(*flag)),
        (ValueKind::Decimal, Value::String(text)) => {
            normalize_decimal(text.trim()).ok_or_else(|| type_mismatch(collection, field.name, "decimal", value))
        }
        (ValueKind::Decimal, Value::Number(number)) => normalize_decimal(&number.to_string())
            .ok_or_else(|| type_mismatch(collection, field.name, "decimal", value)),
        (ValueKind::Timestamp, Value::String(text)) => parse_timestamp(text)
            .map(FieldValue::Timestamp)
            .ok_or_else(|| type_mismatch(collection, field.name, "timestamp", value)),
        _ => Err(type_mismatch(collection, field.name, kind.as_str(), value)),
    }
}

fn default_value(
    collection: Collection,
    field: &FieldSpec,
    kind: ValueKind,
    found: Option<&Value>,
) -> BackupResult<FieldValue> {
    match field.default {
        DefaultValue::Text(text) => Ok(FieldValue::Text(text.to_string())),
        DefaultValue::Integer(number) => Ok(FieldValue::Integer(number)),
        DefaultValue::Boolean(flag) => Ok(FieldValue::Boolean(flag)),
        DefaultValue::Required if field.nullable => Ok(FieldValue::Null),
        DefaultValue::Required => match found {
            Some(value) if !value.is_null() && !matches!(value, Value::String(_)) => {
                Err(type_mismatch(collection, field.name, kind.as_str(), value))
            }
            Some(Value::Null) => Err(type_mismatch(collection, field.name, kind.as_str(), &Value::Null)),
            _ => Err(BackupError::validation(format!(
                "{} record is missing required field '{}'",
                collection, field.name
            ))),
        },
    }
}

fn normalize_decimal(text: &str) -> Option<FieldValue> {
    let pattern = decimal_pattern().ok()?;
    pattern
        .is_match(text)
        .then(|| FieldValue::Decimal(text.to_string()))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text.trim()) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_mismatch(collection: Collection, field: &str, expected: &str, found: &Value) -> BackupError {
    BackupError::TypeMismatch {
        collection: collection.name().to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        found: json_type(found).to_string(),
    }
}

// ----- Path safety -----

/// Relative path with no parent, root or prefix components.
pub fn sanitize_relative_path(path: &str) -> BackupResult<PathBuf> {
    let candidate = Path::new(path);
    if candidate.is_absolute()
        || candidate.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
    {
        return Err(BackupError::PathTraversal(path.to_string()));
    }

    let cleaned: PathBuf = candidate
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect();
    if cleaned.as_os_str().is_empty() {
        return Err(BackupError::PathTraversal(path.to_string()));
    }
    Ok(cleaned)
}

// ----- Writing -----

/// In-memory zip builder for one export
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    pub fn write_bytes(&mut self, path: &str, bytes: &[u8]) -> BackupResult<()> {
        self.zip.start_file(path, self.options)?;
        self.zip.write_all(bytes)?;
        Ok(())
    }

    /// Pretty-printed JSON document at `data/<collection>.json`
    pub fn write_collection(&mut self, collection: Collection, document: &Value) -> BackupResult<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        self.write_bytes(&collection.archive_path(), &bytes)
    }

    /// Add every regular file under `media_root` as `media/<relative path>`.
    /// A missing media root contributes nothing.
    pub fn write_media(&mut self, media_root: &Path) -> BackupResult<usize> {
        if !media_root.is_dir() {
            debug!("Media root {:?} does not exist, skipping media", media_root);
            return Ok(0);
        }

        let files = collect_files(media_root)?;
        for relative in &files {
            let mut source = fs::File::open(media_root.join(relative))?;
            let name = format!(
                "{}/{}",
                MEDIA_DIR,
                relative.to_string_lossy().replace('\\', "/")
            );
            self.zip.start_file(name, self.options)?;
            std::io::copy(&mut source, &mut self.zip)?;
        }
        Ok(files.len())
    }

    pub fn finish(mut self) -> BackupResult<Vec<u8>> {
        let cursor = self.zip.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Regular files under `root`, relative and sorted. Symlinks are not followed.
pub fn collect_files(root: &Path) -> BackupResult<Vec<PathBuf>> {
    fn walk(dir: &Path, root: &Path, acc: &mut Vec<PathBuf>) -> BackupResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                walk(&path, root, acc)?;
            } else if file_type.is_file() {
                let relative = path.strip_prefix(root).map_err(|e| {
                    BackupError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
                })?;
                acc.push(relative.to_path_buf());
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

// ----- Reading -----

/// An archive expanded into its own temporary directory.
///
/// The directory is removed when the value is dropped.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
}

impl ExtractedArchive {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root().join(MEDIA_DIR)
    }

    fn document_path(&self, collection: Collection) -> PathBuf {
        self.root().join(collection.archive_path())
    }

    pub fn contains(&self, collection: Collection) -> bool {
        self.document_path(collection).is_file()
    }

    pub fn document(&self, collection: Collection) -> BackupResult<Option<Vec<u8>>> {
        match fs::read(self.document_path(collection)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn records(&self, collection: Collection) -> BackupResult<Vec<EntityRecord>> {
        let document = self.document(collection)?;
        decode_collection(collection, document.as_deref())
    }

    pub fn singleton(&self, collection: Collection) -> BackupResult<Option<Fields>> {
        let document = self.document(collection)?;
        decode_singleton(collection, document.as_deref())
    }

    /// Relative paths of every file under `media/`
    pub fn media_files(&self) -> BackupResult<Vec<PathBuf>> {
        let media = self.media_dir();
        if media.is_dir() {
            collect_files(&media)
        } else {
            Ok(Vec::new())
        }
    }
}

/// Expand an archive into a fresh temporary directory named `<prefix>XXXX`.
pub fn extract(bytes: &[u8], temp_prefix: &str) -> BackupResult<ExtractedArchive> {
    let dir = tempfile::Builder::new().prefix(temp_prefix).tempdir()?;
    extract_to(bytes, dir.path())?;
    Ok(ExtractedArchive { dir })
}

/// Expand an archive into `destination`.
///
/// Every entry name is validated before the first byte is written, so an
/// archive with a single escaping entry writes nothing at all.
pub fn extract_to(bytes: &[u8], destination: &Path) -> BackupResult<usize> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| BackupError::MalformedArchive(e.to_string()))?;

    let mut plan: Vec<(usize, PathBuf)> = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| BackupError::MalformedArchive(e.to_string()))?;
        let name = entry.name().to_string();
        let relative = sanitize_relative_path(&name)?;
        if entry.enclosed_name().is_none() {
            return Err(BackupError::PathTraversal(name));
        }
        if entry.is_dir() {
            continue;
        }
        if !relative.starts_with(DATA_DIR) && !relative.starts_with(MEDIA_DIR) {
            debug!("Skipping archive entry outside data/ and media/: {}", name);
            continue;
        }
        plan.push((index, relative));
    }

    for (index, relative) in &plan {
        let target = destination.join(relative);
        if !target.starts_with(destination) {
            return Err(BackupError::PathTraversal(relative.to_string_lossy().to_string()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = archive.by_index(*index)?;
        let mut output = fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut output)?;
    }

    Ok(plan.len())
}

/// Copy every file under `source` into `media_root`, overwriting files at the
/// same relative path and creating directories as needed.
pub fn copy_media_tree(source: &Path, files: &[PathBuf], media_root: &Path) -> BackupResult<usize> {
    for relative in files {
        let target = media_root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source.join(relative), &target)?;
    }
    Ok(files.len())
}

//! Backup archives: codec, natural-key resolution, export and restore
//!
//! ```text
//! ExportPipeline → codec → archive bytes → codec → RestorePipeline
//!                                                   ├─ NaturalKeyResolver
//!                                                   └─ ContentStore (one transaction)
//! ```

pub mod codec;
pub mod export;
pub mod manifest;
pub mod record;
pub mod resolver;
pub mod restore;
pub mod store;

pub use codec::{archive_file_name, validate_archive_name, ArchiveWriter, ExtractedArchive};
pub use export::{ExportPipeline, ExportSummary};
pub use manifest::{Collection, FieldKind, FieldSpec, Identity, ValueKind};
pub use record::{EntityRecord, FieldValue, Fields, Reference};
pub use resolver::{fallback_slug, NaturalKeyResolver, ResolvedKey};
pub use restore::{ImportCounts, RestorePipeline};
pub use store::ContentStore;

//! Backup and restore error types
//!
//! Every failure the export and restore pipelines can surface is one of these
//! variants. The classification helpers decide how a failure is reported: client
//! errors are the submitter's fault (bad name, bad archive, bad data), server
//! errors are ours (database, disk).
//!
//! # Examples
//!
//! ```rust
//! use tdp::errors::BackupError;
//!
//! let err = BackupError::InvalidArchiveName("backup.zip".to_string());
//! assert!(err.is_client_error());
//! assert_eq!(err.error_code(), "INVALID_ARCHIVE_NAME");
//!
//! let err = BackupError::UnresolvedReference {
//!     collection: "tours".to_string(),
//!     field: "category".to_string(),
//!     reference: "boat-tours".to_string(),
//! };
//! assert!(err.to_string().contains("boat-tours"));
//! ```

use thiserror::Error;

/// Backup, restore and restore-task errors
#[derive(Error, Debug)]
pub enum BackupError {
    /// The uploaded file is not a readable archive container
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// An archive entry tries to escape the extraction root
    #[error("Archive entry escapes extraction root: {0}")]
    PathTraversal(String),

    /// Filename does not follow `<PREFIX>_<YYYYMMDD>.zip`
    #[error("Invalid archive name '{0}': expected <PREFIX>_YYYYMMDD.zip")]
    InvalidArchiveName(String),

    /// Upload exceeds the configured size limit
    #[error("Archive of {size} bytes exceeds the {limit} byte limit")]
    ArchiveTooLarge { size: u64, limit: u64 },

    /// Record-level validation failure (missing natural key, cycle, ...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A value does not match the type declared in the field manifest
    #[error("Field '{field}' in {collection}: expected {expected}, found {found}")]
    TypeMismatch {
        collection: String,
        field: String,
        expected: String,
        found: String,
    },

    /// A required reference could not be linked
    #[error("Missing {field} '{reference}' referenced from {collection}")]
    UnresolvedReference {
        collection: String,
        field: String,
        reference: String,
    },

    /// Restore task does not exist
    #[error("Restore task {0} not found")]
    TaskNotFound(String),

    /// Restore task lifecycle violation
    #[error("Restore task cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Restore stopped after an operator cancelled it
    #[error("Restore cancelled")]
    Cancelled,

    /// Actor is not allowed to run backups
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl BackupError {
    /// Check if this is a client error (400-series)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BackupError::MalformedArchive(_)
                | BackupError::PathTraversal(_)
                | BackupError::InvalidArchiveName(_)
                | BackupError::ArchiveTooLarge { .. }
                | BackupError::Validation(_)
                | BackupError::TypeMismatch { .. }
                | BackupError::UnresolvedReference { .. }
                | BackupError::InvalidTransition { .. }
        )
    }

    /// Check if this is a not found error (404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackupError::TaskNotFound(_))
    }

    /// Check if this is a server error (500-series)
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            BackupError::Io(_)
                | BackupError::Serialization(_)
                | BackupError::Database(_)
                | BackupError::InvalidConfiguration(_)
        )
    }

    /// Malformed container or traversal attempt, detected before any mutation
    pub fn is_archive_error(&self) -> bool {
        matches!(
            self,
            BackupError::MalformedArchive(_) | BackupError::PathTraversal(_)
        )
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            BackupError::MalformedArchive(_) => "MALFORMED_ARCHIVE",
            BackupError::PathTraversal(_) => "PATH_TRAVERSAL",
            BackupError::InvalidArchiveName(_) => "INVALID_ARCHIVE_NAME",
            BackupError::ArchiveTooLarge { .. } => "ARCHIVE_TOO_LARGE",
            BackupError::Validation(_) => "VALIDATION_FAILED",
            BackupError::TypeMismatch { .. } => "TYPE_MISMATCH",
            BackupError::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            BackupError::TaskNotFound(_) => "TASK_NOT_FOUND",
            BackupError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BackupError::Cancelled => "CANCELLED",
            BackupError::Forbidden(_) => "FORBIDDEN",
            BackupError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            BackupError::Io(_) => "IO_ERROR",
            BackupError::Serialization(_) => "SERIALIZATION_ERROR",
            BackupError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BackupError::Validation(message.into())
    }

    pub fn unresolved(
        collection: impl Into<String>,
        field: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        BackupError::UnresolvedReference {
            collection: collection.into(),
            field: field.into(),
            reference: reference.into(),
        }
    }

    /// Full diagnostic text including the source chain, stored on failed tasks
    pub fn diagnostic(&self) -> String {
        let mut details = format!("{} [{}]", self, self.error_code());
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            details.push_str("\ncaused by: ");
            details.push_str(&cause.to_string());
            source = cause.source();
        }
        details.push_str(&format!("\n{:?}", self));
        details
    }
}

impl From<zip::result::ZipError> for BackupError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => BackupError::Io(io),
            other => BackupError::MalformedArchive(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_archive_name() {
        let err = BackupError::InvalidArchiveName("backup.zip".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid archive name 'backup.zip': expected <PREFIX>_YYYYMMDD.zip"
        );
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "INVALID_ARCHIVE_NAME");
    }

    #[test]
    fn test_unresolved_reference_message() {
        let err = BackupError::unresolved("tours", "category", "boat-tours");
        assert_eq!(
            err.to_string(),
            "Missing category 'boat-tours' referenced from tours"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_archive_errors() {
        assert!(BackupError::PathTraversal("../x".to_string()).is_archive_error());
        assert!(BackupError::MalformedArchive("bad".to_string()).is_archive_error());
        assert!(!BackupError::validation("x").is_archive_error());
    }

    #[test]
    fn test_task_not_found() {
        let err = BackupError::TaskNotFound("abc".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), "TASK_NOT_FOUND");
    }

    #[test]
    fn test_zip_error_conversion() {
        let err = BackupError::from(zip::result::ZipError::InvalidArchive("no EOCD"));
        assert!(matches!(err, BackupError::MalformedArchive(_)));
    }

    #[test]
    fn test_diagnostic_includes_code() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = BackupError::from(io);
        assert!(err.is_server_error());
        let details = err.diagnostic();
        assert!(details.contains("IO_ERROR"));
        assert!(details.contains("denied"));
    }
}

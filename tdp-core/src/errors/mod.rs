//! Error types for tdp-core
//!
//! - **BackupError**: archive codec, natural-key resolution, export and restore failures
//! - **CoreError**: transport-neutral error returned across the service boundary
//!
//! # Examples
//!
//! ```rust
//! use tdp::errors::{BackupError, CoreError, CoreErrorKind};
//!
//! let err: CoreError = BackupError::validation("tour without slug").into();
//! assert_eq!(err.kind(), CoreErrorKind::Validation);
//! ```

pub mod backup;
pub mod core_error;

pub use backup::BackupError;
pub use core_error::{CoreError, CoreErrorKind};

/// Result type alias for backup and restore operations
pub type BackupResult<T> = Result<T, BackupError>;

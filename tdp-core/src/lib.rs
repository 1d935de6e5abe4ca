//! TDP backup and restore core
//!
//! Exports the site's content store and media tree into a portable
//! `<PREFIX>_<YYYYMMDD>.zip` archive and restores such archives as a
//! purge-then-load, linking records by slug rather than by database id.

pub mod app_context;
pub mod auth;
pub mod backup;
pub mod config;
pub mod database;
pub mod errors;
pub mod services;
pub mod utils;

pub use app_context::AppContext;
pub use config::BackupConfig;
pub use errors::{BackupError, BackupResult, CoreError, CoreErrorKind};

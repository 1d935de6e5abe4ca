//! Backup configuration
//!
//! Values come from an optional `tdp.toml`, then `TDP_*` environment variables,
//! then whatever the binary's command line overrides.
//!
//! ```toml
//! media_root = "/srv/tdp/media"
//! archive_prefix = "TDP"
//! temp_prefix = "tdp_restore_"
//! progress_buffer = 64
//! max_upload_bytes = 536870912
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{BackupError, BackupResult};

pub const CONFIG_FILE_NAME: &str = "tdp.toml";

const ENV_KEYS: [&str; 5] = [
    "TDP_MEDIA_ROOT",
    "TDP_ARCHIVE_PREFIX",
    "TDP_TEMP_PREFIX",
    "TDP_PROGRESS_BUFFER",
    "TDP_MAX_UPLOAD_BYTES",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupConfig {
    /// Live media root mirrored into `media/` of every archive.
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// Archive names must look like `<archive_prefix>_YYYYMMDD.zip`.
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,
    /// Prefix of the per-restore temporary extraction directory.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
    /// Progress events buffered per task channel.
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_archive_prefix() -> String {
    "TDP".to_string()
}

fn default_temp_prefix() -> String {
    "tdp_restore_".to_string()
}

fn default_progress_buffer() -> usize {
    64
}

fn default_max_upload_bytes() -> u64 {
    512 * 1024 * 1024
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            archive_prefix: default_archive_prefix(),
            temp_prefix: default_temp_prefix(),
            progress_buffer: default_progress_buffer(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl BackupConfig {
    /// File (when given and present) layered under the process environment.
    pub fn load(path: Option<&Path>) -> BackupResult<Self> {
        let base = match path {
            Some(path) if path.exists() => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            _ => Self::default(),
        };

        let env: HashMap<String, String> = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        base.with_overrides(&env)
    }

    pub fn from_toml_str(content: &str) -> BackupResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BackupError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TDP_*` style overrides. Empty values are ignored.
    pub fn with_overrides(mut self, values: &HashMap<String, String>) -> BackupResult<Self> {
        let get = |key: &str| {
            values
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get("TDP_MEDIA_ROOT") {
            self.media_root = PathBuf::from(value);
        }
        if let Some(value) = get("TDP_ARCHIVE_PREFIX") {
            self.archive_prefix = value.to_string();
        }
        if let Some(value) = get("TDP_TEMP_PREFIX") {
            self.temp_prefix = value.to_string();
        }
        if let Some(value) = get("TDP_PROGRESS_BUFFER") {
            self.progress_buffer = value.parse().map_err(|_| {
                BackupError::InvalidConfiguration(format!(
                    "TDP_PROGRESS_BUFFER must be a positive integer, got '{}'",
                    value
                ))
            })?;
        }
        if let Some(value) = get("TDP_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = value.parse().map_err(|_| {
                BackupError::InvalidConfiguration(format!(
                    "TDP_MAX_UPLOAD_BYTES must be a byte count, got '{}'",
                    value
                ))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> BackupResult<()> {
        if self.archive_prefix.is_empty()
            || !self
                .archive_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(BackupError::InvalidConfiguration(format!(
                "archive_prefix '{}' must be non-empty ASCII alphanumerics",
                self.archive_prefix
            )));
        }
        if self.progress_buffer == 0 {
            return Err(BackupError::InvalidConfiguration(
                "progress_buffer must be at least 1".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(BackupError::InvalidConfiguration(
                "max_upload_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BackupConfig::default();
        assert_eq!(config.archive_prefix, "TDP");
        assert_eq!(config.temp_prefix, "tdp_restore_");
        assert_eq!(config.progress_buffer, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = BackupConfig::from_toml_str("media_root = \"/srv/media\"\n").unwrap();
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.archive_prefix, "TDP");
    }

    #[test]
    fn test_env_overrides() {
        let mut values = HashMap::new();
        values.insert("TDP_ARCHIVE_PREFIX".to_string(), "SITE".to_string());
        values.insert("TDP_PROGRESS_BUFFER".to_string(), "8".to_string());
        values.insert("TDP_TEMP_PREFIX".to_string(), "".to_string());

        let config = BackupConfig::default().with_overrides(&values).unwrap();
        assert_eq!(config.archive_prefix, "SITE");
        assert_eq!(config.progress_buffer, 8);
        assert_eq!(config.temp_prefix, "tdp_restore_");
    }

    #[test]
    fn test_invalid_numeric_override() {
        let mut values = HashMap::new();
        values.insert("TDP_MAX_UPLOAD_BYTES".to_string(), "lots".to_string());
        let err = BackupConfig::default().with_overrides(&values).unwrap_err();
        assert!(matches!(err, BackupError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_invalid_prefix() {
        let err = BackupConfig::from_toml_str("archive_prefix = \"a_b\"\n").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIGURATION");
    }
}

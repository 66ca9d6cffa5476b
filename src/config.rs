//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Development default values.
pub mod defaults {
    pub const DEV_DATABASE_URL: &str = "file:data/reports.db";
    pub const DEV_ARCHIVE_ROOT: &str = "data/archive";
    pub const DEV_LAB_NAME: &str = "lab-dev";
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Document store URL (SQLite file, `file:path` form)
    pub database_url: String,
    /// Root directory for archived raw payloads
    pub archive_root: PathBuf,
    /// Default lab name applied to legacy boot reports during migration
    pub lab_name: String,
    /// Optional per-collection document limit for migration runs
    pub migration_limit: Option<usize>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DATABASE_URL`: store location, `file:path` form (default: `file:data/reports.db`)
    /// - `KRI_ARCHIVE_ROOT`: archive tree root (default: `data/archive`)
    /// - `KRI_LAB_NAME`: default lab name for migrated boot reports (default: `lab-dev`)
    /// - `KRI_MIGRATION_LIMIT`: optional per-collection migration document limit
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DEV_DATABASE_URL.to_string());

        let archive_root = env::var("KRI_ARCHIVE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::DEV_ARCHIVE_ROOT));

        let lab_name =
            env::var("KRI_LAB_NAME").unwrap_or_else(|_| defaults::DEV_LAB_NAME.to_string());

        let migration_limit = match env::var("KRI_MIGRATION_LIMIT") {
            Ok(raw) => Some(
                raw.parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue("KRI_MIGRATION_LIMIT must be a number"))?,
            ),
            Err(_) => None,
        };

        Ok(Config {
            database_url,
            archive_root,
            lab_name,
            migration_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_values() {
        // Build from explicit values; env-dependent paths are covered by the binary.
        let config = Config {
            database_url: defaults::DEV_DATABASE_URL.to_string(),
            archive_root: PathBuf::from(defaults::DEV_ARCHIVE_ROOT),
            lab_name: defaults::DEV_LAB_NAME.to_string(),
            migration_limit: None,
        };

        assert!(config.database_url.starts_with("file:"));
        assert_eq!(config.lab_name, "lab-dev");
        assert!(config.migration_limit.is_none());
    }
}

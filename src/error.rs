//! Domain error types for the report import pipeline.
//!
//! Uses thiserror for ergonomic error handling with automatic Display
//! implementations. Every error carries a numeric code used as the bucket key
//! in batch-import error maps: parse-class failures map to 400, store and
//! archive failures to 500.

use std::collections::HashMap;

/// Import pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// A mandatory key was absent from the input document.
    #[error("Missing mandatory field '{0}'")]
    MissingField(String),

    /// A mandatory key held a null-equivalent sentinel.
    #[error("Invalid value for mandatory field '{key}': got '{value}'")]
    InvalidValue { key: String, value: String },

    /// A required cross-entity reference could not be resolved.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A store operation failed; no partial-write guarantee.
    #[error("Store operation failed: {0}")]
    StoreWrite(String),

    /// Writing the archive copy failed (never fatal to an import).
    #[error("Archive write failed: {0}")]
    ArchiveWrite(String),

    /// A stored document does not match the schema it claims.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl ImportError {
    /// Numeric bucket code for this error class.
    pub fn code(&self) -> u16 {
        match self {
            Self::MissingField(_) | Self::InvalidValue { .. } | Self::UnresolvedReference(_) => 400,
            Self::StoreWrite(_) | Self::ArchiveWrite(_) | Self::SchemaMismatch(_) => 500,
        }
    }
}

/// Convenience type alias for Results with ImportError.
pub type ImportResult<T> = Result<T, ImportError>;

/// Batch error accumulator: bucket of messages per numeric error code.
///
/// Message ordering within a bucket is not guaranteed to callers.
pub type ErrorMap = HashMap<u16, Vec<String>>;

/// Append an error message to its per-code bucket.
pub fn add_error_message(errors: &mut ErrorMap, code: u16, message: impl Into<String>) {
    errors.entry(code).or_default().push(message.into());
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::StoreWrite(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_map_to_400() {
        assert_eq!(ImportError::MissingField("job".into()).code(), 400);
        assert_eq!(
            ImportError::InvalidValue {
                key: "board".into(),
                value: "null".into()
            }
            .code(),
            400
        );
        assert_eq!(ImportError::UnresolvedReference("build".into()).code(), 400);
    }

    #[test]
    fn store_errors_map_to_500() {
        assert_eq!(ImportError::StoreWrite("boom".into()).code(), 500);
        assert_eq!(ImportError::SchemaMismatch("no remap".into()).code(), 500);
    }

    #[test]
    fn error_map_buckets_by_code() {
        let mut errors = ErrorMap::new();
        add_error_message(&mut errors, 400, "first");
        add_error_message(&mut errors, 400, "second");
        add_error_message(&mut errors, 500, "third");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[&400].len(), 2);
        assert_eq!(errors[&500], vec!["third".to_string()]);
    }
}

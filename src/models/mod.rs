//! Canonical entity models.
//!
//! Every entity carries a generated identifier, the schema version marker,
//! a creation timestamp that is immutable once set, and a residual metadata
//! bag holding producer keys the canonical schema does not know about.

pub mod boot;
pub mod build;
pub mod job;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::store::{Collection, FieldQuery};

pub use boot::BootReport;
pub use build::BuildReport;
pub use job::JobReport;
pub use test::{TestCase, TestSet, TestSuite};

/// Schema version marker for canonical documents. Documents lacking it are
/// legacy and must be migrated before they are trusted.
pub const SCHEMA_VERSION: &str = "1.0";

/// Status applied when a producer did not report one.
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

/// Residual bag for unrecognized producer fields.
pub type Metadata = Map<String, JsonValue>;

/// A canonical entity that can be reconciled against its store collection.
pub trait StoreDocument: Serialize {
    /// The collection this entity lives in.
    const COLLECTION: Collection;

    fn id(&self) -> Option<Uuid>;
    fn set_id(&mut self, id: Uuid);

    fn created_on(&self) -> Option<DateTime<Utc>>;
    fn set_created_on(&mut self, created_on: DateTime<Utc>);

    /// Natural-key query identifying this entity independent of its id.
    fn natural_key(&self) -> FieldQuery;
}

/// Build a single-field query, the common natural-key shape.
pub(crate) fn field_query(entries: &[(&str, JsonValue)]) -> FieldQuery {
    let mut query = FieldQuery::new();
    for (key, value) in entries {
        query.insert((*key).to_string(), value.clone());
    }
    query
}

/// Serialize an optional id the way it is stored (string or null).
pub(crate) fn id_value(id: Option<Uuid>) -> JsonValue {
    match id {
        Some(id) => JsonValue::String(id.to_string()),
        None => JsonValue::Null,
    }
}

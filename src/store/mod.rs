//! Document store collaborator interface.
//!
//! The pipeline only assumes single-document operations: find-one by a field
//! query, find by id, insert, replace, delete, and a full-collection scan for
//! migration. No transaction API is assumed; every operation is individually
//! atomic at single-document granularity.

pub mod memory;
pub mod sqlite;

use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::ImportResult;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Document field holding the generated identifier.
pub const ID_FIELD: &str = "id";

/// The store collections, one per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Job,
    Build,
    Boot,
    TestSuite,
    TestSet,
    TestCase,
}

impl Collection {
    /// All collections, in migration dependency order.
    pub const ALL: [Collection; 6] = [
        Collection::Job,
        Collection::Build,
        Collection::Boot,
        Collection::TestSuite,
        Collection::TestSet,
        Collection::TestCase,
    ];

    /// Collection name as used by the store backend.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Build => "build",
            Self::Boot => "boot",
            Self::TestSuite => "test_suite",
            Self::TestSet => "test_set",
            Self::TestCase => "test_case",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Field query used for natural-key lookups: every listed field must match.
pub type FieldQuery = Map<String, JsonValue>;

/// Single-document store operations.
pub trait Store: Send + Sync {
    /// Find the first document matching all fields of the query.
    fn find_one(&self, collection: Collection, query: &FieldQuery)
        -> ImportResult<Option<JsonValue>>;

    /// Find a document by its generated identifier.
    fn find_by_id(&self, collection: Collection, id: Uuid) -> ImportResult<Option<JsonValue>>;

    /// Insert a document, assigning an identifier when the document carries
    /// none, and return the identifier.
    fn insert(&self, collection: Collection, doc: JsonValue) -> ImportResult<Uuid>;

    /// Replace a stored document wholesale (no field-level merge).
    fn replace(&self, collection: Collection, id: Uuid, doc: JsonValue) -> ImportResult<()>;

    /// Delete a document by identifier.
    fn delete(&self, collection: Collection, id: Uuid) -> ImportResult<()>;

    /// Scan a collection, optionally bounded.
    fn list(&self, collection: Collection, limit: Option<usize>) -> ImportResult<Vec<JsonValue>>;

    /// Number of documents in a collection.
    fn count(&self, collection: Collection) -> ImportResult<u64>;
}

/// Extract the generated identifier from a raw stored document.
pub fn document_id(doc: &JsonValue) -> Option<Uuid> {
    doc.get(ID_FIELD)
        .and_then(JsonValue::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

//! SQLite-backed document store adapter.
//!
//! Each collection maps to one table holding the JSON document as text;
//! natural-key lookups go through `json_extract`. A single connection is
//! shared behind a mutex since rusqlite connections are not thread-safe.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{ImportError, ImportResult};

use super::{document_id, Collection, FieldQuery, Store, ID_FIELD};

/// SQLite store wrapper.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store from a `file:path` URL.
    pub fn open(database_url: &str) -> ImportResult<Self> {
        let path = database_url.strip_prefix("file:").ok_or_else(|| {
            ImportError::StoreWrite(format!(
                "Invalid DATABASE_URL format: {}. Expected 'file:path'",
                database_url
            ))
        })?;

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ImportError::StoreWrite(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| ImportError::StoreWrite(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (used by tests).
    pub fn open_in_memory() -> ImportResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ImportError::StoreWrite(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> ImportResult<Self> {
        conn.execute_batch("PRAGMA synchronous = FULL")
            .map_err(|e| ImportError::StoreWrite(format!("Failed to set pragma: {}", e)))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(|e| {
                ImportError::StoreWrite(format!("Failed to set journal_mode pragma: {}", e))
            })?;

        for collection in Collection::ALL {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc TEXT NOT NULL)",
                    collection.name()
                ),
                [],
            )
            .map_err(|e| {
                ImportError::StoreWrite(format!(
                    "Failed to create collection '{}': {}",
                    collection, e
                ))
            })?;
        }

        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("Store mutex poisoned")
    }
}

fn store_err(context: &str, err: rusqlite::Error) -> ImportError {
    ImportError::StoreWrite(format!("{}: {}", context, err))
}

fn parse_doc(raw: String) -> ImportResult<JsonValue> {
    serde_json::from_str(&raw).map_err(|e| {
        ImportError::SchemaMismatch(format!("Stored document is not valid JSON: {}", e))
    })
}

/// Build the WHERE clause and parameters for a field query.
fn query_clauses(query: &FieldQuery) -> (String, Vec<SqlValue>) {
    let mut clauses = Vec::with_capacity(query.len());
    let mut values = Vec::new();

    for (key, expected) in query {
        match expected {
            JsonValue::Null => {
                clauses.push(format!("json_extract(doc, '$.{}') IS NULL", key));
            }
            JsonValue::String(s) => {
                clauses.push(format!("json_extract(doc, '$.{}') = ?", key));
                values.push(SqlValue::Text(s.clone()));
            }
            JsonValue::Bool(b) => {
                clauses.push(format!("json_extract(doc, '$.{}') = ?", key));
                values.push(SqlValue::Integer(*b as i64));
            }
            JsonValue::Number(n) => {
                clauses.push(format!("json_extract(doc, '$.{}') = ?", key));
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::Integer(i));
                } else {
                    values.push(SqlValue::Real(n.as_f64().unwrap_or_default()));
                }
            }
            other => {
                // Arrays/objects compare against their canonical JSON text.
                clauses.push(format!("json_extract(doc, '$.{}') = json(?)", key));
                values.push(SqlValue::Text(other.to_string()));
            }
        }
    }

    if clauses.is_empty() {
        ("1 = 1".to_string(), values)
    } else {
        (clauses.join(" AND "), values)
    }
}

impl Store for SqliteStore {
    fn find_one(
        &self,
        collection: Collection,
        query: &FieldQuery,
    ) -> ImportResult<Option<JsonValue>> {
        let (where_clause, values) = query_clauses(query);
        let sql = format!(
            "SELECT doc FROM {} WHERE {} LIMIT 1",
            collection.name(),
            where_clause
        );

        let conn = self.connection();
        let result = conn
            .prepare(&sql)
            .map_err(|e| store_err("Failed to prepare query", e))?
            .query_row(params_from_iter(values), |row| row.get::<_, String>(0));

        match result {
            Ok(raw) => Ok(Some(parse_doc(raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(store_err("Query failed", e)),
        }
    }

    fn find_by_id(&self, collection: Collection, id: Uuid) -> ImportResult<Option<JsonValue>> {
        let sql = format!("SELECT doc FROM {} WHERE id = ?1", collection.name());
        let conn = self.connection();
        let result = conn.query_row(&sql, params![id.to_string()], |row| row.get::<_, String>(0));

        match result {
            Ok(raw) => Ok(Some(parse_doc(raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(store_err("Query failed", e)),
        }
    }

    fn insert(&self, collection: Collection, mut doc: JsonValue) -> ImportResult<Uuid> {
        if !doc.is_object() {
            return Err(ImportError::StoreWrite(
                "only JSON objects can be stored".to_string(),
            ));
        }
        let id = document_id(&doc).unwrap_or_else(Uuid::new_v4);
        doc[ID_FIELD] = JsonValue::String(id.to_string());

        let sql = format!("INSERT INTO {} (id, doc) VALUES (?1, ?2)", collection.name());
        let conn = self.connection();
        conn.execute(&sql, params![id.to_string(), doc.to_string()])
            .map_err(|e| store_err("Insert failed", e))?;
        Ok(id)
    }

    fn replace(&self, collection: Collection, id: Uuid, mut doc: JsonValue) -> ImportResult<()> {
        if !doc.is_object() {
            return Err(ImportError::StoreWrite(
                "only JSON objects can be stored".to_string(),
            ));
        }
        doc[ID_FIELD] = JsonValue::String(id.to_string());

        let sql = format!("UPDATE {} SET doc = ?2 WHERE id = ?1", collection.name());
        let conn = self.connection();
        let updated = conn
            .execute(&sql, params![id.to_string(), doc.to_string()])
            .map_err(|e| store_err("Replace failed", e))?;
        if updated == 0 {
            return Err(ImportError::StoreWrite(format!(
                "no document '{}' in collection '{}' to replace",
                id, collection
            )));
        }
        Ok(())
    }

    fn delete(&self, collection: Collection, id: Uuid) -> ImportResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", collection.name());
        let conn = self.connection();
        let deleted = conn
            .execute(&sql, params![id.to_string()])
            .map_err(|e| store_err("Delete failed", e))?;
        if deleted == 0 {
            return Err(ImportError::StoreWrite(format!(
                "no document '{}' in collection '{}' to delete",
                id, collection
            )));
        }
        Ok(())
    }

    fn list(&self, collection: Collection, limit: Option<usize>) -> ImportResult<Vec<JsonValue>> {
        // SQLite treats a negative LIMIT as unbounded.
        let bound: i64 = limit.map(|n| n as i64).unwrap_or(-1);
        let sql = format!("SELECT doc FROM {} LIMIT ?1", collection.name());

        let conn = self.connection();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| store_err("Failed to prepare scan", e))?;
        let rows = stmt
            .query_map(params![bound], |row| row.get::<_, String>(0))
            .map_err(|e| store_err("Scan failed", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| store_err("Scan failed", e))?;

        rows.into_iter().map(parse_doc).collect()
    }

    fn count(&self, collection: Collection) -> ImportResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.name());
        let conn = self.connection();
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| store_err("Count failed", e))?;
        Ok(count as u64)
    }
}

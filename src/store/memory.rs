//! In-memory store used by tests and small local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::error::{ImportError, ImportResult};

use super::{document_id, Collection, FieldQuery, Store, ID_FIELD};

/// Thread-safe in-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, BTreeMap<Uuid, JsonValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(doc: &JsonValue, query: &FieldQuery) -> bool {
    query.iter().all(|(key, expected)| {
        let actual = doc.get(key).unwrap_or(&JsonValue::Null);
        actual == expected
    })
}

impl Store for MemoryStore {
    fn find_one(
        &self,
        collection: Collection,
        query: &FieldQuery,
    ) -> ImportResult<Option<JsonValue>> {
        let collections = self.collections.lock().expect("Store mutex poisoned");
        let found = collections
            .get(&collection)
            .and_then(|docs| docs.values().find(|doc| matches(doc, query)).cloned());
        Ok(found)
    }

    fn find_by_id(&self, collection: Collection, id: Uuid) -> ImportResult<Option<JsonValue>> {
        let collections = self.collections.lock().expect("Store mutex poisoned");
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(&id).cloned()))
    }

    fn insert(&self, collection: Collection, mut doc: JsonValue) -> ImportResult<Uuid> {
        if !doc.is_object() {
            return Err(ImportError::StoreWrite(
                "only JSON objects can be stored".to_string(),
            ));
        }

        let id = document_id(&doc).unwrap_or_else(Uuid::new_v4);
        doc[ID_FIELD] = json!(id.to_string());

        let mut collections = self.collections.lock().expect("Store mutex poisoned");
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(&id) {
            return Err(ImportError::StoreWrite(format!(
                "duplicate identifier '{}' in collection '{}'",
                id, collection
            )));
        }
        docs.insert(id, doc);
        Ok(id)
    }

    fn replace(&self, collection: Collection, id: Uuid, mut doc: JsonValue) -> ImportResult<()> {
        if !doc.is_object() {
            return Err(ImportError::StoreWrite(
                "only JSON objects can be stored".to_string(),
            ));
        }
        doc[ID_FIELD] = json!(id.to_string());

        let mut collections = self.collections.lock().expect("Store mutex poisoned");
        let docs = collections.entry(collection).or_default();
        if !docs.contains_key(&id) {
            return Err(ImportError::StoreWrite(format!(
                "no document '{}' in collection '{}' to replace",
                id, collection
            )));
        }
        docs.insert(id, doc);
        Ok(())
    }

    fn delete(&self, collection: Collection, id: Uuid) -> ImportResult<()> {
        let mut collections = self.collections.lock().expect("Store mutex poisoned");
        let removed = collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id));
        match removed {
            Some(_) => Ok(()),
            None => Err(ImportError::StoreWrite(format!(
                "no document '{}' in collection '{}' to delete",
                id, collection
            ))),
        }
    }

    fn list(&self, collection: Collection, limit: Option<usize>) -> ImportResult<Vec<JsonValue>> {
        let collections = self.collections.lock().expect("Store mutex poisoned");
        let docs = collections
            .get(&collection)
            .map(|docs| docs.values().cloned())
            .into_iter()
            .flatten();
        Ok(match limit {
            Some(n) => docs.take(n).collect(),
            None => docs.collect(),
        })
    }

    fn count(&self, collection: Collection) -> ImportResult<u64> {
        let collections = self.collections.lock().expect("Store mutex poisoned");
        Ok(collections
            .get(&collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_id_and_find_one_matches_all_fields() {
        let store = MemoryStore::new();
        let id = store
            .insert(
                Collection::Job,
                json!({"name": "next-v4.1", "job": "next", "kernel": "v4.1"}),
            )
            .unwrap();

        let mut query = FieldQuery::new();
        query.insert("name".to_string(), json!("next-v4.1"));
        let found = store.find_one(Collection::Job, &query).unwrap().unwrap();
        assert_eq!(document_id(&found), Some(id));

        query.insert("job".to_string(), json!("mainline"));
        assert!(store.find_one(Collection::Job, &query).unwrap().is_none());
    }

    #[test]
    fn replace_requires_existing_document() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();
        assert!(store
            .replace(Collection::Boot, missing, json!({"board": "beagle"}))
            .is_err());

        let id = store
            .insert(Collection::Boot, json!({"board": "beagle"}))
            .unwrap();
        store
            .replace(Collection::Boot, id, json!({"board": "panda"}))
            .unwrap();

        let doc = store.find_by_id(Collection::Boot, id).unwrap().unwrap();
        assert_eq!(doc["board"], json!("panda"));
        assert_eq!(document_id(&doc), Some(id));
    }

    #[test]
    fn delete_and_count() {
        let store = MemoryStore::new();
        let id = store.insert(Collection::TestCase, json!({"name": "t"})).unwrap();
        assert_eq!(store.count(Collection::TestCase).unwrap(), 1);
        store.delete(Collection::TestCase, id).unwrap();
        assert_eq!(store.count(Collection::TestCase).unwrap(), 0);
        assert!(store.delete(Collection::TestCase, id).is_err());
    }

    #[test]
    fn list_honors_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert(Collection::Build, json!({"defconfig": format!("cfg-{}", i)}))
                .unwrap();
        }
        assert_eq!(store.list(Collection::Build, Some(2)).unwrap().len(), 2);
        assert_eq!(store.list(Collection::Build, None).unwrap().len(), 5);
    }
}

//! Reconciliation: create-or-update against the store by natural key.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::ImportResult;
use crate::models::StoreDocument;
use crate::store::{document_id, Store};

/// Status code for an update of an existing document.
pub const STATUS_UPDATED: u16 = 200;
/// Status code for a newly created document.
pub const STATUS_CREATED: u16 = 201;

/// Save a canonical entity, updating in place when a document with the same
/// natural key already exists.
///
/// On update the stored document's identifier and creation timestamp are
/// inherited so both survive any number of re-imports; the rest of the
/// stored document is replaced wholesale. On create a fresh identifier and
/// the current time are assigned. Returns the status code and the
/// document's identifier.
pub fn save_or_update<T: StoreDocument>(
    doc: &mut T,
    store: &dyn Store,
) -> ImportResult<(u16, Uuid)> {
    let query = doc.natural_key();

    match store.find_one(T::COLLECTION, &query)? {
        Some(stored) => {
            if let Some(id) = document_id(&stored) {
                doc.set_id(id);
            }
            if let Some(created_on) = stored
                .get("created_on")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            {
                doc.set_created_on(created_on);
            }
            let id = match doc.id() {
                Some(id) => id,
                // Stored document without an id is unreachable through this
                // path; fall back to inserting a fresh one.
                None => {
                    let id = Uuid::new_v4();
                    doc.set_id(id);
                    id
                }
            };
            info!("Updating {} document {}", T::COLLECTION, id);
            store.replace(T::COLLECTION, id, serde_json::to_value(&doc)?)?;
            Ok((STATUS_UPDATED, id))
        }
        None => {
            let id = doc.id().unwrap_or_else(Uuid::new_v4);
            doc.set_id(id);
            if doc.created_on().is_none() {
                doc.set_created_on(Utc::now());
            }
            let id = store.insert(T::COLLECTION, serde_json::to_value(&doc)?)?;
            doc.set_id(id);
            Ok((STATUS_CREATED, id))
        }
    }
}

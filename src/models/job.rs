//! Job entity: a build pipeline unit identified by (job name, kernel version).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::store::{Collection, FieldQuery};

use super::{field_query, Metadata, StoreDocument, SCHEMA_VERSION, UNKNOWN_STATUS};

/// Canonical job document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub id: Option<Uuid>,
    /// Synthetic lookup name: `{job}-{kernel}`.
    pub name: String,
    pub version: String,
    pub created_on: Option<DateTime<Utc>>,
    pub job: String,
    pub kernel: String,
    pub status: String,
    pub private: bool,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
    pub git_describe: Option<String>,
    pub git_url: Option<String>,
    pub metadata: Metadata,
}

impl JobReport {
    pub fn new(job: String, kernel: String) -> Self {
        let name = format!("{}-{}", job, kernel);
        JobReport {
            id: None,
            name,
            version: SCHEMA_VERSION.to_string(),
            created_on: None,
            job,
            kernel,
            status: UNKNOWN_STATUS.to_string(),
            private: false,
            git_branch: None,
            git_commit: None,
            git_describe: None,
            git_url: None,
            metadata: Metadata::new(),
        }
    }
}

impl StoreDocument for JobReport {
    const COLLECTION: Collection = Collection::Job;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn created_on(&self) -> Option<DateTime<Utc>> {
        self.created_on
    }

    fn set_created_on(&mut self, created_on: DateTime<Utc>) {
        self.created_on = Some(created_on);
    }

    fn natural_key(&self) -> FieldQuery {
        field_query(&[("name", json!(self.name))])
    }
}

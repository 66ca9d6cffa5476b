//! Build (defconfig) entity: one compiled configuration variant of a Job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::store::{Collection, FieldQuery};

use super::{field_query, Metadata, StoreDocument, SCHEMA_VERSION, UNKNOWN_STATUS};

/// Canonical build document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub id: Option<Uuid>,
    /// Synthetic lookup name: `{job}-{kernel}-{defconfig_full}-{arch}`.
    pub name: String,
    pub version: String,
    pub created_on: Option<DateTime<Utc>>,
    pub job: String,
    pub kernel: String,
    pub defconfig: String,
    pub defconfig_full: String,
    pub arch: String,
    pub job_id: Option<Uuid>,
    pub status: String,
    pub errors: i64,
    pub warnings: i64,
    pub build_time: f64,
    pub build_log: Option<String>,
    pub dirname: Option<String>,
    pub kconfig_fragments: Option<String>,
    pub dtb_dir: Option<String>,
    pub kernel_config: Option<String>,
    pub kernel_image: Option<String>,
    pub modules: Option<String>,
    pub modules_dir: Option<String>,
    pub system_map: Option<String>,
    pub text_offset: Option<String>,
    pub build_platform: Vec<JsonValue>,
    pub file_server_url: Option<String>,
    pub file_server_resource: Option<String>,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
    pub git_describe: Option<String>,
    pub git_url: Option<String>,
    pub metadata: Metadata,
    /// Diagnostics recorded while parsing; never persisted.
    #[serde(skip)]
    pub import_warnings: Vec<String>,
}

impl BuildReport {
    pub fn new(
        job: String,
        kernel: String,
        defconfig: String,
        defconfig_full: String,
        arch: String,
    ) -> Self {
        let name = build_name(&job, &kernel, &defconfig_full, &arch);
        BuildReport {
            id: None,
            name,
            version: SCHEMA_VERSION.to_string(),
            created_on: None,
            job,
            kernel,
            defconfig,
            defconfig_full,
            arch,
            job_id: None,
            status: UNKNOWN_STATUS.to_string(),
            errors: 0,
            warnings: 0,
            build_time: 0.0,
            build_log: None,
            dirname: None,
            kconfig_fragments: None,
            dtb_dir: None,
            kernel_config: None,
            kernel_image: None,
            modules: None,
            modules_dir: None,
            system_map: None,
            text_offset: None,
            build_platform: Vec::new(),
            file_server_url: None,
            file_server_resource: None,
            git_branch: None,
            git_commit: None,
            git_describe: None,
            git_url: None,
            metadata: Metadata::new(),
            import_warnings: Vec::new(),
        }
    }
}

/// Synthetic build lookup name shared by resolver and migrator.
pub fn build_name(job: &str, kernel: &str, defconfig_full: &str, arch: &str) -> String {
    format!("{}-{}-{}-{}", job, kernel, defconfig_full, arch)
}

impl StoreDocument for BuildReport {
    const COLLECTION: Collection = Collection::Build;

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

//! Boot report entity: the result of booting a Build on a lab board.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::store::{Collection, FieldQuery};

use super::{field_query, Metadata, StoreDocument, SCHEMA_VERSION, UNKNOWN_STATUS};

/// Canonical boot report document.
///
/// Git provenance fields are denormalized copies from the linked Build; once
/// set they are never overwritten by resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootReport {
    pub id: Option<Uuid>,
    /// Report name: `boot-{board}`. With `lab_name` it forms the natural key.
    pub name: String,
    pub version: String,
    pub created_on: Option<DateTime<Utc>>,
    pub board: String,
    pub board_instance: Option<String>,
    pub job: String,
    pub kernel: String,
    pub defconfig: String,
    pub defconfig_full: String,
    pub arch: String,
    pub lab_name: String,
    pub job_id: Option<Uuid>,
    pub build_id: Option<Uuid>,
    /// Boot duration as a time-of-day shape (hour fixed at zero).
    pub time: NaiveTime,
    pub status: String,
    pub warnings: i64,
    pub retries: i64,
    pub boot_log: Option<String>,
    pub boot_log_html: Option<String>,
    pub boot_result_description: Option<String>,
    pub dtb: Option<String>,
    pub dtb_addr: Option<String>,
    pub dtb_append: Option<String>,
    pub endian: Option<String>,
    pub fastboot: Option<bool>,
    pub fastboot_cmd: Option<String>,
    pub initrd: Option<String>,
    pub initrd_addr: Option<String>,
    pub load_addr: Option<String>,
    pub kernel_image: Option<String>,
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

impl BootReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: String,
        job: String,
        kernel: String,
        defconfig: String,
        defconfig_full: String,
        arch: String,
        lab_name: String,
    ) -> Self {
        let name = format!("boot-{}", board);
        BootReport {
            id: None,
            name,
            version: SCHEMA_VERSION.to_string(),
            created_on: None,
            board,
            board_instance: None,
            job,
            kernel,
            defconfig,
            defconfig_full,
            arch,
            lab_name,
            job_id: None,
            build_id: None,
            time: NaiveTime::MIN,
            status: UNKNOWN_STATUS.to_string(),
            warnings: 0,
            retries: 0,
            boot_log: None,
            boot_log_html: None,
            boot_result_description: None,
            dtb: None,
            dtb_addr: None,
            dtb_append: None,
            endian: None,
            fastboot: None,
            fastboot_cmd: None,
            initrd: None,
            initrd_addr: None,
            load_addr: None,
            kernel_image: None,
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

impl StoreDocument for BootReport {
    const COLLECTION: Collection = Collection::Boot;

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
        field_query(&[
            ("lab_name", json!(self.lab_name)),
            ("name", json!(self.name)),
        ])
    }
}

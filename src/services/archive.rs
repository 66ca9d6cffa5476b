//! Archival of raw boot report payloads.
//!
//! The raw producer document is written, pretty-printed, under a directory
//! tree derived from the report's context:
//!
//! `{root}/{job}/{kernel}/{arch}-{defconfig_full}/{lab_name}/boot-{board}.json`
//!
//! Re-archiving the same report overwrites the file in place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use tracing::info;

use crate::error::{ImportError, ImportResult};
use crate::models::BootReport;

fn write_error(path: &Path, err: std::io::Error) -> ImportError {
    ImportError::ArchiveWrite(format!("{}: {}", path.display(), err))
}

/// Destination path of a boot report inside the archive tree.
pub fn archive_path(boot: &BootReport, root: &Path) -> PathBuf {
    root.join(&boot.job)
        .join(&boot.kernel)
        .join(format!("{}-{}", boot.arch, boot.defconfig_full))
        .join(&boot.lab_name)
        .join(format!("{}.json", boot.name))
}

/// Archive the raw payload of a boot report, returning the file path.
pub fn archive_boot_report(
    boot: &BootReport,
    raw: &JsonValue,
    root: &Path,
) -> ImportResult<PathBuf> {
    let path = archive_path(boot, root);

    if let Some(dir) = path.parent() {
        // AlreadyExists is fine, the tree is shared across reports.
        fs::create_dir_all(dir).map_err(|err| write_error(dir, err))?;
    }

    let payload = serde_json::to_string_pretty(raw)
        .map_err(|err| ImportError::ArchiveWrite(err.to_string()))?;

    let mut file = fs::File::create(&path).map_err(|err| write_error(&path, err))?;
    file.write_all(payload.as_bytes())
        .map_err(|err| write_error(&path, err))?;

    info!("Archived boot report to {}", path.display());
    Ok(path)
}

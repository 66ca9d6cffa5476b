//! Import orchestration: parse, resolve, reconcile, archive.

use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ErrorMap, ImportError, ImportResult};
use crate::services::archive::archive_boot_report;
use crate::services::batch::{import_test_cases, import_test_sets};
use crate::services::parser::{parse_boot, parse_build, parse_job, parse_test_suite};
use crate::services::reconciler::save_or_update;
use crate::services::resolver::{resolve_boot_references, resolve_suite_references};
use crate::store::Store;

/// Import a job report. Returns the reconciliation status and identifier.
pub fn import_job(raw: &JsonValue, store: &dyn Store) -> ImportResult<(u16, Uuid)> {
    let mut job = parse_job(raw)?;
    let (status, id) = save_or_update(&mut job, store)?;
    info!("Imported job {} ({})", job.name, id);
    Ok((status, id))
}

/// Import a build report, linking it to its job when one exists.
pub fn import_build(raw: &JsonValue, store: &dyn Store) -> ImportResult<(u16, Uuid)> {
    let mut build = parse_build(raw)?;

    let job_name = format!("{}-{}", build.job, build.kernel);
    match crate::services::resolver::find_job_id(store, &job_name)? {
        Some(job_id) => build.job_id = Some(job_id),
        None => warn!("No job document found for build: {}", job_name),
    }

    let (status, id) = save_or_update(&mut build, store)?;
    info!("Imported build {} ({})", build.name, id);
    Ok((status, id))
}

/// Import a boot report: parse, resolve references, reconcile, archive.
///
/// `source_name` is the payload's file name when known, used as a last
/// resort for board-name inference. Archival failure is logged and does not
/// undo the already reconciled document.
pub fn import_boot_report(
    raw: &JsonValue,
    source_name: Option<&str>,
    store: &dyn Store,
    archive_root: &Path,
) -> ImportResult<(u16, Uuid)> {
    let mut boot = parse_boot(raw, source_name)?;
    resolve_boot_references(&mut boot, store)?;
    let (status, id) = save_or_update(&mut boot, store)?;

    if let Err(err) = archive_boot_report(&boot, raw, archive_root) {
        error!("Error archiving boot report {}: {}", boot.name, err);
    }

    info!("Imported boot report {}/{} ({})", boot.lab_name, boot.name, id);
    Ok((status, id))
}

/// Outcome of a test suite import, covering the suite document and all
/// nested sets and cases.
#[derive(Debug)]
pub struct SuiteImport {
    pub suite_id: Uuid,
    pub set_ids: Vec<Uuid>,
    pub case_ids: Vec<Uuid>,
    pub errors: ErrorMap,
}

fn pop_nested_list(raw: &mut JsonValue, key: &str) -> Vec<JsonValue> {
    match raw.as_object_mut().and_then(|obj| obj.remove(key)) {
        Some(JsonValue::Array(items)) => items,
        Some(other) => {
            warn!("Ignoring non-list {} value: {}", key, other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Import a test suite report, including its nested test sets and cases.
///
/// The suite must end up linked to a build; a suite whose build reference
/// cannot be resolved is rejected wholesale. Nested sets and cases fail
/// individually, collected in the outcome's error map.
pub fn import_test_suite(raw: &JsonValue, store: &dyn Store) -> ImportResult<SuiteImport> {
    let mut raw = raw.clone();
    let sets = pop_nested_list(&mut raw, "test_set");
    let cases = pop_nested_list(&mut raw, "test_case");

    let mut suite = parse_test_suite(&raw)?;
    resolve_suite_references(&mut suite, store)?;
    if suite.build_id.is_none() {
        return Err(ImportError::UnresolvedReference(format!(
            "no build document for test suite '{}'",
            suite.name
        )));
    }

    let (_, suite_id) = save_or_update(&mut suite, store)?;
    info!("Imported test suite {} ({})", suite.name, suite_id);

    let mut errors = ErrorMap::new();
    let case_outcome = import_test_cases(&cases, suite_id, None, store);
    let set_outcome = import_test_sets(&sets, suite_id, store);
    for outcome_errors in [case_outcome.errors, set_outcome.errors] {
        for (code, messages) in outcome_errors {
            errors.entry(code).or_default().extend(messages);
        }
    }

    Ok(SuiteImport {
        suite_id,
        set_ids: set_outcome.ids,
        case_ids: case_outcome.ids,
        errors,
    })
}

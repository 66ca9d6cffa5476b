//! Reference resolution: linking parsed entities to their stored parents.
//!
//! Resolution never overwrites a field the producer already supplied; lookup
//! results only fill gaps. A failed lookup leaves the reference unset and is
//! logged, never fatal here; whether a missing reference aborts the import
//! is the importer's policy per entity type.

use serde_json::{json, Value as JsonValue};
use tracing::warn;
use uuid::Uuid;

use crate::error::ImportResult;
use crate::models::build::build_name;
use crate::models::{field_query, BootReport, TestSuite};
use crate::store::{document_id, Collection, Store};

fn find_by_name(
    store: &dyn Store,
    collection: Collection,
    name: &str,
) -> ImportResult<Option<JsonValue>> {
    store.find_one(collection, &field_query(&[("name", json!(name))]))
}

fn doc_string(doc: &JsonValue, key: &str) -> Option<String> {
    doc.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn doc_uuid(doc: &JsonValue, key: &str) -> Option<Uuid> {
    doc.get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn backfill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Identifier of the job document with the given synthetic name.
pub fn find_job_id(store: &dyn Store, job_name: &str) -> ImportResult<Option<Uuid>> {
    Ok(find_by_name(store, Collection::Job, job_name)?
        .as_ref()
        .and_then(document_id))
}

/// Resolve a boot report's job and build references and denormalize git
/// provenance from the build. Both references are tolerated missing.
pub fn resolve_boot_references(boot: &mut BootReport, store: &dyn Store) -> ImportResult<()> {
    let job_name = format!("{}-{}", boot.job, boot.kernel);
    match find_by_name(store, Collection::Job, &job_name)? {
        Some(job) => boot.job_id = document_id(&job),
        None => warn!("No job document found for boot report: {}", job_name),
    }

    let build = build_name(&boot.job, &boot.kernel, &boot.defconfig_full, &boot.arch);
    match find_by_name(store, Collection::Build, &build)? {
        Some(build) => {
            boot.build_id = document_id(&build);
            backfill(&mut boot.git_branch, doc_string(&build, "git_branch"));
            backfill(&mut boot.git_commit, doc_string(&build, "git_commit"));
            backfill(&mut boot.git_describe, doc_string(&build, "git_describe"));
            backfill(&mut boot.git_url, doc_string(&build, "git_url"));
        }
        None => warn!("No build document found for boot report: {}", build),
    }

    Ok(())
}

/// Resolve a test suite's build, job and boot references and denormalize
/// board and build context from the linked documents.
///
/// The build is looked up by explicit identifier first, then by the name
/// reconstructed from the suite's own context fields. The suite is left
/// without a build reference when neither works; the importer treats that
/// as unresolvable.
pub fn resolve_suite_references(suite: &mut TestSuite, store: &dyn Store) -> ImportResult<()> {
    let build = match suite.build_id {
        Some(id) => store.find_by_id(Collection::Build, id)?,
        None => match (&suite.job, &suite.kernel, &suite.defconfig_full) {
            (Some(job), Some(kernel), Some(defconfig_full)) => {
                let arch = suite
                    .arch
                    .as_deref()
                    .unwrap_or(crate::services::parser::DEFAULT_ARCH);
                find_by_name(
                    store,
                    Collection::Build,
                    &build_name(job, kernel, defconfig_full, arch),
                )?
            }
            _ => None,
        },
    };

    match build {
        Some(build) => {
            suite.build_id = document_id(&build);
            if suite.job_id.is_none() {
                suite.job_id = doc_uuid(&build, "job_id");
            }
            backfill(&mut suite.job, doc_string(&build, "job"));
            backfill(&mut suite.kernel, doc_string(&build, "kernel"));
            backfill(&mut suite.defconfig, doc_string(&build, "defconfig"));
            backfill(&mut suite.defconfig_full, doc_string(&build, "defconfig_full"));
            backfill(&mut suite.arch, doc_string(&build, "arch"));
        }
        None => {
            // A claimed identifier that matches nothing is a dangling
            // reference; clear it so the caller sees the suite as unlinked.
            if let Some(id) = suite.build_id.take() {
                warn!(
                    "Test suite '{}' references unknown build {}",
                    suite.name, id
                );
            } else {
                warn!("No build document found for test suite: {}", suite.name);
            }
        }
    }

    if suite.job_id.is_none() {
        if let (Some(job), Some(kernel)) = (&suite.job, &suite.kernel) {
            let job_name = format!("{}-{}", job, kernel);
            if let Some(job_doc) = find_by_name(store, Collection::Job, &job_name)? {
                suite.job_id = document_id(&job_doc);
            }
        }
    }

    if let Some(boot_id) = suite.boot_id {
        match store.find_by_id(Collection::Boot, boot_id)? {
            Some(boot) => {
                backfill(&mut suite.board, doc_string(&boot, "board"));
                backfill(&mut suite.board_instance, doc_string(&boot, "board_instance"));
                backfill(&mut suite.lab_name, doc_string(&boot, "lab_name"));
            }
            None => warn!("No boot document {} for test suite: {}", boot_id, suite.name),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildReport, JobReport};
    use crate::services::reconciler::save_or_update;
    use crate::store::MemoryStore;

    fn seeded_store() -> (MemoryStore, Uuid, Uuid) {
        let store = MemoryStore::new();
        let mut job = JobReport::new("next".into(), "v4.1".into());
        let (_, job_id) = save_or_update(&mut job, &store).unwrap();

        let mut build = BuildReport::new(
            "next".into(),
            "v4.1".into(),
            "omap2plus_defconfig".into(),
            "omap2plus_defconfig".into(),
            "arm".into(),
        );
        build.job_id = Some(job_id);
        build.git_commit = Some("abcdef".into());
        build.git_url = Some("https://git.example.org/linux.git".into());
        let (_, build_id) = save_or_update(&mut build, &store).unwrap();

        (store, job_id, build_id)
    }

    #[test]
    fn boot_references_resolve_and_git_backfills() {
        let (store, job_id, build_id) = seeded_store();
        let mut boot = BootReport::new(
            "panda".into(),
            "next".into(),
            "v4.1".into(),
            "omap2plus_defconfig".into(),
            "omap2plus_defconfig".into(),
            "arm".into(),
            "lab-x".into(),
        );
        boot.git_commit = Some("fedcba".into());

        resolve_boot_references(&mut boot, &store).unwrap();

        assert_eq!(boot.job_id, Some(job_id));
        assert_eq!(boot.build_id, Some(build_id));
        // Producer-supplied value wins over the build's copy.
        assert_eq!(boot.git_commit.as_deref(), Some("fedcba"));
        assert_eq!(
            boot.git_url.as_deref(),
            Some("https://git.example.org/linux.git")
        );
    }

    #[test]
    fn boot_tolerates_missing_parents() {
        let store = MemoryStore::new();
        let mut boot = BootReport::new(
            "panda".into(),
            "next".into(),
            "v4.1".into(),
            "omap2plus_defconfig".into(),
            "omap2plus_defconfig".into(),
            "arm".into(),
            "lab-x".into(),
        );

        resolve_boot_references(&mut boot, &store).unwrap();

        assert_eq!(boot.job_id, None);
        assert_eq!(boot.build_id, None);
    }

    #[test]
    fn suite_resolves_build_by_context_and_denormalizes() {
        let (store, job_id, build_id) = seeded_store();
        let mut suite = TestSuite::new("boot-suite".into());
        suite.job = Some("next".into());
        suite.kernel = Some("v4.1".into());
        suite.defconfig_full = Some("omap2plus_defconfig".into());
        suite.arch = Some("arm".into());

        resolve_suite_references(&mut suite, &store).unwrap();

        assert_eq!(suite.build_id, Some(build_id));
        assert_eq!(suite.job_id, Some(job_id));
        assert_eq!(suite.defconfig.as_deref(), Some("omap2plus_defconfig"));
    }

    #[test]
    fn suite_resolves_build_by_explicit_id() {
        let (store, _, build_id) = seeded_store();
        let mut suite = TestSuite::new("boot-suite".into());
        suite.build_id = Some(build_id);

        resolve_suite_references(&mut suite, &store).unwrap();

        assert_eq!(suite.build_id, Some(build_id));
        assert_eq!(suite.job.as_deref(), Some("next"));
        assert_eq!(suite.kernel.as_deref(), Some("v4.1"));
    }

    #[test]
    fn suite_with_unknown_explicit_build_id_is_cleared() {
        let (store, _, _) = seeded_store();
        let mut suite = TestSuite::new("boot-suite".into());
        suite.build_id = Some(Uuid::new_v4());

        resolve_suite_references(&mut suite, &store).unwrap();

        assert_eq!(suite.build_id, None);
    }

    #[test]
    fn suite_boot_link_backfills_board_and_lab() {
        let (store, _, _) = seeded_store();
        let mut boot = BootReport::new(
            "panda".into(),
            "next".into(),
            "v4.1".into(),
            "omap2plus_defconfig".into(),
            "omap2plus_defconfig".into(),
            "arm".into(),
            "lab-x".into(),
        );
        let (_, boot_id) = save_or_update(&mut boot, &store).unwrap();

        let mut suite = TestSuite::new("boot-suite".into());
        suite.boot_id = Some(boot_id);
        suite.job = Some("next".into());
        suite.kernel = Some("v4.1".into());
        suite.defconfig_full = Some("omap2plus_defconfig".into());

        resolve_suite_references(&mut suite, &store).unwrap();

        assert_eq!(suite.board.as_deref(), Some("panda"));
        assert_eq!(suite.lab_name.as_deref(), Some("lab-x"));
    }
}

//! End-to-end pipeline tests over the SQLite-backed store.
//!
//! Covers the full import chain (job, build, boot, test suite with nested
//! sets and cases), re-import identity, archival layout, and legacy schema
//! migration.

use serde_json::{json, Value as JsonValue};

use kernel_report_ingest::services::importer::{
    import_boot_report, import_build, import_job, import_test_suite,
};
use kernel_report_ingest::services::migrate::{run_migration, MigrationContext};
use kernel_report_ingest::services::reconciler::{STATUS_CREATED, STATUS_UPDATED};
use kernel_report_ingest::store::{Collection, SqliteStore, Store};

fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    import_job(&json!({"job": "next", "kernel": "next-20260815"}), &store).unwrap();
    import_build(
        &json!({
            "job": "next",
            "kernel": "next-20260815",
            "defconfig": "omap2plus_defconfig",
            "arch": "arm",
            "git_commit": "abcdef012345",
            "git_url": "https://git.example.org/linux.git"
        }),
        &store,
    )
    .unwrap();
    store
}

fn boot_payload() -> JsonValue {
    json!({
        "job": "next",
        "kernel": "next-20260815",
        "defconfig": "omap2plus_defconfig",
        "lab_name": "lab-collabora",
        "board": "beaglebone-black",
        "boot_time": 28.07,
        "boot_result": "PASS",
        "dtb": "dtbs/am335x-boneblack.dtb"
    })
}

#[test]
fn boot_import_links_parents_and_archives_raw_payload() {
    let store = seeded_store();
    let archive = tempfile::tempdir().unwrap();

    let (status, id) = import_boot_report(&boot_payload(), None, &store, archive.path()).unwrap();
    assert_eq!(status, STATUS_CREATED);

    let stored = store.find_by_id(Collection::Boot, id).unwrap().unwrap();
    assert!(stored["job_id"].is_string());
    assert!(stored["build_id"].is_string());
    // Git provenance denormalized from the build.
    assert_eq!(stored["git_commit"], "abcdef012345");
    // 28.07 seconds as a time-of-day shape.
    assert_eq!(stored["time"], "00:00:28.070");

    let archived = archive
        .path()
        .join("next/next-20260815/arm-omap2plus_defconfig/lab-collabora/boot-beaglebone-black.json");
    assert!(archived.is_file());
    let raw: JsonValue = serde_json::from_str(&std::fs::read_to_string(archived).unwrap()).unwrap();
    assert_eq!(raw, boot_payload());
}

#[test]
fn re_import_preserves_identity_and_creation_time() {
    let store = seeded_store();
    let archive = tempfile::tempdir().unwrap();

    let (_, first_id) = import_boot_report(&boot_payload(), None, &store, archive.path()).unwrap();
    let first = store.find_by_id(Collection::Boot, first_id).unwrap().unwrap();

    let mut payload = boot_payload();
    payload["boot_result"] = json!("FAIL");
    let (status, second_id) =
        import_boot_report(&payload, None, &store, archive.path()).unwrap();

    assert_eq!(status, STATUS_UPDATED);
    assert_eq!(second_id, first_id);
    assert_eq!(store.count(Collection::Boot).unwrap(), 1);

    let second = store.find_by_id(Collection::Boot, second_id).unwrap().unwrap();
    assert_eq!(second["created_on"], first["created_on"]);
    assert_eq!(second["status"], "FAIL");
}

#[test]
fn same_board_in_two_labs_stays_distinct() {
    let store = seeded_store();
    let archive = tempfile::tempdir().unwrap();

    import_boot_report(&boot_payload(), None, &store, archive.path()).unwrap();
    let mut other_lab = boot_payload();
    other_lab["lab_name"] = json!("lab-baylibre");
    import_boot_report(&other_lab, None, &store, archive.path()).unwrap();

    assert_eq!(store.count(Collection::Boot).unwrap(), 2);
}

#[test]
fn suite_import_writes_hierarchy_with_back_references() {
    let store = seeded_store();

    let outcome = import_test_suite(
        &json!({
            "name": "kselftest",
            "job": "next",
            "kernel": "next-20260815",
            "defconfig_full": "omap2plus_defconfig",
            "arch": "arm",
            "test_set": [{
                "name": "timers",
                "test_case": [
                    {"name": "posix-timers", "status": "PASS"},
                    {"name": "nanosleep", "status": "FAIL"}
                ]
            }]
        }),
        &store,
    )
    .unwrap();

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.set_ids.len(), 1);

    let suite = store
        .find_by_id(Collection::TestSuite, outcome.suite_id)
        .unwrap()
        .unwrap();
    assert!(suite["build_id"].is_string());

    let set = store
        .find_by_id(Collection::TestSet, outcome.set_ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(set["test_suite_id"], json!(outcome.suite_id.to_string()));
    assert_eq!(set["test_case"].as_array().unwrap().len(), 2);

    for case_id in set["test_case"].as_array().unwrap() {
        let case_id = case_id.as_str().unwrap().parse().unwrap();
        let case = store
            .find_by_id(Collection::TestCase, case_id)
            .unwrap()
            .unwrap();
        assert_eq!(case["test_set_id"], set["id"]);
        assert_eq!(case["test_suite_id"], suite["id"]);
    }
}

#[test]
fn partial_suite_failures_are_isolated_and_bucketed() {
    let store = seeded_store();

    let outcome = import_test_suite(
        &json!({
            "name": "kselftest",
            "job": "next",
            "kernel": "next-20260815",
            "defconfig_full": "omap2plus_defconfig",
            "arch": "arm",
            "test_case": [
                {"name": "ok-case"},
                {"status": "PASS"},
                {"name": "none", "status": "PASS"}
            ]
        }),
        &store,
    )
    .unwrap();

    // The nameless case and the null-sentinel name both fail parse-side.
    assert_eq!(outcome.case_ids.len(), 1);
    assert_eq!(outcome.errors[&400].len(), 2);
    assert_eq!(store.count(Collection::TestCase).unwrap(), 1);
}

#[test]
fn legacy_store_migrates_end_to_end() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .insert(
            Collection::Job,
            json!({
                "job": "mainline",
                "kernel": "v4.1-rc3",
                "metadata": {"git_commit": "0123abcd"}
            }),
        )
        .unwrap();
    store
        .insert(
            Collection::Build,
            json!({
                "job": "mainline",
                "kernel": "v4.1-rc3",
                "defconfig": "x86-allnoconfig",
                "metadata": {"git_commit": "0123abcd"}
            }),
        )
        .unwrap();
    store
        .insert(
            Collection::Boot,
            json!({
                "job": "mainline",
                "kernel": "v4.1-rc3",
                "defconfig": "x86-allnoconfig",
                "board": "qemu-x86",
                "time": 12.0
            }),
        )
        .unwrap();

    let mut ctx = MigrationContext::new("lab-legacy".into(), None);
    let stats = run_migration(&store, &mut ctx).unwrap();
    assert_eq!(stats.migrated, 3);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.remap_misses, 0);

    let boots = store.list(Collection::Boot, None).unwrap();
    assert_eq!(boots.len(), 1);
    let boot = &boots[0];
    assert_eq!(boot["version"], "1.0");
    assert_eq!(boot["arch"], "x86");
    assert_eq!(boot["defconfig"], "allnoconfig");
    assert_eq!(boot["lab_name"], "lab-legacy");
    assert!(boot["build_id"].is_string());
    assert!(boot["job_id"].is_string());

    // A second run finds nothing left to do.
    let mut ctx = MigrationContext::new("lab-legacy".into(), None);
    let stats = run_migration(&store, &mut ctx).unwrap();
    assert_eq!(stats.migrated, 0);
    assert_eq!(stats.skipped, 3);
}

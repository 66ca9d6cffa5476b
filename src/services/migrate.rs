//! Legacy schema migration.
//!
//! Documents written before the versioned schema carry no `version` marker,
//! keep git provenance inside their metadata bag, name the build after its
//! raw configuration file, and reference parents by name instead of by
//! identifier. Migration rewrites each collection in dependency order (jobs,
//! builds, boots), remapping parent references through name-keyed tables
//! built as it goes. Running it again over an already migrated store is a
//! no-op apart from the scan itself.
//!
//! A document that cannot be parsed is logged and counted but never halts
//! the run. Each legacy document is deleted before its canonical form is
//! inserted, so a write failure costs that one document rather than leaving
//! a duplicate under the same synthetic name; a failed delete halts the
//! whole run to avoid a mixed legacy/canonical collection.

use std::collections::HashMap;

use chrono::NaiveTime;
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ImportResult;
use crate::models::build::build_name;
use crate::models::{StoreDocument, SCHEMA_VERSION};
use crate::services::parser::{
    infer_architecture, parse_boot, parse_build, parse_job, time_of_day_from_seconds,
};
use crate::store::{document_id, Collection, Store};

/// Canonical fields of an already migrated build, kept for remapping boot
/// references without a second store round trip.
#[derive(Debug, Clone)]
pub struct BuildRemap {
    pub id: Uuid,
    pub defconfig: String,
    pub defconfig_full: String,
    pub arch: String,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
    pub git_describe: Option<String>,
    pub git_url: Option<String>,
}

/// Migration settings plus the remap tables built while it runs.
pub struct MigrationContext {
    /// Lab name assigned to legacy boot reports that carry none.
    pub lab_name: String,
    /// Bound on the number of documents scanned per collection.
    pub limit: Option<usize>,
    job_ids: HashMap<String, Uuid>,
    builds: HashMap<String, BuildRemap>,
}

impl MigrationContext {
    pub fn new(lab_name: String, limit: Option<usize>) -> Self {
        MigrationContext {
            lab_name,
            limit,
            job_ids: HashMap::new(),
            builds: HashMap::new(),
        }
    }
}

/// Counters for one migration run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationStats {
    pub scanned: u64,
    pub migrated: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Boots migrated without a parent link because no remap entry matched.
    pub remap_misses: u64,
}

fn is_migrated(doc: &JsonValue) -> bool {
    doc.get("version").and_then(|v| v.as_str()) == Some(SCHEMA_VERSION)
}

fn doc_string(doc: &JsonValue, key: &str) -> Option<String> {
    doc.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Move metadata entries that take priority over their top-level
/// counterparts. Legacy producers wrote the authoritative value into the
/// metadata bag, so for these keys the bag wins.
fn override_from_metadata(raw: &mut JsonValue, mappings: &[(&str, &str)]) {
    let overrides: Vec<(String, JsonValue)> =
        match raw.get_mut("metadata").and_then(|meta| meta.as_object_mut()) {
            Some(meta) => mappings
                .iter()
                .filter_map(|(source, target)| {
                    meta.remove(*source).map(|value| ((*target).to_string(), value))
                })
                .collect(),
            None => return,
        };
    if let Some(obj) = raw.as_object_mut() {
        for (key, value) in overrides {
            obj.insert(key, value);
        }
    }
}

/// Promote metadata-bag entries to top level, existing keys winning.
fn fold_metadata(raw: &JsonValue) -> JsonValue {
    let mut doc = raw.clone();
    let meta = doc.as_object_mut().and_then(|obj| obj.remove("metadata"));
    if let (Some(obj), Some(JsonValue::Object(meta))) = (doc.as_object_mut(), meta) {
        for (key, value) in meta {
            obj.entry(key).or_insert(value);
        }
    }
    doc
}

/// Turn a kconfig fragments file name of the `frag-X.config` shape into the
/// full configuration name `{defconfig}+X`.
fn defconfig_full_from_fragments(defconfig: &str, fragments: Option<&str>) -> Option<String> {
    let name = fragments?
        .strip_prefix("frag-")?
        .strip_suffix(".config")?;
    Some(format!("{}+{}", defconfig, name))
}

/// Replace a legacy document with its canonical form: delete the old one,
/// then insert the new. A crash between the two loses the document; the
/// reverse order would instead leave two documents sharing a synthetic name
/// after a re-run. The delete error propagates; an insert error is reported
/// back as `None`.
fn swap_document<T: StoreDocument>(
    store: &dyn Store,
    entity: &mut T,
    legacy_id: Option<Uuid>,
) -> ImportResult<Option<Uuid>> {
    if let Some(legacy_id) = legacy_id {
        store.delete(T::COLLECTION, legacy_id)?;
    }

    match serde_json::to_value(&entity)
        .map_err(Into::into)
        .and_then(|doc| store.insert(T::COLLECTION, doc))
    {
        Ok(id) => {
            entity.set_id(id);
            Ok(Some(id))
        }
        Err(err) => {
            error!("Error writing migrated {} document: {}", T::COLLECTION, err);
            Ok(None)
        }
    }
}

fn record_build_remap(ctx: &mut MigrationContext, remap: BuildRemap, job: &str, kernel: &str) {
    let key = build_name(job, kernel, &remap.defconfig_full, &remap.arch);
    ctx.builds.insert(key, remap);
}

/// Migrate the job collection, filling the job remap table.
pub fn migrate_job_collection(
    store: &dyn Store,
    ctx: &mut MigrationContext,
    stats: &mut MigrationStats,
) -> ImportResult<()> {
    for doc in store.list(Collection::Job, ctx.limit)? {
        stats.scanned += 1;

        if is_migrated(&doc) {
            stats.skipped += 1;
            if let (Some(name), Some(id)) = (doc_string(&doc, "name"), document_id(&doc)) {
                ctx.job_ids.insert(name, id);
            }
            continue;
        }

        let legacy_id = document_id(&doc);
        let mut job = match parse_job(&fold_metadata(&doc)) {
            Ok(job) => job,
            Err(err) => {
                error!("Error migrating job document {:?}: {}", legacy_id, err);
                stats.errors += 1;
                continue;
            }
        };

        match swap_document(store, &mut job, legacy_id)? {
            Some(id) => {
                ctx.job_ids.insert(job.name.clone(), id);
                stats.migrated += 1;
            }
            None => stats.errors += 1,
        }
    }

    Ok(())
}

/// Migrate the build collection, filling the build remap table.
pub fn migrate_build_collection(
    store: &dyn Store,
    ctx: &mut MigrationContext,
    stats: &mut MigrationStats,
) -> ImportResult<()> {
    for doc in store.list(Collection::Build, ctx.limit)? {
        stats.scanned += 1;

        if is_migrated(&doc) {
            stats.skipped += 1;
            if let (Some(id), Some(job), Some(kernel), Some(defconfig), Some(full), Some(arch)) = (
                document_id(&doc),
                doc_string(&doc, "job"),
                doc_string(&doc, "kernel"),
                doc_string(&doc, "defconfig"),
                doc_string(&doc, "defconfig_full"),
                doc_string(&doc, "arch"),
            ) {
                let remap = BuildRemap {
                    id,
                    defconfig,
                    defconfig_full: full,
                    arch,
                    git_branch: doc_string(&doc, "git_branch"),
                    git_commit: doc_string(&doc, "git_commit"),
                    git_describe: doc_string(&doc, "git_describe"),
                    git_url: doc_string(&doc, "git_url"),
                };
                record_build_remap(ctx, remap, &job, &kernel);
            }
            continue;
        }

        let legacy_id = document_id(&doc);
        // Legacy builds keep the authoritative result fields inside the
        // metadata bag, under `build_`-prefixed names.
        let mut raw = doc.clone();
        override_from_metadata(
            &mut raw,
            &[
                ("build_errors", "errors"),
                ("build_warnings", "warnings"),
                ("build_result", "status"),
                ("build_time", "build_time"),
                ("build_log", "build_log"),
            ],
        );
        let folded = fold_metadata(&raw);
        let mut build = match parse_build(&folded) {
            Ok(build) => build,
            Err(err) => {
                error!("Error migrating build document {:?}: {}", legacy_id, err);
                stats.errors += 1;
                continue;
            }
        };

        // Legacy builds derive the full configuration name from their
        // kconfig fragments file instead of carrying it outright.
        if build.defconfig_full == build.defconfig {
            if let Some(full) =
                defconfig_full_from_fragments(&build.defconfig, build.kconfig_fragments.as_deref())
            {
                build.name = build_name(&build.job, &build.kernel, &full, &build.arch);
                build.defconfig_full = full;
            }
        }
        build.job_id = ctx
            .job_ids
            .get(&format!("{}-{}", build.job, build.kernel))
            .copied();
        if build.file_server_resource.is_none() {
            build.file_server_resource = Some(format!(
                "/{}/{}/{}-{}",
                build.job, build.kernel, build.arch, build.defconfig_full
            ));
        }

        match swap_document(store, &mut build, legacy_id)? {
            Some(id) => {
                let remap = BuildRemap {
                    id,
                    defconfig: build.defconfig.clone(),
                    defconfig_full: build.defconfig_full.clone(),
                    arch: build.arch.clone(),
                    git_branch: build.git_branch.clone(),
                    git_commit: build.git_commit.clone(),
                    git_describe: build.git_describe.clone(),
                    git_url: build.git_url.clone(),
                };
                record_build_remap(ctx, remap, &build.job, &build.kernel);
                stats.migrated += 1;
            }
            None => stats.errors += 1,
        }
    }

    Ok(())
}

/// Legacy boot duration: a bare number of seconds, or an already formatted
/// time-of-day string. Anything else is the zero time.
fn legacy_boot_time(value: Option<&JsonValue>) -> NaiveTime {
    match value {
        Some(JsonValue::Number(n)) => {
            time_of_day_from_seconds(n.as_f64().unwrap_or(0.0)).0
        }
        Some(JsonValue::String(s)) => s.parse::<NaiveTime>().unwrap_or(NaiveTime::MIN),
        _ => NaiveTime::MIN,
    }
}

/// Migrate the boot collection, remapping parent references through the
/// tables built by the job and build passes.
pub fn migrate_boot_collection(
    store: &dyn Store,
    ctx: &mut MigrationContext,
    stats: &mut MigrationStats,
) -> ImportResult<()> {
    for doc in store.list(Collection::Boot, ctx.limit)? {
        stats.scanned += 1;

        if is_migrated(&doc) {
            stats.skipped += 1;
            continue;
        }

        let legacy_id = document_id(&doc);
        let lab_from_metadata = doc
            .get("metadata")
            .and_then(|meta| meta.get("lab_name"))
            .is_some();
        let meta_defconfig_full = doc
            .get("metadata")
            .and_then(|meta| meta.get("defconfig_full"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        // The metadata bag's full configuration name beats any top-level
        // value a legacy boot carries.
        let mut raw = doc.clone();
        override_from_metadata(&mut raw, &[("defconfig_full", "defconfig_full")]);
        let mut folded = fold_metadata(&raw);
        let time = folded.as_object_mut().and_then(|obj| obj.remove("time"));

        if let Some(obj) = folded.as_object_mut() {
            if !obj.contains_key("lab_name") {
                obj.insert("lab_name".into(), JsonValue::String(ctx.lab_name.clone()));
            }
            // Legacy boots may still name the configuration with its
            // architecture prefix; strip it the way builds do.
            if let Some(defconfig) = obj.get("defconfig").and_then(|v| v.as_str()) {
                let inference = infer_architecture(defconfig, None);
                if !inference.defaulted {
                    obj.insert("defconfig".into(), JsonValue::String(inference.base_name));
                    obj.entry("arch")
                        .or_insert(JsonValue::String(inference.arch));
                }
            }
        }

        let mut boot = match parse_boot(&folded, None) {
            Ok(boot) => boot,
            Err(err) => {
                error!("Error migrating boot document {:?}: {}", legacy_id, err);
                stats.errors += 1;
                continue;
            }
        };
        boot.time = legacy_boot_time(time.as_ref());

        boot.job_id = ctx
            .job_ids
            .get(&format!("{}-{}", boot.job, boot.kernel))
            .copied();

        let build_key = build_name(&boot.job, &boot.kernel, &boot.defconfig_full, &boot.arch);
        match ctx.builds.get(&build_key) {
            Some(remap) => {
                boot.build_id = Some(remap.id);
                if boot.defconfig != remap.defconfig {
                    warn!(
                        "Boot {}/{} config name '{}' differs from build's '{}'",
                        boot.lab_name, boot.name, boot.defconfig, remap.defconfig
                    );
                }
                boot.defconfig = remap.defconfig.clone();
                if meta_defconfig_full.is_none() {
                    boot.defconfig_full = remap.defconfig_full.clone();
                }
                if boot.git_branch.is_none() {
                    boot.git_branch = remap.git_branch.clone();
                }
                if boot.git_commit.is_none() {
                    boot.git_commit = remap.git_commit.clone();
                }
                if boot.git_describe.is_none() {
                    boot.git_describe = remap.git_describe.clone();
                }
                if boot.git_url.is_none() {
                    boot.git_url = remap.git_url.clone();
                }
            }
            None => {
                error!(
                    "No build remap entry for boot {}/{}: {}",
                    boot.lab_name, boot.name, build_key
                );
                stats.remap_misses += 1;
            }
        }

        // Boots that never carried a lab name get the default resource path.
        if !lab_from_metadata && boot.file_server_resource.is_none() {
            boot.file_server_resource = Some(format!(
                "/{}/{}/{}-{}/",
                boot.job, boot.kernel, boot.arch, boot.defconfig_full
            ));
        }

        match swap_document(store, &mut boot, legacy_id)? {
            Some(_) => stats.migrated += 1,
            None => stats.errors += 1,
        }
    }

    Ok(())
}

/// Run the full migration: jobs, builds, boots, in that order.
pub fn run_migration(store: &dyn Store, ctx: &mut MigrationContext) -> ImportResult<MigrationStats> {
    let mut stats = MigrationStats::default();

    migrate_job_collection(store, ctx, &mut stats)?;
    migrate_build_collection(store, ctx, &mut stats)?;
    migrate_boot_collection(store, ctx, &mut stats)?;

    if stats.errors > 0 || stats.remap_misses > 0 {
        warn!(
            "Migration finished with problems: {} errors, {} remap misses",
            stats.errors, stats.remap_misses
        );
    }
    info!(
        "Migration done: {} scanned, {} migrated, {} already current",
        stats.scanned, stats.migrated, stats.skipped
    );

    Ok(stats)
}

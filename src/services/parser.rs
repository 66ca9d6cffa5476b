//! Report parsing: heterogeneous JSON documents into canonical entities.
//!
//! Each entity type has a declarative field-specification table (key,
//! required?, null-rejection, default, transform) interpreted by one generic
//! extractor. Mandatory keys that are absent fail with `MissingField`;
//! mandatory keys holding a null-equivalent sentinel fail with
//! `InvalidValue`. Unknown keys are never discarded: they land in the
//! entity's residual metadata bag, together with the contents of an explicit
//! `metadata` object. The input document is never mutated.

use std::path::Path;

use chrono::NaiveTime;
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ImportError, ImportResult};
use crate::models::{
    BootReport, BuildReport, JobReport, Metadata, TestCase, TestSet, TestSuite, SCHEMA_VERSION,
    UNKNOWN_STATUS,
};

/// Default architecture applied when no inference source matches.
pub const DEFAULT_ARCH: &str = "arm";

/// Fixed prefix table for architecture inference on configuration names.
const ARCH_PREFIXES: &[(&str, &str)] = &[("arm-", "arm"), ("arm64-", "arm64"), ("x86-", "x86")];

/// String sentinels standing in for null, matched in any case.
const NULL_SENTINELS: &[&str] = &["null", "none"];

/// Pattern marking a dtb that lives in a temporary directory; such artifact
/// names produce weird board names and are excluded from board inference.
const TMP_DIR_PATTERN: &str = "tmp";

// ============================================================================
// Field specifications
// ============================================================================

/// Value transform applied to a present, non-null field.
pub type Transform = fn(JsonValue) -> JsonValue;

/// One entry of an entity's field-specification table.
pub struct FieldSpec {
    pub key: &'static str,
    /// Absence is a `MissingField` error.
    pub required: bool,
    /// A null-equivalent sentinel value is an `InvalidValue` error.
    pub reject_null: bool,
    pub default: Option<fn() -> JsonValue>,
    pub transform: Option<Transform>,
}

impl FieldSpec {
    const fn mandatory(key: &'static str) -> Self {
        FieldSpec {
            key,
            required: true,
            reject_null: true,
            default: None,
            transform: None,
        }
    }

    const fn optional(key: &'static str) -> Self {
        FieldSpec {
            key,
            required: false,
            reject_null: false,
            default: None,
            transform: None,
        }
    }

    /// Optional key whose explicit value must still not be a null sentinel.
    const fn optional_non_null(key: &'static str) -> Self {
        FieldSpec {
            key,
            required: false,
            reject_null: true,
            default: None,
            transform: None,
        }
    }

    const fn numeric(key: &'static str) -> Self {
        FieldSpec {
            key,
            required: false,
            reject_null: false,
            default: None,
            transform: Some(to_number),
        }
    }
}

/// Coerce string-typed numbers into JSON numbers; anything else passes
/// through untouched.
fn to_number(value: JsonValue) -> JsonValue {
    match &value {
        JsonValue::String(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                JsonValue::from(i)
            } else if let Ok(f) = s.trim().parse::<f64>() {
                JsonValue::from(f)
            } else {
                value
            }
        }
        _ => value,
    }
}

/// Check whether a value is a null-equivalent sentinel: JSON null, an empty
/// string, or one of the literal null strings in any case.
pub fn is_null_equivalent(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => {
            let trimmed = s.trim();
            trimmed.is_empty()
                || NULL_SENTINELS
                    .iter()
                    .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
        }
        _ => false,
    }
}

/// Extraction result: canonical fields plus the residual metadata bag.
pub struct Extracted {
    fields: Metadata,
    pub residual: Metadata,
}

impl Extracted {
    fn take(&mut self, key: &str) -> Option<JsonValue> {
        self.fields.remove(key)
    }

    pub fn take_string(&mut self, key: &str) -> Option<String> {
        self.take(key).and_then(|v| match v {
            JsonValue::String(s) => Some(s),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn require_string(&mut self, key: &str) -> ImportResult<String> {
        self.take_string(key)
            .ok_or_else(|| ImportError::MissingField(key.to_string()))
    }

    pub fn take_i64(&mut self, key: &str, default: i64) -> i64 {
        self.take(key)
            .and_then(|v| match v {
                JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            })
            .unwrap_or(default)
    }

    pub fn take_f64(&mut self, key: &str, default: f64) -> f64 {
        self.take(key)
            .and_then(|v| match v {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .unwrap_or(default)
    }

    pub fn take_bool(&mut self, key: &str) -> Option<bool> {
        self.take(key).and_then(|v| v.as_bool())
    }

    pub fn take_uuid(&mut self, key: &str) -> Option<Uuid> {
        self.take(key)
            .and_then(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
    }

    pub fn take_array(&mut self, key: &str) -> Vec<JsonValue> {
        self.take(key)
            .and_then(|v| match v {
                JsonValue::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Interpret a field-specification table against a raw document.
///
/// Builds a new canonical record and a separate residual container; the raw
/// input is never mutated. The residual bag receives the contents of an
/// explicit `metadata` object plus every key the table does not know about.
pub fn extract(raw: &JsonValue, specs: &[FieldSpec]) -> ImportResult<Extracted> {
    let obj = raw.as_object().ok_or_else(|| ImportError::InvalidValue {
        key: "<document>".to_string(),
        value: "not a JSON object".to_string(),
    })?;

    let mut remaining = obj.clone();
    let mut fields = Metadata::new();

    for spec in specs {
        match remaining.remove(spec.key) {
            Some(value) => {
                if is_null_equivalent(&value) {
                    if spec.reject_null {
                        return Err(ImportError::InvalidValue {
                            key: spec.key.to_string(),
                            value: value.to_string(),
                        });
                    }
                    if let Some(default) = spec.default {
                        fields.insert(spec.key.to_string(), default());
                    }
                } else {
                    let value = match spec.transform {
                        Some(transform) => transform(value),
                        None => value,
                    };
                    fields.insert(spec.key.to_string(), value);
                }
            }
            None => {
                if spec.required {
                    return Err(ImportError::MissingField(spec.key.to_string()));
                }
                if let Some(default) = spec.default {
                    fields.insert(spec.key.to_string(), default());
                }
            }
        }
    }

    let mut residual = Metadata::new();
    if let Some(JsonValue::Object(meta)) = remaining.remove("metadata") {
        residual.extend(meta);
    }
    residual.extend(remaining);

    Ok(Extracted { fields, residual })
}

// ============================================================================
// Inference helpers
// ============================================================================

/// Architecture inferred from a configuration name and directory hint.
pub struct ArchInference {
    /// Configuration name with a recognized prefix stripped.
    pub base_name: String,
    pub arch: String,
    /// True when neither the name nor the hint matched and the default was
    /// applied; callers record a warning in that case.
    pub defaulted: bool,
}

fn arch_from_prefix(name: &str) -> Option<&'static str> {
    ARCH_PREFIXES
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|(_, arch)| *arch)
}

/// Infer the architecture: fixed prefix table against the configuration
/// name first, then a directory-name hint, defaulting to `arm`.
pub fn infer_architecture(config_name: &str, dirname: Option<&str>) -> ArchInference {
    if let Some((prefix, arch)) = ARCH_PREFIXES
        .iter()
        .find(|(prefix, _)| config_name.starts_with(prefix))
    {
        return ArchInference {
            base_name: config_name[prefix.len()..].to_string(),
            arch: (*arch).to_string(),
            defaulted: false,
        };
    }

    if let Some(arch) = dirname.and_then(arch_from_prefix) {
        return ArchInference {
            base_name: config_name.to_string(),
            arch: arch.to_string(),
            defaulted: false,
        };
    }

    ArchInference {
        base_name: config_name.to_string(),
        arch: DEFAULT_ARCH.to_string(),
        defaulted: true,
    }
}

fn file_stem(name: &str) -> Option<String> {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

/// Derive a board name when the report does not carry one: from the dtb
/// artifact name (excluding temporary-directory artifacts), else from the
/// report's own file/source name with the `boot-` prefix stripped.
pub fn infer_board(dtb: Option<&str>, source_name: Option<&str>) -> Option<String> {
    if let Some(dtb) = dtb {
        if !dtb.contains(TMP_DIR_PATTERN) {
            if let Some(stem) = file_stem(dtb) {
                return Some(stem);
            }
        }
    }

    source_name.and_then(|source| {
        let base = Path::new(source)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(source);
        let stripped = base.strip_prefix("boot-").unwrap_or(base);
        let board = file_stem(stripped)?;
        info!("Using boot report file name for board name: {}", board);
        Some(board)
    })
}

/// Convert a duration in seconds into a time-of-day shape: hour fixed at
/// zero, minute/second by integer division and modulo, microseconds from the
/// sub-second remainder. Negative input clamps to zero; a magnitude that
/// does not fit the shape clamps to the zero time-of-day and reports `true`
/// in the second tuple slot so callers can record a warning.
pub fn time_of_day_from_seconds(seconds: f64) -> (NaiveTime, bool) {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };
    if seconds == 0.0 {
        return (NaiveTime::MIN, false);
    }

    let whole = seconds.trunc();
    let micros = ((seconds - whole) * 1_000_000.0).round() as u32;
    if whole > i64::MAX as f64 {
        return (NaiveTime::MIN, true);
    }
    let whole = whole as i64;
    let minute = whole / 60;
    let second = whole % 60;
    if minute > 59 {
        return (NaiveTime::MIN, true);
    }

    match NaiveTime::from_hms_micro_opt(0, minute as u32, second as u32, micros) {
        Some(time) => (time, false),
        None => (NaiveTime::MIN, true),
    }
}

// ============================================================================
// Job
// ============================================================================

const JOB_FIELDS: &[FieldSpec] = &[
    FieldSpec::mandatory("job"),
    FieldSpec::mandatory("kernel"),
    FieldSpec::optional("status"),
    FieldSpec::optional("private"),
    FieldSpec::optional("git_branch"),
    FieldSpec::optional("git_commit"),
    FieldSpec::optional("git_describe"),
    FieldSpec::optional("git_url"),
    FieldSpec::optional("version"),
];

/// Parse a job report document.
pub fn parse_job(raw: &JsonValue) -> ImportResult<JobReport> {
    let mut ex = extract(raw, JOB_FIELDS)?;

    let job = ex.require_string("job")?;
    let kernel = ex.require_string("kernel")?;

    let mut doc = JobReport::new(job, kernel);
    if let Some(status) = ex.take_string("status") {
        doc.status = status;
    }
    doc.private = ex.take_bool("private").unwrap_or(false);
    doc.git_branch = ex.take_string("git_branch");
    doc.git_commit = ex.take_string("git_commit");
    doc.git_describe = ex.take_string("git_describe");
    doc.git_url = ex.take_string("git_url");
    doc.version = ex
        .take_string("version")
        .unwrap_or_else(|| SCHEMA_VERSION.to_string());
    doc.metadata = ex.residual;

    Ok(doc)
}

// ============================================================================
// Build
// ============================================================================

const BUILD_FIELDS: &[FieldSpec] = &[
    FieldSpec::mandatory("job"),
    FieldSpec::mandatory("kernel"),
    FieldSpec::mandatory("defconfig"),
    FieldSpec::optional("defconfig_full"),
    FieldSpec::optional("arch"),
    FieldSpec::optional("dirname"),
    FieldSpec::optional("status"),
    FieldSpec::numeric("errors"),
    FieldSpec::numeric("warnings"),
    FieldSpec::numeric("build_time"),
    FieldSpec::optional("build_log"),
    FieldSpec::optional("kconfig_fragments"),
    FieldSpec::optional("dtb_dir"),
    FieldSpec::optional("kernel_config"),
    FieldSpec::optional("kernel_image"),
    FieldSpec::optional("modules"),
    FieldSpec::optional("modules_dir"),
    FieldSpec::optional("system_map"),
    FieldSpec::optional("text_offset"),
    FieldSpec::optional("build_platform"),
    FieldSpec::optional("file_server_url"),
    FieldSpec::optional("file_server_resource"),
    FieldSpec::optional("git_branch"),
    FieldSpec::optional("git_commit"),
    FieldSpec::optional("git_describe"),
    FieldSpec::optional("git_url"),
    FieldSpec::optional("version"),
];

/// Parse a build (defconfig) report document.
pub fn parse_build(raw: &JsonValue) -> ImportResult<BuildReport> {
    let mut ex = extract(raw, BUILD_FIELDS)?;

    let job = ex.require_string("job")?;
    let kernel = ex.require_string("kernel")?;
    let raw_defconfig = ex.require_string("defconfig")?;
    let dirname = ex.take_string("dirname");
    let explicit_arch = ex.take_string("arch");

    let inference = infer_architecture(&raw_defconfig, dirname.as_deref());
    let defconfig = inference.base_name;
    let mut import_warnings = Vec::new();
    let arch = match explicit_arch {
        Some(arch) => arch,
        None => {
            if inference.defaulted {
                warn!(
                    "No architecture for {}-{}-{}, defaulting to '{}'",
                    job, kernel, defconfig, DEFAULT_ARCH
                );
                import_warnings.push(format!(
                    "architecture defaulted to '{}' for config '{}'",
                    DEFAULT_ARCH, defconfig
                ));
            }
            inference.arch
        }
    };

    let defconfig_full = ex
        .take_string("defconfig_full")
        .unwrap_or_else(|| defconfig.clone());

    let mut doc = BuildReport::new(job, kernel, defconfig, defconfig_full, arch);
    if let Some(status) = ex.take_string("status") {
        doc.status = status;
    }
    doc.errors = ex.take_i64("errors", 0);
    doc.warnings = ex.take_i64("warnings", 0);
    doc.build_time = ex.take_f64("build_time", 0.0);
    doc.build_log = ex.take_string("build_log");
    doc.dirname = dirname;
    doc.kconfig_fragments = ex.take_string("kconfig_fragments");
    doc.dtb_dir = ex.take_string("dtb_dir");
    doc.kernel_config = ex.take_string("kernel_config");
    doc.kernel_image = ex.take_string("kernel_image");
    doc.modules = ex.take_string("modules");
    doc.modules_dir = ex.take_string("modules_dir");
    doc.system_map = ex.take_string("system_map");
    doc.text_offset = ex.take_string("text_offset");
    doc.build_platform = ex.take_array("build_platform");
    doc.file_server_url = ex.take_string("file_server_url");
    doc.file_server_resource = ex.take_string("file_server_resource");
    doc.git_branch = ex.take_string("git_branch");
    doc.git_commit = ex.take_string("git_commit");
    doc.git_describe = ex.take_string("git_describe");
    doc.git_url = ex.take_string("git_url");
    doc.version = ex
        .take_string("version")
        .unwrap_or_else(|| SCHEMA_VERSION.to_string());
    doc.metadata = ex.residual;
    doc.import_warnings = import_warnings;

    Ok(doc)
}

// ============================================================================
// Boot report
// ============================================================================

const BOOT_FIELDS: &[FieldSpec] = &[
    FieldSpec::mandatory("job"),
    FieldSpec::mandatory("kernel"),
    FieldSpec::mandatory("defconfig"),
    FieldSpec::mandatory("lab_name"),
    // Board is conceptually mandatory but old producers omit it; a null
    // sentinel is still rejected while absence triggers inference.
    FieldSpec::optional_non_null("board"),
    FieldSpec::optional("defconfig_full"),
    FieldSpec::optional("arch"),
    FieldSpec::numeric("boot_time"),
    FieldSpec::optional("boot_result"),
    FieldSpec::optional("status"),
    FieldSpec::numeric("retries"),
    FieldSpec::numeric("warnings"),
    FieldSpec::optional("board_instance"),
    FieldSpec::optional("boot_log"),
    FieldSpec::optional("boot_log_html"),
    FieldSpec::optional("boot_result_description"),
    FieldSpec::optional("dtb"),
    FieldSpec::optional("dtb_addr"),
    FieldSpec::optional("dtb_append"),
    FieldSpec::optional("endian"),
    FieldSpec::optional("fastboot"),
    FieldSpec::optional("fastboot_cmd"),
    FieldSpec::optional("initrd"),
    FieldSpec::optional("initrd_addr"),
    FieldSpec::optional("load_addr"),
    FieldSpec::optional("kernel_image"),
    FieldSpec::optional("file_server_url"),
    FieldSpec::optional("file_server_resource"),
    FieldSpec::optional("git_branch"),
    FieldSpec::optional("git_commit"),
    FieldSpec::optional("git_describe"),
    FieldSpec::optional("git_url"),
    FieldSpec::optional("version"),
];

/// Parse a boot report document.
///
/// `source_name` is the report's own file name, when known; it is the last
/// fallback for board-name inference.
pub fn parse_boot(raw: &JsonValue, source_name: Option<&str>) -> ImportResult<BootReport> {
    let mut ex = extract(raw, BOOT_FIELDS)?;

    let job = ex.require_string("job")?;
    let kernel = ex.require_string("kernel")?;
    let defconfig = ex.require_string("defconfig")?;
    let lab_name = ex.require_string("lab_name")?;
    let defconfig_full = ex
        .take_string("defconfig_full")
        .unwrap_or_else(|| defconfig.clone());
    let arch = ex
        .take_string("arch")
        .unwrap_or_else(|| DEFAULT_ARCH.to_string());
    let dtb = ex.take_string("dtb");

    let mut import_warnings = Vec::new();
    let board = match ex.take_string("board") {
        Some(board) => board,
        None => {
            warn!("No board value specified in the boot report");
            import_warnings.push("board name inferred".to_string());
            infer_board(dtb.as_deref(), source_name)
                .ok_or_else(|| ImportError::MissingField("board".to_string()))?
        }
    };

    let mut doc = BootReport::new(
        board, job, kernel, defconfig, defconfig_full, arch, lab_name,
    );

    let seconds = ex.take_f64("boot_time", 0.0);
    let (time, overflowed) = time_of_day_from_seconds(seconds);
    if overflowed {
        warn!("Boot time value {} is too large for a time value, using 0", seconds);
        import_warnings.push("boot time clamped to zero".to_string());
    }
    doc.time = time;

    doc.status = ex
        .take_string("boot_result")
        .or_else(|| ex.take_string("status"))
        .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
    doc.retries = ex.take_i64("retries", 0);
    doc.warnings = ex.take_i64("warnings", 0);
    doc.board_instance = ex.take_string("board_instance");
    doc.boot_log = ex.take_string("boot_log");
    doc.boot_log_html = ex.take_string("boot_log_html");
    doc.boot_result_description = ex.take_string("boot_result_description");
    doc.dtb = dtb;
    doc.dtb_addr = ex.take_string("dtb_addr");
    doc.dtb_append = ex.take_string("dtb_append");
    doc.endian = ex.take_string("endian");
    doc.fastboot = ex.take_bool("fastboot");
    doc.fastboot_cmd = ex.take_string("fastboot_cmd");
    doc.initrd = ex.take_string("initrd");
    doc.initrd_addr = ex.take_string("initrd_addr");
    doc.load_addr = ex.take_string("load_addr");
    doc.kernel_image = ex.take_string("kernel_image");
    doc.file_server_url = ex.take_string("file_server_url");
    doc.file_server_resource = ex.take_string("file_server_resource");
    doc.git_branch = ex.take_string("git_branch");
    doc.git_commit = ex.take_string("git_commit");
    doc.git_describe = ex.take_string("git_describe");
    doc.git_url = ex.take_string("git_url");
    doc.version = ex
        .take_string("version")
        .unwrap_or_else(|| SCHEMA_VERSION.to_string());
    doc.metadata = ex.residual;
    doc.import_warnings = import_warnings;

    Ok(doc)
}

// ============================================================================
// Test suite / set / case
// ============================================================================

const TEST_SUITE_FIELDS: &[FieldSpec] = &[
    FieldSpec::mandatory("name"),
    FieldSpec::optional("lab_name"),
    FieldSpec::optional("job"),
    FieldSpec::optional("kernel"),
    FieldSpec::optional("defconfig"),
    FieldSpec::optional("defconfig_full"),
    FieldSpec::optional("arch"),
    FieldSpec::optional("board"),
    FieldSpec::optional("board_instance"),
    FieldSpec::optional("job_id"),
    FieldSpec::optional("build_id"),
    // Legacy producers name the build reference after the defconfig.
    FieldSpec::optional("defconfig_id"),
    FieldSpec::optional("boot_id"),
    FieldSpec::optional("version"),
];

/// Parse a test suite document. Nested `test_set`/`test_case` lists are the
/// caller's concern and must be removed before parsing.
pub fn parse_test_suite(raw: &JsonValue) -> ImportResult<TestSuite> {
    let mut ex = extract(raw, TEST_SUITE_FIELDS)?;

    let mut doc = TestSuite::new(ex.require_string("name")?);
    doc.lab_name = ex.take_string("lab_name");
    doc.job = ex.take_string("job");
    doc.kernel = ex.take_string("kernel");
    doc.defconfig = ex.take_string("defconfig");
    doc.defconfig_full = ex.take_string("defconfig_full");
    doc.arch = ex.take_string("arch");
    doc.board = ex.take_string("board");
    doc.board_instance = ex.take_string("board_instance");
    doc.job_id = ex.take_uuid("job_id");
    doc.build_id = ex
        .take_uuid("build_id")
        .or_else(|| ex.take_uuid("defconfig_id"));
    doc.boot_id = ex.take_uuid("boot_id");
    doc.version = ex
        .take_string("version")
        .unwrap_or_else(|| SCHEMA_VERSION.to_string());
    doc.metadata = ex.residual;

    Ok(doc)
}

const TEST_SET_FIELDS: &[FieldSpec] = &[
    FieldSpec::mandatory("name"),
    FieldSpec::optional("test_suite_id"),
    FieldSpec::optional("status"),
    FieldSpec::numeric("time"),
    FieldSpec::optional("definition_uri"),
    FieldSpec::optional("version"),
];

/// Parse a test set document. The nested `test_case` list must already have
/// been removed by the caller.
pub fn parse_test_set(raw: &JsonValue) -> ImportResult<TestSet> {
    let mut ex = extract(raw, TEST_SET_FIELDS)?;

    let mut doc = TestSet::new(ex.require_string("name")?);
    doc.test_suite_id = ex.take_uuid("test_suite_id");
    if let Some(status) = ex.take_string("status") {
        doc.status = status;
    }
    let seconds = ex.take_f64("time", 0.0);
    let (time, overflowed) = time_of_day_from_seconds(seconds);
    if overflowed {
        warn!(
            "Time value {} of test set '{}' is too large, using 0",
            seconds, doc.name
        );
        doc.import_warnings.push("time clamped to zero".to_string());
    }
    doc.time = time;
    doc.definition_uri = ex.take_string("definition_uri");
    doc.version = ex
        .take_string("version")
        .unwrap_or_else(|| SCHEMA_VERSION.to_string());
    doc.metadata = ex.residual;

    Ok(doc)
}

const TEST_CASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::mandatory("name"),
    FieldSpec::optional("test_suite_id"),
    FieldSpec::optional("test_set_id"),
    FieldSpec::optional("status"),
    FieldSpec::numeric("time"),
    FieldSpec::optional("measurements"),
    FieldSpec::optional("attachments"),
    FieldSpec::optional("version"),
];

/// Parse a test case document.
pub fn parse_test_case(raw: &JsonValue) -> ImportResult<TestCase> {
    let mut ex = extract(raw, TEST_CASE_FIELDS)?;

    let mut doc = TestCase::new(ex.require_string("name")?);
    doc.test_suite_id = ex.take_uuid("test_suite_id");
    doc.test_set_id = ex.take_uuid("test_set_id");
    if let Some(status) = ex.take_string("status") {
        doc.status = status;
    }
    let seconds = ex.take_f64("time", 0.0);
    let (time, overflowed) = time_of_day_from_seconds(seconds);
    if overflowed {
        warn!(
            "Time value {} of test case '{}' is too large, using 0",
            seconds, doc.name
        );
        doc.import_warnings.push("time clamped to zero".to_string());
    }
    doc.time = time;
    doc.measurements = ex.take_array("measurements");
    doc.attachments = ex.take_array("attachments");
    doc.version = ex
        .take_string("version")
        .unwrap_or_else(|| SCHEMA_VERSION.to_string());
    doc.metadata = ex.residual;

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn boot_json() -> JsonValue {
        json!({
            "job": "next",
            "kernel": "next-20260815",
            "defconfig": "omap2plus_defconfig",
            "lab_name": "lab-x",
            "board": "beaglebone-black",
            "boot_time": 28.07,
            "boot_result": "PASS",
            "git_commit": "abcdef0123",
            "warnings": 1
        })
    }

    #[test]
    fn parse_boot_with_all_mandatory_fields_succeeds() {
        let doc = parse_boot(&boot_json(), None).unwrap();
        assert_eq!(doc.name, "boot-beaglebone-black");
        assert_eq!(doc.job, "next");
        assert_eq!(doc.status, "PASS");
        assert_eq!(doc.warnings, 1);
        assert_eq!(doc.version, "1.0");
        assert!(doc.import_warnings.is_empty());
    }

    #[test]
    fn missing_mandatory_field_is_missing_field() {
        for key in ["job", "kernel", "defconfig", "lab_name"] {
            let mut raw = boot_json();
            raw.as_object_mut().unwrap().remove(key);
            match parse_boot(&raw, None) {
                Err(ImportError::MissingField(k)) => assert_eq!(k, key),
                other => panic!("expected MissingField for '{}', got {:?}", key, other),
            }
        }
    }

    #[test]
    fn null_sentinel_on_mandatory_field_is_invalid_value() {
        for sentinel in [json!(null), json!(""), json!("null"), json!("None"), json!("NONE")] {
            for key in ["job", "kernel", "defconfig", "board"] {
                let mut raw = boot_json();
                raw[key] = sentinel.clone();
                match parse_boot(&raw, None) {
                    Err(ImportError::InvalidValue { key: k, .. }) => assert_eq!(k, key),
                    other => panic!(
                        "expected InvalidValue for '{}' = {}, got {:?}",
                        key, sentinel, other
                    ),
                }
            }
        }
    }

    #[test]
    fn unknown_keys_are_retained_in_residual_metadata() {
        let mut raw = boot_json();
        raw["some_vendor_field"] = json!("x15");
        raw["metadata"] = json!({"tree": "next"});

        let doc = parse_boot(&raw, None).unwrap();
        assert_eq!(doc.metadata["some_vendor_field"], json!("x15"));
        assert_eq!(doc.metadata["tree"], json!("next"));
    }

    #[test]
    fn board_inferred_from_dtb_name() {
        let mut raw = boot_json();
        raw.as_object_mut().unwrap().remove("board");
        raw["dtb"] = json!("dtbs/am335x-boneblack.dtb");

        let doc = parse_boot(&raw, None).unwrap();
        assert_eq!(doc.board, "am335x-boneblack");
        assert!(!doc.import_warnings.is_empty());
    }

    #[test]
    fn tmp_dtb_is_excluded_from_board_inference() {
        let mut raw = boot_json();
        raw.as_object_mut().unwrap().remove("board");
        raw["dtb"] = json!("tmp/datafile.dtb");

        let doc = parse_boot(&raw, Some("boot-panda.json")).unwrap();
        assert_eq!(doc.board, "panda");
    }

    #[test]
    fn board_inference_without_any_source_fails() {
        let mut raw = boot_json();
        raw.as_object_mut().unwrap().remove("board");

        assert!(matches!(
            parse_boot(&raw, None),
            Err(ImportError::MissingField(_))
        ));
    }

    #[test]
    fn arch_inference_strips_recognized_prefixes() {
        let inference = infer_architecture("arm-defconfig", None);
        assert_eq!(inference.base_name, "defconfig");
        assert_eq!(inference.arch, "arm");
        assert!(!inference.defaulted);

        let inference = infer_architecture("arm64-foo", None);
        assert_eq!(inference.arch, "arm64");

        let inference = infer_architecture("x86-allnoconfig", None);
        assert_eq!(inference.arch, "x86");
        assert_eq!(inference.base_name, "allnoconfig");
    }

    #[test]
    fn arch_inference_falls_back_to_dirname_then_default() {
        let inference = infer_architecture("multi_v7_defconfig", Some("arm64-multi_v7"));
        assert_eq!(inference.arch, "arm64");
        assert!(!inference.defaulted);

        let inference = infer_architecture("multi_v7_defconfig", None);
        assert_eq!(inference.arch, "arm");
        assert!(inference.defaulted);
    }

    #[test]
    fn parse_build_records_warning_when_arch_defaulted() {
        let raw = json!({
            "job": "next",
            "kernel": "next-20260815",
            "defconfig": "multi_v7_defconfig"
        });
        let doc = parse_build(&raw).unwrap();
        assert_eq!(doc.arch, "arm");
        assert!(!doc.import_warnings.is_empty());

        let raw = json!({
            "job": "next",
            "kernel": "next-20260815",
            "defconfig": "arm-defconfig"
        });
        let doc = parse_build(&raw).unwrap();
        assert_eq!(doc.defconfig, "defconfig");
        assert_eq!(doc.arch, "arm");
        assert!(doc.import_warnings.is_empty());
    }

    #[test]
    fn duration_zero_maps_to_zero_time_of_day() {
        let (time, overflowed) = time_of_day_from_seconds(0.0);
        assert_eq!(time, NaiveTime::MIN);
        assert!(!overflowed);
    }

    #[test]
    fn duration_125_5_maps_to_2m5s500000us() {
        let (time, overflowed) = time_of_day_from_seconds(125.5);
        assert_eq!(time, NaiveTime::from_hms_micro_opt(0, 2, 5, 500_000).unwrap());
        assert!(!overflowed);
    }

    #[test]
    fn negative_duration_clamps_to_zero() {
        let (time, overflowed) = time_of_day_from_seconds(-42.0);
        assert_eq!(time, NaiveTime::MIN);
        assert!(!overflowed);
    }

    #[test]
    fn out_of_range_duration_clamps_to_zero_with_warning() {
        let (time, overflowed) = time_of_day_from_seconds(1.0e12);
        assert_eq!(time, NaiveTime::MIN);
        assert!(overflowed);

        let mut raw = boot_json();
        raw["boot_time"] = json!(1.0e12);
        let doc = parse_boot(&raw, None).unwrap();
        assert_eq!(doc.time, NaiveTime::MIN);
        assert!(!doc.import_warnings.is_empty());
    }

    #[test]
    fn boot_time_as_string_is_coerced() {
        let mut raw = boot_json();
        raw["boot_time"] = json!("125.5");
        let doc = parse_boot(&raw, None).unwrap();
        assert_eq!(doc.time, NaiveTime::from_hms_micro_opt(0, 2, 5, 500_000).unwrap());
    }

    #[test]
    fn parse_job_requires_job_and_kernel() {
        let doc = parse_job(&json!({"job": "next", "kernel": "v4.1"})).unwrap();
        assert_eq!(doc.name, "next-v4.1");
        assert_eq!(doc.status, "UNKNOWN");

        assert!(matches!(
            parse_job(&json!({"kernel": "v4.1"})),
            Err(ImportError::MissingField(_))
        ));
        assert!(matches!(
            parse_job(&json!({"job": "none", "kernel": "v4.1"})),
            Err(ImportError::InvalidValue { .. })
        ));
    }

    #[test]
    fn parse_test_suite_accepts_legacy_defconfig_id_alias() {
        let build_id = Uuid::new_v4();
        let raw = json!({"name": "boot-suite", "defconfig_id": build_id.to_string()});
        let doc = parse_test_suite(&raw).unwrap();
        assert_eq!(doc.build_id, Some(build_id));
    }

    #[test]
    fn out_of_range_test_times_clamp_with_warning() {
        let doc = parse_test_set(&json!({"name": "timers", "time": 1.0e12})).unwrap();
        assert_eq!(doc.time, NaiveTime::MIN);
        assert!(!doc.import_warnings.is_empty());

        let doc = parse_test_case(&json!({"name": "nanosleep", "time": 1.0e12})).unwrap();
        assert_eq!(doc.time, NaiveTime::MIN);
        assert!(!doc.import_warnings.is_empty());
    }

    #[test]
    fn parse_test_case_defaults() {
        let doc = parse_test_case(&json!({"name": "checksum"})).unwrap();
        assert_eq!(doc.status, "UNKNOWN");
        assert_eq!(doc.time, NaiveTime::MIN);
        assert!(doc.measurements.is_empty());

        assert!(parse_test_case(&json!({"status": "PASS"})).is_err());
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(
            parse_boot(&json!(["not", "an", "object"]), None),
            Err(ImportError::InvalidValue { .. })
        ));
    }
}

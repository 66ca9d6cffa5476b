//! Batch import of nested test sets and test cases.
//!
//! Every item fails or succeeds on its own; one bad document never aborts
//! the batch. Failures are bucketed by error code so the caller can report
//! parse-class and store-class problems separately.

use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use crate::error::{add_error_message, ErrorMap, ImportResult};
use crate::services::parser::{parse_test_case, parse_test_set};
use crate::services::reconciler::save_or_update;
use crate::store::{Collection, Store};

/// Outcome of a batch: identifiers of the imported documents plus failures
/// bucketed by error code.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub ids: Vec<Uuid>,
    pub errors: ErrorMap,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Force a parsed document's suite reference to the importing suite's
/// identifier, warning when the payload claimed a different one.
fn enforce_suite_id(kind: &str, name: &str, claimed: &mut Option<Uuid>, suite_id: Uuid) {
    if let Some(other) = *claimed {
        if other != suite_id {
            warn!(
                "{} '{}' claims suite {}, forcing {}",
                kind, name, other, suite_id
            );
        }
    }
    *claimed = Some(suite_id);
}

/// Import a list of test case documents belonging to a suite, and optionally
/// to a set within it.
pub fn import_test_cases(
    cases: &[JsonValue],
    suite_id: Uuid,
    set_id: Option<Uuid>,
    store: &dyn Store,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for raw in cases {
        match parse_test_case(raw) {
            Ok(mut case) => {
                enforce_suite_id("Test case", &case.name, &mut case.test_suite_id, suite_id);
                if set_id.is_some() {
                    case.test_set_id = set_id;
                }
                match save_or_update(&mut case, store) {
                    Ok((_, id)) => outcome.ids.push(id),
                    Err(err) => {
                        warn!("Error saving test case '{}': {}", case.name, err);
                        add_error_message(&mut outcome.errors, err.code(), err.to_string());
                    }
                }
            }
            Err(err) => {
                warn!("Error parsing test case: {}", err);
                add_error_message(&mut outcome.errors, err.code(), err.to_string());
            }
        }
    }

    outcome
}

fn import_one_set(
    raw: &JsonValue,
    suite_id: Uuid,
    store: &dyn Store,
    outcome: &mut BatchOutcome,
) -> ImportResult<()> {
    // The nested cases are the batch's concern, not the set parser's.
    let mut raw = raw.clone();
    let nested = match raw.as_object_mut().and_then(|obj| obj.remove("test_case")) {
        Some(JsonValue::Array(cases)) => cases,
        Some(other) => {
            warn!("Ignoring non-list test_case value: {}", other);
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut set = parse_test_set(&raw)?;
    enforce_suite_id("Test set", &set.name, &mut set.test_suite_id, suite_id);
    let (_, set_id) = save_or_update(&mut set, store)?;
    outcome.ids.push(set_id);

    if nested.is_empty() {
        return Ok(());
    }

    let cases = import_test_cases(&nested, suite_id, Some(set_id), store);
    if cases.ids.is_empty() {
        add_error_message(
            &mut outcome.errors,
            500,
            format!("No test cases imported for test set '{}'", set.name),
        );
    } else {
        // Write the imported case identifiers back into the stored set.
        set.test_case = cases.ids;
        store.replace(Collection::TestSet, set_id, serde_json::to_value(&set)?)?;
    }
    for (code, messages) in cases.errors {
        for message in messages {
            add_error_message(&mut outcome.errors, code, message);
        }
    }

    Ok(())
}

/// Import a list of test set documents belonging to a suite, including their
/// nested test cases.
pub fn import_test_sets(sets: &[JsonValue], suite_id: Uuid, store: &dyn Store) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for raw in sets {
        if let Err(err) = import_one_set(raw, suite_id, store, &mut outcome) {
            warn!("Error importing test set: {}", err);
            add_error_message(&mut outcome.errors, err.code(), err.to_string());
        }
    }

    outcome
}

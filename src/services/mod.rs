//! Domain service façades over the generic record store, one module per
//! post family plus the identity tracker. Each module also owns its CLI
//! surface and dispatcher, so a service's whole contract is in one place.

pub mod analysis;
pub mod identity;
pub mod quest;

use crate::core::error;
use crate::core::time;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Language-code value parser shared by the post CLIs (e.g. `cht`, `en`,
/// `zh-Hant`).
pub(crate) fn validate_lang_code(value: &str) -> Result<String, String> {
    static LANG_CODE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[a-z]{2,4}(-[A-Za-z]{2,4})?$").unwrap());
    if LANG_CODE.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(format!("invalid language code: {}", value))
    }
}

/// Parse a CLI argument holding a JSON array of structured entries.
pub(crate) fn parse_json_entries(
    raw: &str,
    what: &str,
) -> Result<Vec<JsonValue>, error::LorekeeperError> {
    let value: JsonValue = serde_json::from_str(raw).map_err(|e| {
        error::LorekeeperError::ValidationError(format!("{} is not valid JSON: {}", what, e))
    })?;
    match value {
        JsonValue::Array(entries) => Ok(entries),
        _ => Err(error::LorekeeperError::ValidationError(format!(
            "{} must be a JSON array",
            what
        ))),
    }
}

/// Print one JSON response envelope for a CLI command result.
pub(crate) fn print_envelope(cmd: &str, status: &str, extra: JsonValue) {
    let envelope = time::response_envelope(cmd, status, extra);
    println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
}

/// Check that every entry carries exactly the expected key set.
///
/// A hard precondition shared by quest positional info and character
/// skills: a missing key, an extra key, or a non-object entry rejects the
/// whole request before any write is attempted.
pub(crate) fn ensure_entries_complete(
    entries: &[JsonValue],
    expected: &[&str],
    what: &str,
) -> Result<(), error::LorekeeperError> {
    let expected_keys: BTreeSet<&str> = expected.iter().copied().collect();
    for entry in entries {
        let keys: BTreeSet<&str> = match entry.as_object() {
            Some(map) => map.keys().map(String::as_str).collect(),
            None => {
                return Err(error::LorekeeperError::ValidationError(format!(
                    "incomplete {}: entry is not an object",
                    what
                )));
            }
        };
        if keys != expected_keys {
            return Err(error::LorekeeperError::ValidationError(format!(
                "incomplete {}: expected exactly {:?}",
                what, expected
            )));
        }
    }
    Ok(())
}

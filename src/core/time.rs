//! Shared timestamp/event helpers for response envelopes and stored rows.

use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Returns unix-epoch milliseconds with `Z` suffix (e.g. `1771220592123Z`).
///
/// Fixed-width until far beyond the crate's lifetime, so the strings order
/// chronologically under plain TEXT comparison. Post listings rely on that
/// for their `last_modified_at` sort.
pub fn now_epoch_ms() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{}Z", ms)
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn response_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "schema_version": "1.0.0",
        "ts": now_epoch_ms(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

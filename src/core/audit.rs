//! Append-only mutation audit for brokered store access.
//!
//! Every store access routed through [`crate::core::db::with_conn`] leaves
//! one event in `mutations.events.jsonl`, success or error. The log is a
//! diagnostic surface, not a rebuild source: post history lives in the rows
//! themselves.

use crate::core::error;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const AUDIT_LOG_NAME: &str = "mutations.events.jsonl";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MutationEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

pub fn audit_log_path(root: &Path) -> PathBuf {
    root.join(AUDIT_LOG_NAME)
}

/// Append one event to the audit log. Appends are serialized in-process so
/// interleaved writers cannot tear a line.
pub fn append_event(
    root: &Path,
    op: &str,
    db_id: &str,
    status: &str,
) -> Result<(), error::LorekeeperError> {
    use std::fs::OpenOptions;
    use std::io::Write;

    static LOG_LOCK: Mutex<()> = Mutex::new(());
    let _lock = LOG_LOCK.lock().unwrap();

    let ev = MutationEvent {
        ts: time::now_epoch_ms(),
        event_id: time::new_event_id(),
        op: op.to_string(),
        db_id: db_id.to_string(),
        status: status.to_string(),
    };

    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_log_path(root))
        .map_err(error::LorekeeperError::IoError)?;

    writeln!(f, "{}", serde_json::to_string(&ev)?).map_err(error::LorekeeperError::IoError)?;
    Ok(())
}

/// Read the full audit log. Missing log means no mutations yet.
pub fn read_events(root: &Path) -> Result<Vec<MutationEvent>, error::LorekeeperError> {
    let path = audit_log_path(root);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path).map_err(error::LorekeeperError::IoError)?;
    let mut events = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}

use crate::core::audit;
use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::LorekeeperError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::LorekeeperError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::LorekeeperError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::LorekeeperError::RusqliteError)?;
    Ok(conn)
}

pub fn post_db_path(root: &Path) -> PathBuf {
    root.join(schemas::POST_DB_NAME)
}

pub fn user_db_path(root: &Path) -> PathBuf {
    root.join(schemas::USER_DB_NAME)
}

pub fn initialize_post_db(root: &Path) -> Result<(), error::LorekeeperError> {
    let db_path = post_db_path(root);
    fs::create_dir_all(root).map_err(error::LorekeeperError::IoError)?;

    with_conn(root, &db_path, "post.init", |conn| {
        conn.execute(schemas::POST_DB_SCHEMA_QUEST, [])?;
        conn.execute(schemas::POST_DB_SCHEMA_QUEST_INDEX, [])?;
        conn.execute(schemas::POST_DB_SCHEMA_ANALYSIS, [])?;
        conn.execute(schemas::POST_DB_SCHEMA_ANALYSIS_INDEX, [])?;
        conn.execute(schemas::POST_DB_SCHEMA_COUNTERS, [])?;
        Ok(())
    })
}

pub fn initialize_user_db(root: &Path) -> Result<(), error::LorekeeperError> {
    let db_path = user_db_path(root);
    fs::create_dir_all(root).map_err(error::LorekeeperError::IoError)?;

    with_conn(root, &db_path, "user.init", |conn| {
        conn.execute(schemas::USER_DB_SCHEMA_USERS, [])?;
        Ok(())
    })
}

/// Execute a closure with a connection to the specified DB, leaving one
/// audit event per access.
///
/// Concurrency safety is the database's job: WAL mode plus the busy timeout
/// serialize concurrent writers, and every core invariant is enforced by a
/// single-statement atomic operation. No in-process lock is taken here.
pub fn with_conn<F, R>(
    root: &Path,
    db_path: &Path,
    op_name: &str,
    f: F,
) -> Result<R, error::LorekeeperError>
where
    F: FnOnce(&Connection) -> Result<R, error::LorekeeperError>,
{
    let db_id = db_path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let conn = db_connect(&db_path.to_string_lossy())?;

    let result = f(&conn);

    let status = if result.is_ok() { "success" } else { "error" };
    audit::append_event(root, op_name, &db_id, status)?;

    result
}

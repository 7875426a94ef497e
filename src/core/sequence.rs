//! Per-collection sequence-number allocation.
//!
//! Post identity is a monotonically increasing integer per post family.
//! Counters live in the `sequence_counters` table, one row per collection
//! name, created lazily on first allocation. Values are never reused: the
//! counter only moves forward, even if the row that consumed a value is
//! never inserted.

use crate::core::error;
use rusqlite::{Connection, OptionalExtension, params};

/// Atomically increment the counter for `collection` and return the new
/// value. The first allocation on an uninitialized collection yields 1.
///
/// This is a single increment-and-fetch statement, not read-then-write,
/// so concurrent publishers can never be issued the same ID.
pub fn allocate(conn: &Connection, collection: &str) -> Result<i64, error::LorekeeperError> {
    let value = conn.query_row(
        "INSERT INTO sequence_counters(collection, next_value) VALUES(?1, 1)
         ON CONFLICT(collection) DO UPDATE SET next_value = next_value + 1
         RETURNING next_value",
        params![collection],
        |row| row.get(0),
    )?;
    Ok(value)
}

/// Current counter value without incrementing; 0 for a collection that has
/// never allocated. An ID above this value can never have been issued.
pub fn peek(conn: &Connection, collection: &str) -> Result<i64, error::LorekeeperError> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT next_value FROM sequence_counters WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0))
}

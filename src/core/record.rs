//! Generic multilingual record store.
//!
//! One logical post is the set of all language variants sharing a sequence
//! ID; each variant is one row keyed by `(seq_id, lang_code)`. The store is
//! parameterized by a [`RecordSchema`] naming the table, the counter, and
//! the column layout, so both post families run through the same code path.
//!
//! Every invariant here rests on a single-statement atomic operation:
//! view counts move via `UPDATE .. RETURNING`, and an edit's payload
//! overwrite, timestamp bump, and history append travel in one `UPDATE`.

use crate::core::error;
use crate::core::sequence;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, Row, params, types::ToSql};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Column layout of a multilingual post table, passed explicitly to the
/// generic store. A plain value object: no inheritance, nothing resolved
/// reflectively.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    /// Table holding the post family
    pub table: &'static str,
    /// Sequence-counter collection name backing this family's IDs
    pub counter: &'static str,
    pub seq_id: &'static str,
    pub lang_code: &'static str,
    pub view_count: &'static str,
    pub published_at: &'static str,
    pub last_modified_at: &'static str,
    pub modify_notes: &'static str,
    pub payload: &'static str,
    /// Type-discriminator column, when the family has one
    pub unit_type: Option<&'static str>,
    /// Payload keys projected into list summaries
    pub summary_keys: &'static [&'static str],
}

/// Result of a post update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    NotFound,
    /// Kept for API completeness. Unreachable in practice: the history
    /// append always changes the matched row.
    NoChange,
    Updated,
}

impl UpdateOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NoChange => "no_change",
            Self::Updated => "updated",
        }
    }
}

/// One entry of a post's append-only modification history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModifyNote {
    pub dt: String,
    pub note: String,
}

/// A full post row.
#[derive(Debug, Clone, Serialize)]
pub struct PostRecord {
    pub seq_id: i64,
    pub lang_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<i64>,
    pub view_count: i64,
    pub published_at: String,
    pub last_modified_at: String,
    pub modify_notes: Vec<ModifyNote>,
    pub payload: JsonValue,
}

/// A list projection: identity, display fields, timestamps, view count.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub seq_id: i64,
    pub lang_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<i64>,
    pub view_count: i64,
    pub published_at: String,
    pub last_modified_at: String,
    pub fields: serde_json::Map<String, JsonValue>,
}

/// Result object of getting a single multilingual post.
#[derive(Debug)]
pub struct GetOneResult {
    pub data: Option<PostRecord>,
    pub is_alt_language: bool,
    pub other_languages: Vec<String>,
}

impl GetOneResult {
    fn empty() -> Self {
        Self {
            data: None,
            is_alt_language: false,
            other_languages: Vec::new(),
        }
    }
}

pub struct RecordStore {
    schema: &'static RecordSchema,
}

impl RecordStore {
    pub fn new(schema: &'static RecordSchema) -> Self {
        Self { schema }
    }

    /// Check if the given ID and language code is available for publishing.
    ///
    /// `None` means the caller wants a fresh ID, which is always available.
    /// An ID above the allocator's current value can never have been issued,
    /// so it is never available for reuse.
    pub fn is_id_language_available(
        &self,
        conn: &Connection,
        seq_id: Option<i64>,
        lang_code: &str,
    ) -> Result<bool, error::LorekeeperError> {
        let Some(seq_id) = seq_id.filter(|id| *id > 0) else {
            return Ok(true);
        };

        if seq_id > sequence::peek(conn, self.schema.counter)? {
            return Ok(false);
        }

        let sql = format!(
            "SELECT 1 FROM {table} WHERE {seq} = ?1 AND {lang} = ?2",
            table = self.schema.table,
            seq = self.schema.seq_id,
            lang = self.schema.lang_code,
        );
        let taken = conn
            .query_row(&sql, params![seq_id, lang_code], |_| Ok(()))
            .optional()?;
        Ok(taken.is_none())
    }

    /// Get a post by `(seq_id, lang_code)`, with the other available
    /// languages and whether the returned variant is an alternate language.
    ///
    /// Increases the view count if `increase_view_count` is true; the
    /// returned row reflects the increment. The other-language list is only
    /// collected for a counted view, because an uncounted fetch only happens
    /// when loading a post for edit.
    pub fn get_one(
        &self,
        conn: &Connection,
        seq_id: Option<i64>,
        lang_code: &str,
        increase_view_count: bool,
    ) -> Result<GetOneResult, error::LorekeeperError> {
        // Early termination on no sequential ID
        let Some(seq_id) = seq_id.filter(|id| *id > 0) else {
            return Ok(GetOneResult::empty());
        };
        let s = self.schema;

        let mut other_languages = Vec::new();
        if increase_view_count {
            let sql = format!(
                "SELECT {lang} FROM {table} WHERE {seq} = ?1 AND {lang} != ?2 ORDER BY {lang}",
                lang = s.lang_code,
                table = s.table,
                seq = s.seq_id,
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![seq_id, lang_code], |row| row.get::<_, String>(0))?;
            for lang in rows {
                other_languages.push(lang?);
            }
        }

        let inc = i64::from(increase_view_count);
        let exact = format!(
            "UPDATE {table} SET {view} = {view} + ?1 WHERE {seq} = ?2 AND {lang} = ?3
             RETURNING {cols}",
            table = s.table,
            view = s.view_count,
            seq = s.seq_id,
            lang = s.lang_code,
            cols = self.record_columns(),
        );
        let record = conn
            .query_row(&exact, params![inc, seq_id, lang_code], |row| {
                self.row_to_record(row)
            })
            .optional()?;
        if let Some(record) = record {
            return Ok(GetOneResult {
                data: Some(record),
                is_alt_language: false,
                other_languages,
            });
        }

        // Alternate-language fallback: serve any variant of the logical
        // post rather than nothing, flagged so the caller can render a
        // language-mismatch notice.
        let fallback = format!(
            "UPDATE {table} SET {view} = {view} + 1
             WHERE rowid = (SELECT MIN(rowid) FROM {table} WHERE {seq} = ?1)
             RETURNING {cols}",
            table = s.table,
            view = s.view_count,
            seq = s.seq_id,
            cols = self.record_columns(),
        );
        let record = conn
            .query_row(&fallback, params![seq_id], |row| self.row_to_record(row))
            .optional()?;
        Ok(GetOneResult {
            data: record,
            is_alt_language: true,
            other_languages,
        })
    }

    /// Get one language's posts sorted by last-modified DESC, plus the
    /// total row count for that language. `limit = 0` means unbounded.
    pub fn get_list(
        &self,
        conn: &Connection,
        lang_code: &str,
        start: i64,
        limit: i64,
    ) -> Result<(Vec<PostSummary>, i64), error::LorekeeperError> {
        let s = self.schema;

        let mut cols: Vec<String> = [
            s.seq_id,
            s.lang_code,
            s.view_count,
            s.published_at,
            s.last_modified_at,
        ]
        .iter()
        .map(|c| (*c).to_string())
        .collect();
        if let Some(type_col) = s.unit_type {
            cols.push(type_col.to_string());
        }
        for key in s.summary_keys {
            cols.push(format!(
                "json_extract({payload}, '$.{key}')",
                payload = s.payload,
            ));
        }

        let sql = format!(
            "SELECT {cols} FROM {table} WHERE {lang} = ?1
             ORDER BY {modified} DESC LIMIT ?2 OFFSET ?3",
            cols = cols.join(", "),
            table = s.table,
            lang = s.lang_code,
            modified = s.last_modified_at,
        );
        let effective_limit = if limit == 0 { -1 } else { limit };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![lang_code, effective_limit, start], |row| {
            self.row_to_summary(row)
        })?;
        let mut summaries = Vec::new();
        for summary in rows {
            summaries.push(summary?);
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {lang} = ?1",
            table = s.table,
            lang = s.lang_code,
        );
        let total: i64 = conn.query_row(&count_sql, params![lang_code], |row| row.get(0))?;

        Ok((summaries, total))
    }

    /// Update one post row: overwrite the payload, bump the last-modified
    /// timestamp, and append a modification note, all in a single atomic
    /// write. `extra_conditions` narrows the match beyond the key pair
    /// (unit-analysis edits pin the unit type through it).
    ///
    /// Returns `NotFound` without touching the store when `seq_id` is
    /// absent, or when the match conditions select zero rows.
    pub fn update_one(
        &self,
        conn: &Connection,
        seq_id: Option<i64>,
        lang_code: &str,
        new_payload: &JsonValue,
        modify_note: &str,
        extra_conditions: &[(&'static str, i64)],
    ) -> Result<UpdateOutcome, error::LorekeeperError> {
        let Some(seq_id) = seq_id.filter(|id| *id > 0) else {
            return Ok(UpdateOutcome::NotFound);
        };
        let s = self.schema;

        let now = time::now_epoch_ms();
        let note = serde_json::to_string(&ModifyNote {
            dt: now.clone(),
            note: modify_note.to_string(),
        })?;
        let payload_text = serde_json::to_string(new_payload)?;

        let mut sql = format!(
            "UPDATE {table} SET {payload} = ?1, {modified} = ?2,
                 {notes} = json_insert({notes}, '$[#]', json(?3))
             WHERE {seq} = ?4 AND {lang} = ?5",
            table = s.table,
            payload = s.payload,
            modified = s.last_modified_at,
            notes = s.modify_notes,
            seq = s.seq_id,
            lang = s.lang_code,
        );
        let mut args: Vec<Box<dyn ToSql>> = vec![
            Box::new(payload_text),
            Box::new(now),
            Box::new(note),
            Box::new(seq_id),
            Box::new(lang_code.to_string()),
        ];
        for (column, value) in extra_conditions {
            sql.push_str(&format!(" AND {} = ?{}", column, args.len() + 1));
            args.push(Box::new(*value));
        }

        let args_as_dyn: Vec<&dyn ToSql> = args.iter().map(|p| p.as_ref()).collect();
        let changed = conn.execute(
            &sql,
            rusqlite::params_from_iter(args_as_dyn.iter().copied()),
        )?;

        if changed == 0 {
            return Ok(UpdateOutcome::NotFound);
        }
        Ok(UpdateOutcome::Updated)
    }

    /// Insert a new language row, allocating a fresh sequence ID when none
    /// is supplied. Returns the sequence ID of the published post.
    pub fn insert(
        &self,
        conn: &Connection,
        seq_id: Option<i64>,
        lang_code: &str,
        unit_type: Option<i64>,
        payload: &JsonValue,
    ) -> Result<i64, error::LorekeeperError> {
        let s = self.schema;
        let seq_id = match seq_id.filter(|id| *id > 0) {
            Some(id) => id,
            None => sequence::allocate(conn, s.counter)?,
        };
        let now = time::now_epoch_ms();
        let payload_text = serde_json::to_string(payload)?;

        if let Some(type_col) = s.unit_type {
            let unit_type = unit_type.ok_or_else(|| {
                error::LorekeeperError::ValidationError(format!(
                    "{} rows require a unit type",
                    s.table
                ))
            })?;
            let sql = format!(
                "INSERT INTO {table}({seq}, {lang}, {type_col}, {view}, {published}, {modified}, {notes}, {payload})
                 VALUES(?1, ?2, ?3, 0, ?4, ?4, '[]', ?5)",
                table = s.table,
                seq = s.seq_id,
                lang = s.lang_code,
                view = s.view_count,
                published = s.published_at,
                modified = s.last_modified_at,
                notes = s.modify_notes,
                payload = s.payload,
            );
            conn.execute(&sql, params![seq_id, lang_code, unit_type, now, payload_text])?;
        } else {
            let sql = format!(
                "INSERT INTO {table}({seq}, {lang}, {view}, {published}, {modified}, {notes}, {payload})
                 VALUES(?1, ?2, 0, ?3, ?3, '[]', ?4)",
                table = s.table,
                seq = s.seq_id,
                lang = s.lang_code,
                view = s.view_count,
                published = s.published_at,
                modified = s.last_modified_at,
                notes = s.modify_notes,
                payload = s.payload,
            );
            conn.execute(&sql, params![seq_id, lang_code, now, payload_text])?;
        }

        Ok(seq_id)
    }

    fn record_columns(&self) -> String {
        let s = self.schema;
        let mut cols = vec![
            s.seq_id,
            s.lang_code,
            s.view_count,
            s.published_at,
            s.last_modified_at,
            s.modify_notes,
            s.payload,
        ];
        if let Some(type_col) = s.unit_type {
            cols.push(type_col);
        }
        cols.join(", ")
    }

    fn row_to_record(&self, row: &Row) -> rusqlite::Result<PostRecord> {
        let notes_raw: String = row.get(5)?;
        let modify_notes: Vec<ModifyNote> = serde_json::from_str(&notes_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let payload_raw: String = row.get(6)?;
        let payload: JsonValue = serde_json::from_str(&payload_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let unit_type = if self.schema.unit_type.is_some() {
            Some(row.get(7)?)
        } else {
            None
        };

        Ok(PostRecord {
            seq_id: row.get(0)?,
            lang_code: row.get(1)?,
            unit_type,
            view_count: row.get(2)?,
            published_at: row.get(3)?,
            last_modified_at: row.get(4)?,
            modify_notes,
            payload,
        })
    }

    fn row_to_summary(&self, row: &Row) -> rusqlite::Result<PostSummary> {
        let has_type = self.schema.unit_type.is_some();
        let unit_type = if has_type { Some(row.get(5)?) } else { None };
        let field_base = if has_type { 6 } else { 5 };

        let mut fields = serde_json::Map::new();
        for (offset, key) in self.schema.summary_keys.iter().enumerate() {
            let value: rusqlite::types::Value = row.get(field_base + offset)?;
            fields.insert((*key).to_string(), sql_value_to_json(value));
        }

        Ok(PostSummary {
            seq_id: row.get(0)?,
            lang_code: row.get(1)?,
            unit_type,
            view_count: row.get(2)?,
            published_at: row.get(3)?,
            last_modified_at: row.get(4)?,
            fields,
        })
    }
}

fn sql_value_to_json(value: rusqlite::types::Value) -> JsonValue {
    use rusqlite::types::Value;
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => JsonValue::from(i),
        Value::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Text(t) => JsonValue::String(t),
        Value::Blob(_) => JsonValue::Null,
    }
}

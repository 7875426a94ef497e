//! Centralized database schema definitions for Lorekeeper's stores.
//!
//! Lorekeeper uses 2 SQLite databases:
//! 1. post.db: both post families plus the sequence-counter table.
//! 2. user.db: external-identity login/admin state.

// --- 1. Post database ---
pub const POST_DB_NAME: &str = "post.db";

pub const POST_DB_SCHEMA_QUEST: &str = "
    CREATE TABLE IF NOT EXISTS quest_posts (
        seq_id INTEGER NOT NULL,
        lang_code TEXT NOT NULL,
        view_count INTEGER NOT NULL DEFAULT 0,
        published_at TEXT NOT NULL,
        last_modified_at TEXT NOT NULL,
        modify_notes TEXT NOT NULL DEFAULT '[]', -- JSON array of {dt, note}
        payload TEXT NOT NULL,                   -- JSON object of quest fields
        PRIMARY KEY (seq_id, lang_code)
    )
";
pub const POST_DB_SCHEMA_QUEST_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS idx_quest_lang_modified
    ON quest_posts(lang_code, last_modified_at DESC)
";

pub const POST_DB_SCHEMA_ANALYSIS: &str = "
    CREATE TABLE IF NOT EXISTS analysis_posts (
        seq_id INTEGER NOT NULL,
        lang_code TEXT NOT NULL,
        unit_type INTEGER NOT NULL,              -- 1 = character, 2 = dragon
        view_count INTEGER NOT NULL DEFAULT 0,
        published_at TEXT NOT NULL,
        last_modified_at TEXT NOT NULL,
        modify_notes TEXT NOT NULL DEFAULT '[]',
        payload TEXT NOT NULL,
        PRIMARY KEY (seq_id, lang_code)
    )
";
pub const POST_DB_SCHEMA_ANALYSIS_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS idx_analysis_lang_modified
    ON analysis_posts(lang_code, last_modified_at DESC)
";

pub const POST_DB_SCHEMA_COUNTERS: &str = "
    CREATE TABLE IF NOT EXISTS sequence_counters (
        collection TEXT PRIMARY KEY,
        next_value INTEGER NOT NULL
    )
";

// --- 2. User database ---
pub const USER_DB_NAME: &str = "user.db";

pub const USER_DB_SCHEMA_USERS: &str = "
    CREATE TABLE IF NOT EXISTS users (
        uid TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        login_count INTEGER NOT NULL DEFAULT 0,
        last_login_at TEXT NOT NULL,
        is_admin INTEGER NOT NULL DEFAULT 0,
        ads_disabled_until TEXT
    )
";

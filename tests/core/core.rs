use lorekeeper::core::audit::{self, MutationEvent};
use lorekeeper::core::db;
use lorekeeper::core::error::LorekeeperError;
use lorekeeper::core::record::{RecordStore, UpdateOutcome};
use lorekeeper::core::sequence;
use lorekeeper::services::quest::QUEST_SCHEMA;
use serde_json::json;
use std::fs;
use std::sync::{Arc, Barrier, Mutex};
use tempfile::tempdir;

#[test]
fn db_init_creates_tables_and_audits() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();

    db::initialize_post_db(root).expect("post init");
    db::initialize_user_db(root).expect("user init");
    assert!(db::post_db_path(root).exists());
    assert!(db::user_db_path(root).exists());

    let conn = db::db_connect(&db::post_db_path(root).to_string_lossy()).expect("db connect");
    let fk_on: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("pragma foreign_keys");
    assert_eq!(fk_on, 1);

    for table in ["quest_posts", "analysis_posts", "sequence_counters"] {
        let found: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .expect("table lookup");
        assert_eq!(found, 1, "missing table {}", table);
    }

    let audit_path = audit::audit_log_path(root);
    assert!(audit_path.exists());
    let events: Vec<MutationEvent> = fs::read_to_string(&audit_path)
        .expect("read audit")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid mutation event json"))
        .collect();
    assert!(events.iter().any(|ev| ev.op == "post.init"));
    assert!(events.iter().any(|ev| ev.op == "user.init"));
    assert!(events.iter().all(|ev| ev.status == "success"));
}

#[test]
fn with_conn_audits_failures_too() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_post_db(root).expect("post init");

    let result: Result<(), LorekeeperError> = db::with_conn(
        root,
        &db::post_db_path(root),
        "test.fail",
        |_| Err(LorekeeperError::ValidationError("intentional".to_string())),
    );
    assert!(result.is_err());

    let events = audit::read_events(root).expect("read events");
    assert!(
        events
            .iter()
            .any(|ev| ev.op == "test.fail" && ev.status == "error")
    );
}

#[test]
fn sequence_allocation_is_sequential_and_gap_free() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_post_db(root).expect("post init");

    let conn = db::db_connect(&db::post_db_path(root).to_string_lossy()).expect("connect");

    assert_eq!(sequence::peek(&conn, "quest").expect("peek"), 0);

    for expected in 1..=5 {
        let value = sequence::allocate(&conn, "quest").expect("allocate");
        assert_eq!(value, expected);
    }
    assert_eq!(sequence::peek(&conn, "quest").expect("peek"), 5);
    // peek never increments
    assert_eq!(sequence::peek(&conn, "quest").expect("peek"), 5);

    // Counters are independent per collection.
    assert_eq!(sequence::peek(&conn, "analysis").expect("peek"), 0);
    assert_eq!(sequence::allocate(&conn, "analysis").expect("allocate"), 1);
    assert_eq!(sequence::peek(&conn, "quest").expect("peek"), 5);
}

#[test]
fn sequence_allocation_is_unique_under_concurrency() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().to_path_buf();
    db::initialize_post_db(&root).expect("post init");

    const THREADS: usize = 4;
    const ALLOCS_PER_THREAD: usize = 5;

    let barrier = Arc::new(Barrier::new(THREADS));
    let issued = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();

    for _ in 0..THREADS {
        let barrier = Arc::clone(&barrier);
        let issued = Arc::clone(&issued);
        let db_path = db::post_db_path(&root);
        handles.push(std::thread::spawn(move || {
            let conn = db::db_connect(&db_path.to_string_lossy()).expect("connect");
            barrier.wait();
            for _ in 0..ALLOCS_PER_THREAD {
                let value = sequence::allocate(&conn, "quest").expect("allocate");
                issued.lock().unwrap().push(value);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("thread join");
    }

    let mut issued = Arc::try_unwrap(issued).unwrap().into_inner().unwrap();
    assert_eq!(issued.len(), THREADS * ALLOCS_PER_THREAD);
    issued.sort_unstable();
    issued.dedup();
    assert_eq!(
        issued.len(),
        THREADS * ALLOCS_PER_THREAD,
        "duplicate sequence IDs issued under concurrent allocation"
    );

    let conn = db::db_connect(&db::post_db_path(&root).to_string_lossy()).expect("connect");
    assert_eq!(
        sequence::peek(&conn, "quest").expect("peek"),
        (THREADS * ALLOCS_PER_THREAD) as i64
    );
}

#[test]
fn get_one_without_seq_id_short_circuits() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_post_db(root).expect("post init");

    let conn = db::db_connect(&db::post_db_path(root).to_string_lossy()).expect("connect");
    let records = RecordStore::new(&QUEST_SCHEMA);

    let result = records.get_one(&conn, None, "en", true).expect("get_one");
    assert!(result.data.is_none());
    assert!(!result.is_alt_language);
    assert!(result.other_languages.is_empty());

    let result = records.get_one(&conn, Some(0), "en", true).expect("get_one");
    assert!(result.data.is_none());
    assert!(!result.is_alt_language);
}

#[test]
fn get_one_falls_back_to_alternate_language() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_post_db(root).expect("post init");

    let conn = db::db_connect(&db::post_db_path(root).to_string_lossy()).expect("connect");
    let records = RecordStore::new(&QUEST_SCHEMA);

    let payload = json!({"title": "Solo guide", "general_info": "", "video": "",
        "positional_info": [], "addendum": ""});
    let seq_id = records.insert(&conn, None, "en", None, &payload).expect("insert");
    assert_eq!(seq_id, 1);

    let result = records.get_one(&conn, Some(seq_id), "fr", true).expect("get_one");
    let post = result.data.expect("fallback row");
    assert!(result.is_alt_language);
    assert_eq!(post.lang_code, "en");
    assert_eq!(post.view_count, 1);
    assert_eq!(result.other_languages, vec!["en".to_string()]);

    // Exact-language hit counts too, and reports no mismatch.
    let result = records.get_one(&conn, Some(seq_id), "en", true).expect("get_one");
    let post = result.data.expect("exact row");
    assert!(!result.is_alt_language);
    assert_eq!(post.view_count, 2);
    assert!(result.other_languages.is_empty());

    // An uncounted fetch touches nothing and skips the language scan.
    let result = records.get_one(&conn, Some(seq_id), "en", false).expect("get_one");
    let post = result.data.expect("exact row");
    assert_eq!(post.view_count, 2);
    assert!(result.other_languages.is_empty());
}

#[test]
fn update_one_missing_row_is_not_found_and_writes_nothing() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_post_db(root).expect("post init");

    let conn = db::db_connect(&db::post_db_path(root).to_string_lossy()).expect("connect");
    let records = RecordStore::new(&QUEST_SCHEMA);

    let outcome = records
        .update_one(&conn, Some(99), "en", &json!({"title": "x"}), "note", &[])
        .expect("update_one");
    assert_eq!(outcome, UpdateOutcome::NotFound);

    let outcome = records
        .update_one(&conn, None, "en", &json!({"title": "x"}), "note", &[])
        .expect("update_one");
    assert_eq!(outcome, UpdateOutcome::NotFound);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM quest_posts", [], |row| row.get(0))
        .expect("count");
    assert_eq!(rows, 0);
}

#[test]
fn update_one_appends_history_atomically() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_post_db(root).expect("post init");

    let conn = db::db_connect(&db::post_db_path(root).to_string_lossy()).expect("connect");
    let records = RecordStore::new(&QUEST_SCHEMA);

    let payload = json!({"title": "v1", "general_info": "", "video": "",
        "positional_info": [], "addendum": ""});
    let seq_id = records.insert(&conn, None, "en", None, &payload).expect("insert");

    let outcome = records
        .update_one(&conn, Some(seq_id), "en", &json!({"title": "v2"}), "retitle", &[])
        .expect("update_one");
    assert_eq!(outcome, UpdateOutcome::Updated);

    let result = records.get_one(&conn, Some(seq_id), "en", false).expect("get_one");
    let post = result.data.expect("row");
    assert_eq!(post.payload["title"], "v2");
    assert_eq!(post.modify_notes.len(), 1);
    assert_eq!(post.modify_notes[0].note, "retitle");
    assert_eq!(post.modify_notes[0].dt, post.last_modified_at);
    assert!(post.last_modified_at >= post.published_at);

    // Identical field values still append: the history is the change.
    let outcome = records
        .update_one(&conn, Some(seq_id), "en", &json!({"title": "v2"}), "no-op edit", &[])
        .expect("update_one");
    assert_eq!(outcome, UpdateOutcome::Updated);
    let result = records.get_one(&conn, Some(seq_id), "en", false).expect("get_one");
    assert_eq!(result.data.expect("row").modify_notes.len(), 2);
}

#[test]
fn id_language_availability_matrix() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_post_db(root).expect("post init");

    let conn = db::db_connect(&db::post_db_path(root).to_string_lossy()).expect("connect");
    let records = RecordStore::new(&QUEST_SCHEMA);

    // A fresh ID is always available, whatever the language.
    assert!(records.is_id_language_available(&conn, None, "en").expect("check"));
    assert!(records.is_id_language_available(&conn, None, "cht").expect("check"));

    let payload = json!({"title": "t", "general_info": "", "video": "",
        "positional_info": [], "addendum": ""});
    let seq_id = records.insert(&conn, None, "en", None, &payload).expect("insert");

    // Never-issued IDs are unavailable.
    assert!(!records.is_id_language_available(&conn, Some(seq_id + 1), "en").expect("check"));
    // Taken pair is unavailable; same ID in another language is free.
    assert!(!records.is_id_language_available(&conn, Some(seq_id), "en").expect("check"));
    assert!(records.is_id_language_available(&conn, Some(seq_id), "jp").expect("check"));
}

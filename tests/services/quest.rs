use lorekeeper::core::db;
use lorekeeper::core::error::LorekeeperError;
use lorekeeper::core::record::UpdateOutcome;
use lorekeeper::core::store::Store;
use lorekeeper::services::quest::{QuestPostDraft, QuestPostService};
use serde_json::json;
use tempfile::tempdir;

fn service_in(root: &std::path::Path) -> QuestPostService {
    db::initialize_post_db(root).expect("post init");
    QuestPostService::new(Store {
        root: root.to_path_buf(),
    })
}

fn complete_positional_info() -> Vec<serde_json::Value> {
    ["DPS 1", "DPS 2", "Healer", "Support"]
        .iter()
        .map(|position| {
            json!({
                "position": position,
                "builds": "standard build",
                "rotations": "standard rotation",
                "tips": "stay behind the boss",
            })
        })
        .collect()
}

fn boss_draft(title: &str) -> QuestPostDraft {
    QuestPostDraft {
        title: title.to_string(),
        general_info: "HP 10M, flame".to_string(),
        video: "https://example.com/run".to_string(),
        positional_info: complete_positional_info(),
        addendum: "".to_string(),
    }
}

#[test]
fn publish_list_get_end_to_end() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let seq_id = service
        .publish("en", &boss_draft("Boss A"), None)
        .expect("publish");
    assert_eq!(seq_id, 1);

    let (posts, total) = service.list("en", 0, 25).expect("list");
    assert_eq!(total, 1);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].seq_id, 1);
    assert_eq!(posts[0].fields["title"], "Boss A");
    assert_eq!(posts[0].view_count, 0);

    let result = service.get(Some(1), "en", true).expect("get");
    let post = result.data.expect("post");
    assert!(!result.is_alt_language);
    assert_eq!(post.view_count, 1);
    assert_eq!(post.payload["title"], "Boss A");
    assert_eq!(post.payload["positional_info"].as_array().unwrap().len(), 4);
}

#[test]
fn publish_with_explicit_seq_id_adds_language_variant() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let seq_id = service
        .publish("en", &boss_draft("Boss A"), None)
        .expect("publish en");
    let same = service
        .publish("cht", &boss_draft("魔王 A"), Some(seq_id))
        .expect("publish cht");
    assert_eq!(same, seq_id);

    // The explicit reuse did not burn a fresh ID.
    let next = service
        .publish("en", &boss_draft("Boss B"), None)
        .expect("publish next");
    assert_eq!(next, seq_id + 1);

    let result = service.get(Some(seq_id), "cht", true).expect("get");
    let post = result.data.expect("post");
    assert!(!result.is_alt_language);
    assert_eq!(post.payload["title"], "魔王 A");
    assert_eq!(result.other_languages, vec!["en".to_string()]);
}

#[test]
fn alt_language_fallback_flags_the_mismatch() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let seq_id = service
        .publish("en", &boss_draft("Boss A"), None)
        .expect("publish");

    let result = service.get(Some(seq_id), "fr", true).expect("get");
    let post = result.data.expect("fallback post");
    assert!(result.is_alt_language);
    assert_eq!(post.lang_code, "en");
    assert!(result.other_languages.contains(&"en".to_string()));
}

#[test]
fn get_without_seq_id_returns_nothing() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let result = service.get(None, "en", true).expect("get");
    assert!(result.data.is_none());
    assert!(!result.is_alt_language);
    assert!(result.other_languages.is_empty());
}

#[test]
fn incomplete_positional_info_rejects_publish_without_writing() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let mut draft = boss_draft("Boss A");
    draft.positional_info[2] = json!({
        "position": "Healer",
        "builds": "standard build",
        "rotations": "standard rotation",
        // "tips" missing
    });

    let err = service.publish("en", &draft, None).expect_err("must reject");
    assert!(matches!(err, LorekeeperError::ValidationError(_)));

    let (_, total) = service.list("en", 0, 0).expect("list");
    assert_eq!(total, 0);
}

#[test]
fn incomplete_positional_info_rejects_edit_without_writing() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let seq_id = service
        .publish("en", &boss_draft("Boss A"), None)
        .expect("publish");
    let before = service
        .get(Some(seq_id), "en", false)
        .expect("get")
        .data
        .expect("post");

    let mut draft = boss_draft("Boss A");
    draft.positional_info[0] = json!({"position": "DPS 1", "extra": "?"});
    let err = service
        .edit(Some(seq_id), "en", &draft, "broken edit")
        .expect_err("must reject");
    assert!(matches!(err, LorekeeperError::ValidationError(_)));

    let after = service
        .get(Some(seq_id), "en", false)
        .expect("get")
        .data
        .expect("post");
    assert_eq!(after.last_modified_at, before.last_modified_at);
    assert_eq!(after.modify_notes, before.modify_notes);
}

#[test]
fn edit_appends_one_history_entry_per_edit() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let seq_id = service
        .publish("en", &boss_draft("Boss A"), None)
        .expect("publish");

    let outcome = service
        .edit(Some(seq_id), "en", &boss_draft("Boss A (revised)"), "retitle")
        .expect("edit");
    assert_eq!(outcome, UpdateOutcome::Updated);

    let post = service
        .get(Some(seq_id), "en", false)
        .expect("get")
        .data
        .expect("post");
    assert_eq!(post.payload["title"], "Boss A (revised)");
    assert_eq!(post.modify_notes.len(), 1);
    assert_eq!(post.modify_notes[0].note, "retitle");
    assert!(post.last_modified_at >= post.published_at);

    // Same field values again: the note still lands.
    let outcome = service
        .edit(Some(seq_id), "en", &boss_draft("Boss A (revised)"), "touch")
        .expect("edit");
    assert_eq!(outcome, UpdateOutcome::Updated);
    let post = service
        .get(Some(seq_id), "en", false)
        .expect("get")
        .data
        .expect("post");
    assert_eq!(post.modify_notes.len(), 2);
}

#[test]
fn edit_missing_post_is_not_found() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let outcome = service
        .edit(Some(7), "en", &boss_draft("ghost"), "note")
        .expect("edit");
    assert_eq!(outcome, UpdateOutcome::NotFound);

    let outcome = service
        .edit(None, "en", &boss_draft("ghost"), "note")
        .expect("edit");
    assert_eq!(outcome, UpdateOutcome::NotFound);
}

#[test]
fn list_is_sorted_by_last_modified_desc_and_scoped_to_language() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    let first = service
        .publish("en", &boss_draft("Boss A"), None)
        .expect("publish");
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = service
        .publish("en", &boss_draft("Boss B"), None)
        .expect("publish");
    service
        .publish("cht", &boss_draft("魔王 C"), None)
        .expect("publish cht");

    let (posts, total) = service.list("en", 0, 25).expect("list");
    assert_eq!(total, 2);
    assert_eq!(posts[0].seq_id, second);
    assert_eq!(posts[1].seq_id, first);

    // Editing the older post moves it back to the top.
    std::thread::sleep(std::time::Duration::from_millis(5));
    service
        .edit(Some(first), "en", &boss_draft("Boss A+"), "bump")
        .expect("edit");
    let (posts, _) = service.list("en", 0, 25).expect("list");
    assert_eq!(posts[0].seq_id, first);

    // Paging: start=1 skips the newest row.
    let (page, total) = service.list("en", 1, 1).expect("list");
    assert_eq!(total, 2);
    assert_eq!(page.len(), 1);
}

#[test]
fn availability_checks_cover_fresh_unissued_and_taken_ids() {
    let tmp = tempdir().expect("tempdir");
    let service = service_in(tmp.path());

    assert!(service.is_id_language_available(None, "en").expect("check"));

    let seq_id = service
        .publish("en", &boss_draft("Boss A"), None)
        .expect("publish");
    assert!(!service.is_id_language_available(Some(seq_id + 1), "en").expect("check"));
    assert!(!service.is_id_language_available(Some(seq_id), "en").expect("check"));
    assert!(service.is_id_language_available(Some(seq_id), "jp").expect("check"));
}

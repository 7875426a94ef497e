//! Quest post service: guides for a single quest/boss, published per
//! language under one shared sequential identity.

use crate::core::db;
use crate::core::error;
use crate::core::record::{GetOneResult, PostSummary, RecordSchema, RecordStore, UpdateOutcome};
use crate::core::store::Store;
use crate::services::identity::UserIdentityService;
use crate::services::{
    ensure_entries_complete, parse_json_entries, print_envelope, validate_lang_code,
};
use clap::Subcommand;
use serde_json::Value as JsonValue;
use serde_json::json;

/// Sequence-counter collection backing quest post IDs.
pub const QUEST_COLLECTION: &str = "quest";

/// Required key set of one positional-info entry.
pub const POSITIONAL_INFO_KEYS: [&str; 4] = ["position", "builds", "rotations", "tips"];

/// Column layout of `quest_posts`.
pub static QUEST_SCHEMA: RecordSchema = RecordSchema {
    table: "quest_posts",
    counter: QUEST_COLLECTION,
    seq_id: "seq_id",
    lang_code: "lang_code",
    view_count: "view_count",
    published_at: "published_at",
    last_modified_at: "last_modified_at",
    modify_notes: "modify_notes",
    payload: "payload",
    unit_type: None,
    summary_keys: &["title"],
};

/// Payload of one quest post language variant, pre-shaped by the boundary.
#[derive(Debug, Clone)]
pub struct QuestPostDraft {
    pub title: String,
    pub general_info: String,
    pub video: String,
    /// Structured entries, one per position; each must carry exactly
    /// [`POSITIONAL_INFO_KEYS`].
    pub positional_info: Vec<JsonValue>,
    pub addendum: String,
}

impl QuestPostDraft {
    fn validate(&self) -> Result<(), error::LorekeeperError> {
        ensure_entries_complete(&self.positional_info, &POSITIONAL_INFO_KEYS, "positional info")
    }

    fn to_payload(&self) -> JsonValue {
        json!({
            "title": self.title,
            "general_info": self.general_info,
            "video": self.video,
            "positional_info": self.positional_info,
            "addendum": self.addendum,
        })
    }
}

/// Quest post data service.
pub struct QuestPostService {
    store: Store,
    records: RecordStore,
}

impl QuestPostService {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            records: RecordStore::new(&QUEST_SCHEMA),
        }
    }

    /// Publish a quest post and get its sequential ID.
    ///
    /// Without `seq_id` a fresh ID is allocated; with one, the row becomes
    /// a new language variant of that existing logical post.
    pub fn publish(
        &self,
        lang_code: &str,
        draft: &QuestPostDraft,
        seq_id: Option<i64>,
    ) -> Result<i64, error::LorekeeperError> {
        draft.validate()?;
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "quest.publish", |conn| {
            self.records
                .insert(conn, seq_id, lang_code, None, &draft.to_payload())
        })
    }

    /// Edit a quest post, replacing its payload and appending one
    /// modification note.
    pub fn edit(
        &self,
        seq_id: Option<i64>,
        lang_code: &str,
        draft: &QuestPostDraft,
        modify_note: &str,
    ) -> Result<UpdateOutcome, error::LorekeeperError> {
        draft.validate()?;
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "quest.edit", |conn| {
            self.records
                .update_one(conn, seq_id, lang_code, &draft.to_payload(), modify_note, &[])
        })
    }

    /// Get a post by `(seq_id, lang_code)`, falling back to any available
    /// language. `increase_view_count` is false only for edit-mode fetches.
    pub fn get(
        &self,
        seq_id: Option<i64>,
        lang_code: &str,
        increase_view_count: bool,
    ) -> Result<GetOneResult, error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "quest.get", |conn| {
            self.records.get_one(conn, seq_id, lang_code, increase_view_count)
        })
    }

    /// List one language's posts, last-modified first.
    pub fn list(
        &self,
        lang_code: &str,
        start: i64,
        limit: i64,
    ) -> Result<(Vec<PostSummary>, i64), error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "quest.list", |conn| {
            self.records.get_list(conn, lang_code, start, limit)
        })
    }

    pub fn is_id_language_available(
        &self,
        seq_id: Option<i64>,
        lang_code: &str,
    ) -> Result<bool, error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "quest.id-check", |conn| {
            self.records.is_id_language_available(conn, seq_id, lang_code)
        })
    }
}

#[derive(clap::Parser, Debug)]
#[clap(name = "quest", about = "Publish and serve quest posts.")]
pub struct QuestCli {
    #[clap(subcommand)]
    command: QuestCommand,
}

#[derive(Subcommand, Debug)]
pub enum QuestCommand {
    /// Publish a quest post (admin only).
    Publish {
        /// External UID of the caller.
        #[clap(long)]
        uid: String,
        #[clap(long, value_parser = validate_lang_code)]
        lang: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        general: String,
        #[clap(long, default_value = "")]
        video: String,
        /// JSON array of positional-info entries.
        #[clap(long)]
        positional: String,
        #[clap(long, default_value = "")]
        addendum: String,
        /// Reuse an existing sequential ID to add a language variant.
        #[clap(long)]
        seq_id: Option<i64>,
    },
    /// Edit a quest post (admin only).
    Edit {
        #[clap(long)]
        uid: String,
        #[clap(long)]
        seq_id: Option<i64>,
        #[clap(long, value_parser = validate_lang_code)]
        lang: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        general: String,
        #[clap(long, default_value = "")]
        video: String,
        #[clap(long)]
        positional: String,
        #[clap(long, default_value = "")]
        addendum: String,
        #[clap(long)]
        modify_note: String,
    },
    /// Get a quest post, counting the view unless --no-count.
    Get {
        #[clap(long)]
        seq_id: Option<i64>,
        #[clap(long, default_value = "cht", value_parser = validate_lang_code)]
        lang: String,
        /// Fetch without counting the view (edit-mode fetch).
        #[clap(long)]
        no_count: bool,
    },
    /// List quest posts for one language.
    List {
        #[clap(long, default_value = "cht", value_parser = validate_lang_code)]
        lang: String,
        #[clap(long, default_value = "0")]
        start: i64,
        #[clap(long, default_value = "25")]
        limit: i64,
    },
    /// Check if an ID/language combination is available (admin only).
    IdCheck {
        #[clap(long)]
        uid: String,
        #[clap(long)]
        seq_id: Option<i64>,
        #[clap(long, value_parser = validate_lang_code)]
        lang: String,
    },
}

pub fn run_quest_cli(
    service: &QuestPostService,
    identity: &UserIdentityService,
    cli: QuestCli,
) -> Result<(), error::LorekeeperError> {
    match cli.command {
        QuestCommand::Publish {
            uid,
            lang,
            title,
            general,
            video,
            positional,
            addendum,
            seq_id,
        } => {
            if !identity.is_admin(Some(&uid))? {
                return Err(error::LorekeeperError::Unauthorized(
                    "only site admins can publish quest posts".into(),
                ));
            }
            let draft = QuestPostDraft {
                title,
                general_info: general,
                video,
                positional_info: parse_json_entries(&positional, "positional info")?,
                addendum,
            };
            let new_seq_id = service.publish(&lang, &draft, seq_id)?;
            print_envelope("quest.publish", "ok", json!({ "seq_id": new_seq_id }));
        }
        QuestCommand::Edit {
            uid,
            seq_id,
            lang,
            title,
            general,
            video,
            positional,
            addendum,
            modify_note,
        } => {
            if !identity.is_admin(Some(&uid))? {
                return Err(error::LorekeeperError::Unauthorized(
                    "only site admins can edit quest posts".into(),
                ));
            }
            let draft = QuestPostDraft {
                title,
                general_info: general,
                video,
                positional_info: parse_json_entries(&positional, "positional info")?,
                addendum,
            };
            let outcome = service.edit(seq_id, &lang, &draft, &modify_note)?;
            print_envelope("quest.edit", outcome.as_str(), json!({ "seq_id": seq_id }));
        }
        QuestCommand::Get {
            seq_id,
            lang,
            no_count,
        } => {
            let result = service.get(seq_id, &lang, !no_count)?;
            let status = if result.data.is_some() { "ok" } else { "not_found" };
            print_envelope(
                "quest.get",
                status,
                json!({
                    "post": result.data,
                    "is_alt_language": result.is_alt_language,
                    "other_languages": result.other_languages,
                }),
            );
        }
        QuestCommand::List { lang, start, limit } => {
            let (posts, total) = service.list(&lang, start, limit)?;
            print_envelope(
                "quest.list",
                "ok",
                json!({ "posts": posts, "total": total, "start": start, "limit": limit }),
            );
        }
        QuestCommand::IdCheck { uid, seq_id, lang } => {
            // Non-admins get a flat "unavailable" rather than an error, so
            // the check leaks no ID-existence information.
            let available = if identity.is_admin(Some(&uid))? {
                service.is_id_language_available(seq_id, &lang)?
            } else {
                false
            };
            print_envelope("quest.id-check", "ok", json!({ "available": available }));
        }
    }
    Ok(())
}

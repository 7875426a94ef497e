//! Unit analysis post service: character and dragon analyses share one
//! post family (and one ID space), discriminated by unit type.

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

/// Sequence-counter collection backing analysis post IDs.
pub const ANALYSIS_COLLECTION: &str = "analysis";

/// Required key set of one character skill entry.
pub const SKILL_KEYS: [&str; 4] = ["name", "info", "rotations", "tips"];

/// Column layout of `analysis_posts`.
pub static ANALYSIS_SCHEMA: RecordSchema = RecordSchema {
    table: "analysis_posts",
    counter: ANALYSIS_COLLECTION,
    seq_id: "seq_id",
    lang_code: "lang_code",
    view_count: "view_count",
    published_at: "published_at",
    last_modified_at: "last_modified_at",
    modify_notes: "modify_notes",
    payload: "payload",
    unit_type: Some("unit_type"),
    summary_keys: &["name"],
};

/// Type of the analyzed unit. Character and dragon payloads are disjoint
/// in their specific fields but share the common envelope; edits pin the
/// type so they can never cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    Character,
    Dragon,
}

impl UnitType {
    pub const fn code(self) -> i64 {
        match self {
            Self::Character => 1,
            Self::Dragon => 2,
        }
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Character),
            2 => Some(Self::Dragon),
            _ => None,
        }
    }
}

/// Payload of one character analysis language variant.
#[derive(Debug, Clone)]
pub struct CharacterAnalysisDraft {
    pub name: String,
    pub summary: String,
    pub summon_result: String,
    pub passives: String,
    pub normal_attacks: String,
    pub force_strikes: String,
    /// Structured entries, one per skill; each must carry exactly
    /// [`SKILL_KEYS`].
    pub skills: Vec<JsonValue>,
    pub tips_builds: String,
    pub videos: String,
    pub story: String,
    pub keywords: String,
}

impl CharacterAnalysisDraft {
    fn validate(&self) -> Result<(), error::LorekeeperError> {
        ensure_entries_complete(&self.skills, &SKILL_KEYS, "skill data")
    }

    fn to_payload(&self) -> JsonValue {
        json!({
            "name": self.name,
            "summary": self.summary,
            "summon_result": self.summon_result,
            "passives": self.passives,
            "normal_attacks": self.normal_attacks,
            "force_strikes": self.force_strikes,
            "skills": self.skills,
            "tips_builds": self.tips_builds,
            "videos": self.videos,
            "story": self.story,
            "keywords": self.keywords,
        })
    }
}

/// Payload of one dragon analysis language variant. No structured
/// sub-documents, so no completeness precondition.
#[derive(Debug, Clone)]
pub struct DragonAnalysisDraft {
    pub name: String,
    pub summary: String,
    pub summon_result: String,
    pub passives: String,
    pub normal_attacks: String,
    pub ultimate: String,
    pub notes: String,
    pub suitable_characters: String,
    pub videos: String,
    pub story: String,
    pub keywords: String,
}

impl DragonAnalysisDraft {
    fn to_payload(&self) -> JsonValue {
        json!({
            "name": self.name,
            "summary": self.summary,
            "summon_result": self.summon_result,
            "passives": self.passives,
            "normal_attacks": self.normal_attacks,
            "ultimate": self.ultimate,
            "notes": self.notes,
            "suitable_characters": self.suitable_characters,
            "videos": self.videos,
            "story": self.story,
            "keywords": self.keywords,
        })
    }
}

/// Unit analysis post data service.
pub struct UnitAnalysisPostService {
    store: Store,
    records: RecordStore,
}

impl UnitAnalysisPostService {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            records: RecordStore::new(&ANALYSIS_SCHEMA),
        }
    }

    /// Publish a character analysis post and get its sequential ID.
    pub fn publish_character(
        &self,
        lang_code: &str,
        draft: &CharacterAnalysisDraft,
        seq_id: Option<i64>,
    ) -> Result<i64, error::LorekeeperError> {
        draft.validate()?;
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "analysis.publish-chara", |conn| {
            self.records.insert(
                conn,
                seq_id,
                lang_code,
                Some(UnitType::Character.code()),
                &draft.to_payload(),
            )
        })
    }

    /// Publish a dragon analysis post and get its sequential ID.
    pub fn publish_dragon(
        &self,
        lang_code: &str,
        draft: &DragonAnalysisDraft,
        seq_id: Option<i64>,
    ) -> Result<i64, error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "analysis.publish-dragon", |conn| {
            self.records.insert(
                conn,
                seq_id,
                lang_code,
                Some(UnitType::Dragon.code()),
                &draft.to_payload(),
            )
        })
    }

    /// Edit a character analysis post. The update is pinned to character
    /// rows: a matching `(seq_id, lang_code)` of the wrong type is
    /// `NotFound`, not an accidental rewrite.
    pub fn edit_character(
        &self,
        seq_id: Option<i64>,
        lang_code: &str,
        draft: &CharacterAnalysisDraft,
        modify_note: &str,
    ) -> Result<UpdateOutcome, error::LorekeeperError> {
        draft.validate()?;
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "analysis.edit-chara", |conn| {
            self.records.update_one(
                conn,
                seq_id,
                lang_code,
                &draft.to_payload(),
                modify_note,
                &[("unit_type", UnitType::Character.code())],
            )
        })
    }

    /// Edit a dragon analysis post, pinned to dragon rows.
    pub fn edit_dragon(
        &self,
        seq_id: Option<i64>,
        lang_code: &str,
        draft: &DragonAnalysisDraft,
        modify_note: &str,
    ) -> Result<UpdateOutcome, error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "analysis.edit-dragon", |conn| {
            self.records.update_one(
                conn,
                seq_id,
                lang_code,
                &draft.to_payload(),
                modify_note,
                &[("unit_type", UnitType::Dragon.code())],
            )
        })
    }

    /// Get a post by `(seq_id, lang_code)`, falling back to any available
    /// language.
    pub fn get(
        &self,
        seq_id: Option<i64>,
        lang_code: &str,
        increase_view_count: bool,
    ) -> Result<GetOneResult, error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "analysis.get", |conn| {
            self.records.get_one(conn, seq_id, lang_code, increase_view_count)
        })
    }

    /// List one language's posts, last-modified first. Summaries carry the
    /// unit type so the caller can badge character vs. dragon rows.
    pub fn list(
        &self,
        lang_code: &str,
        start: i64,
        limit: i64,
    ) -> Result<(Vec<PostSummary>, i64), error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "analysis.list", |conn| {
            self.records.get_list(conn, lang_code, start, limit)
        })
    }

    pub fn is_id_language_available(
        &self,
        seq_id: Option<i64>,
        lang_code: &str,
    ) -> Result<bool, error::LorekeeperError> {
        let db_path = db::post_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "analysis.id-check", |conn| {
            self.records.is_id_language_available(conn, seq_id, lang_code)
        })
    }
}

#[derive(clap::Parser, Debug)]
#[clap(name = "analysis", about = "Publish and serve unit analysis posts.")]
pub struct AnalysisCli {
    #[clap(subcommand)]
    command: AnalysisCommand,
}

#[derive(clap::Args, Debug)]
pub struct CharacterDraftArgs {
    #[clap(long)]
    pub name: String,
    #[clap(long, default_value = "")]
    pub summary: String,
    #[clap(long, default_value = "")]
    pub summon_result: String,
    #[clap(long, default_value = "")]
    pub passives: String,
    #[clap(long, default_value = "")]
    pub normal_attacks: String,
    #[clap(long, default_value = "")]
    pub force_strikes: String,
    /// JSON array of skill entries.
    #[clap(long, default_value = "[]")]
    pub skills: String,
    #[clap(long, default_value = "")]
    pub tips_builds: String,
    #[clap(long, default_value = "")]
    pub videos: String,
    #[clap(long, default_value = "")]
    pub story: String,
    #[clap(long, default_value = "")]
    pub keywords: String,
}

impl CharacterDraftArgs {
    fn into_draft(self) -> Result<CharacterAnalysisDraft, error::LorekeeperError> {
        Ok(CharacterAnalysisDraft {
            name: self.name,
            summary: self.summary,
            summon_result: self.summon_result,
            passives: self.passives,
            normal_attacks: self.normal_attacks,
            force_strikes: self.force_strikes,
            skills: parse_json_entries(&self.skills, "skill data")?,
            tips_builds: self.tips_builds,
            videos: self.videos,
            story: self.story,
            keywords: self.keywords,
        })
    }
}

#[derive(clap::Args, Debug)]
pub struct DragonDraftArgs {
    #[clap(long)]
    pub name: String,
    #[clap(long, default_value = "")]
    pub summary: String,
    #[clap(long, default_value = "")]
    pub summon_result: String,
    #[clap(long, default_value = "")]
    pub passives: String,
    #[clap(long, default_value = "")]
    pub normal_attacks: String,
    #[clap(long, default_value = "")]
    pub ultimate: String,
    #[clap(long, default_value = "")]
    pub notes: String,
    #[clap(long, default_value = "")]
    pub suitable_characters: String,
    #[clap(long, default_value = "")]
    pub videos: String,
    #[clap(long, default_value = "")]
    pub story: String,
    #[clap(long, default_value = "")]
    pub keywords: String,
}

impl DragonDraftArgs {
    fn into_draft(self) -> DragonAnalysisDraft {
        DragonAnalysisDraft {
            name: self.name,
            summary: self.summary,
            summon_result: self.summon_result,
            passives: self.passives,
            normal_attacks: self.normal_attacks,
            ultimate: self.ultimate,
            notes: self.notes,
            suitable_characters: self.suitable_characters,
            videos: self.videos,
            story: self.story,
            keywords: self.keywords,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum AnalysisCommand {
    /// Publish a character analysis post (admin only).
    PublishChara {
        #[clap(long)]
        uid: String,
        #[clap(long, value_parser = validate_lang_code)]
        lang: String,
        #[clap(flatten)]
        draft: CharacterDraftArgs,
        #[clap(long)]
        seq_id: Option<i64>,
    },
    /// Publish a dragon analysis post (admin only).
    PublishDragon {
        #[clap(long)]
        uid: String,
        #[clap(long, value_parser = validate_lang_code)]
        lang: String,
        #[clap(flatten)]
        draft: DragonDraftArgs,
        #[clap(long)]
        seq_id: Option<i64>,
    },
    /// Edit a character analysis post (admin only).
    EditChara {
        #[clap(long)]
        uid: String,
        #[clap(long)]
        seq_id: Option<i64>,
        #[clap(long, value_parser = validate_lang_code)]
        lang: String,
        #[clap(flatten)]
        draft: CharacterDraftArgs,
        #[clap(long)]
        modify_note: String,
    },
    /// Edit a dragon analysis post (admin only).
    EditDragon {
        #[clap(long)]
        uid: String,
        #[clap(long)]
        seq_id: Option<i64>,
        #[clap(long, value_parser = validate_lang_code)]
        lang: String,
        #[clap(flatten)]
        draft: DragonDraftArgs,
        #[clap(long)]
        modify_note: String,
    },
    /// Get an analysis post, counting the view unless --no-count.
    Get {
        #[clap(long)]
        seq_id: Option<i64>,
        #[clap(long, default_value = "cht", value_parser = validate_lang_code)]
        lang: String,
        #[clap(long)]
        no_count: bool,
    },
    /// List analysis posts for one language.
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

pub fn run_analysis_cli(
    service: &UnitAnalysisPostService,
    identity: &UserIdentityService,
    cli: AnalysisCli,
) -> Result<(), error::LorekeeperError> {
    match cli.command {
        AnalysisCommand::PublishChara {
            uid,
            lang,
            draft,
            seq_id,
        } => {
            require_admin(identity, &uid, "publish analysis posts")?;
            let new_seq_id = service.publish_character(&lang, &draft.into_draft()?, seq_id)?;
            print_envelope("analysis.publish-chara", "ok", json!({ "seq_id": new_seq_id }));
        }
        AnalysisCommand::PublishDragon {
            uid,
            lang,
            draft,
            seq_id,
        } => {
            require_admin(identity, &uid, "publish analysis posts")?;
            let new_seq_id = service.publish_dragon(&lang, &draft.into_draft(), seq_id)?;
            print_envelope("analysis.publish-dragon", "ok", json!({ "seq_id": new_seq_id }));
        }
        AnalysisCommand::EditChara {
            uid,
            seq_id,
            lang,
            draft,
            modify_note,
        } => {
            require_admin(identity, &uid, "edit analysis posts")?;
            let outcome = service.edit_character(seq_id, &lang, &draft.into_draft()?, &modify_note)?;
            print_envelope("analysis.edit-chara", outcome.as_str(), json!({ "seq_id": seq_id }));
        }
        AnalysisCommand::EditDragon {
            uid,
            seq_id,
            lang,
            draft,
            modify_note,
        } => {
            require_admin(identity, &uid, "edit analysis posts")?;
            let outcome = service.edit_dragon(seq_id, &lang, &draft.into_draft(), &modify_note)?;
            print_envelope("analysis.edit-dragon", outcome.as_str(), json!({ "seq_id": seq_id }));
        }
        AnalysisCommand::Get {
            seq_id,
            lang,
            no_count,
        } => {
            let result = service.get(seq_id, &lang, !no_count)?;
            let status = if result.data.is_some() { "ok" } else { "not_found" };
            print_envelope(
                "analysis.get",
                status,
                json!({
                    "post": result.data,
                    "is_alt_language": result.is_alt_language,
                    "other_languages": result.other_languages,
                }),
            );
        }
        AnalysisCommand::List { lang, start, limit } => {
            let (posts, total) = service.list(&lang, start, limit)?;
            print_envelope(
                "analysis.list",
                "ok",
                json!({ "posts": posts, "total": total, "start": start, "limit": limit }),
            );
        }
        AnalysisCommand::IdCheck { uid, seq_id, lang } => {
            let available = if identity.is_admin(Some(&uid))? {
                service.is_id_language_available(seq_id, &lang)?
            } else {
                false
            };
            print_envelope("analysis.id-check", "ok", json!({ "available": available }));
        }
    }
    Ok(())
}

fn require_admin(
    identity: &UserIdentityService,
    uid: &str,
    action: &str,
) -> Result<(), error::LorekeeperError> {
    if identity.is_admin(Some(uid))? {
        Ok(())
    } else {
        Err(error::LorekeeperError::Unauthorized(format!(
            "only site admins can {}",
            action
        )))
    }
}

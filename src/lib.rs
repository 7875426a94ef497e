//! Lorekeeper: a multilingual content backend for game-strategy wikis.
//!
//! One logical post — a quest guide or a unit analysis — exists as a set of
//! language variants sharing a single sequential ID. Readers always get
//! *some* content for a known ID: when their language was never authored,
//! the nearest variant is served and flagged as an alternate language.
//!
//! # Architecture
//!
//! - [`core`]: the generic multilingual record store, the sequence-number
//!   allocator, and the shared persistence primitives (SQLite, audit log,
//!   error taxonomy).
//! - [`services`]: the domain façades — quest posts, unit analysis posts,
//!   and external-identity tracking — plus their CLI surfaces.
//!
//! Every invariant rests on a single-statement atomic store operation:
//! IDs come from one upsert-returning counter bump, view counts move via
//! `UPDATE .. RETURNING`, and an edit's payload overwrite, timestamp bump,
//! and history append travel in one `UPDATE`. There is no in-process
//! locking and no multi-document transaction.
//!
//! # Layout on disk
//!
//! State lives under `<project>/.lorekeeper/data/`: `post.db` (both post
//! families plus sequence counters), `user.db` (identities), and
//! `mutations.events.jsonl` (the append-only access audit).

pub mod core;
pub mod services;

use crate::core::{audit, db, error, store::Store};
use crate::services::{analysis, identity, quest};

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "lorekeeper",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multilingual content backend for game-strategy wikis"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct InitCli {
    /// Directory to initialize (defaults to current working directory).
    #[clap(short, long)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap the data workspace
    #[clap(name = "init", visible_alias = "i")]
    Init(InitCli),

    /// Quest post publishing and retrieval
    #[clap(name = "quest", visible_alias = "q")]
    Quest(quest::QuestCli),

    /// Unit analysis post publishing and retrieval
    #[clap(name = "analysis", visible_alias = "a")]
    Analysis(analysis::AnalysisCli),

    /// Login and admin state for external identities
    #[clap(name = "user", visible_alias = "u")]
    User(identity::UserCli),

    /// Show the mutation audit log
    #[clap(name = "audit")]
    Audit,
}

fn find_project_root(start_dir: &Path) -> Result<PathBuf, error::LorekeeperError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(".lorekeeper").exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(error::LorekeeperError::NotFound(
                "'.lorekeeper' directory not found in current or parent directories. Run `lorekeeper init` first.".to_string(),
            ));
        }
    }
}

pub fn run() -> Result<(), error::LorekeeperError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Init(init_cli) => run_init(init_cli, &current_dir),
        command => {
            let project_root = find_project_root(&current_dir)?;
            let store_root = project_root.join(".lorekeeper").join("data");
            std::fs::create_dir_all(&store_root).map_err(error::LorekeeperError::IoError)?;

            let store = Store { root: store_root };

            // Composition root: services are constructed once here and
            // injected into the dispatchers. Nothing below holds global
            // state.
            let identity_service = identity::UserIdentityService::new(store.clone());
            let quest_service = quest::QuestPostService::new(store.clone());
            let analysis_service = analysis::UnitAnalysisPostService::new(store.clone());

            match command {
                Command::Quest(quest_cli) => {
                    quest::run_quest_cli(&quest_service, &identity_service, quest_cli)
                }
                Command::Analysis(analysis_cli) => {
                    analysis::run_analysis_cli(&analysis_service, &identity_service, analysis_cli)
                }
                Command::User(user_cli) => identity::run_user_cli(&identity_service, user_cli),
                Command::Audit => {
                    let events = audit::read_events(&store.root)?;
                    println!("{}", serde_json::to_string_pretty(&events).unwrap());
                    Ok(())
                }
                Command::Init(_) => unreachable!(),
            }
        }
    }
}

fn run_init(init_cli: InitCli, current_dir: &Path) -> Result<(), error::LorekeeperError> {
    use colored::Colorize;

    let target_dir = match init_cli.dir {
        Some(d) => d,
        None => current_dir.to_path_buf(),
    };
    let target_dir = std::fs::canonicalize(&target_dir).map_err(error::LorekeeperError::IoError)?;

    let store_root = target_dir.join(".lorekeeper").join("data");
    std::fs::create_dir_all(&store_root).map_err(error::LorekeeperError::IoError)?;

    println!(
        "{} {}",
        "Initializing data workspace at".bright_white(),
        store_root.display().to_string().bright_cyan()
    );

    // Initialize both databases, preserving existing data.
    let dbs: [(&str, fn(&Path) -> Result<(), error::LorekeeperError>); 2] = [
        (crate::core::schemas::POST_DB_NAME, db::initialize_post_db),
        (crate::core::schemas::USER_DB_NAME, db::initialize_user_db),
    ];

    for (db_name, initialize) in dbs {
        let db_path = store_root.join(db_name);
        if db_path.exists() {
            println!(
                "    {} {} {}",
                "✓".bright_green(),
                db_name.bright_white(),
                "(preserved - existing data kept)".bright_black()
            );
        } else {
            initialize(&store_root)?;
            println!("    {} {}", "●".bright_green(), db_name.bright_white());
        }
    }

    println!();
    println!(
        "{} {}",
        "Ready.".bright_green().bold(),
        "Publish with `lorekeeper quest publish` or `lorekeeper analysis publish-chara`."
            .bright_white()
    );
    Ok(())
}

//! External identity tracking: login count/recency and the site-admin flag.
//!
//! Independent of the multilingual post model; the boundary layer consults
//! it to gate publish/edit operations. The login path never touches the
//! admin flag — that is flipped only by the out-of-band maintenance
//! commands here.

use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use crate::services::print_envelope;
use clap::Subcommand;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde_json::json;

/// Login outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    NewRegister,
    AlreadyRegistered,
}

impl LoginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewRegister => "new_register",
            Self::AlreadyRegistered => "already_registered",
        }
    }
}

/// One tracked external identity.
#[derive(Debug, Clone, Serialize)]
pub struct UserIdentity {
    pub uid: String,
    pub email: String,
    pub login_count: i64,
    pub last_login_at: String,
    pub is_admin: bool,
    pub ads_disabled_until: Option<String>,
}

impl UserIdentity {
    /// Ads are shown unless an unexpired ad-free window is recorded.
    pub fn show_ads(&self, now: &str) -> bool {
        match &self.ads_disabled_until {
            Some(until) => until.as_str() <= now,
            None => true,
        }
    }
}

/// External identity data service.
pub struct UserIdentityService {
    store: Store,
}

impl UserIdentityService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record a login. Creates the identity on first sight with
    /// `is_admin = false`; otherwise increments the login count and
    /// overwrites email and recency. One atomic upsert.
    pub fn user_logged_in(
        &self,
        uid: &str,
        email: &str,
    ) -> Result<LoginOutcome, error::LorekeeperError> {
        let db_path = db::user_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "user.login", |conn| {
            let login_count: i64 = conn.query_row(
                "INSERT INTO users(uid, email, login_count, last_login_at, is_admin)
                 VALUES(?1, ?2, 1, ?3, 0)
                 ON CONFLICT(uid) DO UPDATE SET
                     email = excluded.email,
                     last_login_at = excluded.last_login_at,
                     login_count = users.login_count + 1
                 RETURNING login_count",
                params![uid, email, time::now_epoch_ms()],
                |row| row.get(0),
            )?;
            if login_count == 1 {
                Ok(LoginOutcome::NewRegister)
            } else {
                Ok(LoginOutcome::AlreadyRegistered)
            }
        })
    }

    /// Get the identity, `None` for an absent uid or an unknown user.
    pub fn get_identity(
        &self,
        uid: Option<&str>,
    ) -> Result<Option<UserIdentity>, error::LorekeeperError> {
        let Some(uid) = uid.filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        let db_path = db::user_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "user.get", |conn| {
            let identity = conn
                .query_row(
                    "SELECT uid, email, login_count, last_login_at, is_admin, ads_disabled_until
                     FROM users WHERE uid = ?1",
                    params![uid],
                    |row| {
                        Ok(UserIdentity {
                            uid: row.get(0)?,
                            email: row.get(1)?,
                            login_count: row.get(2)?,
                            last_login_at: row.get(3)?,
                            is_admin: row.get::<_, i64>(4)? != 0,
                            ads_disabled_until: row.get(5)?,
                        })
                    },
                )
                .optional()
                .map_err(error::LorekeeperError::RusqliteError)?;
            Ok(identity)
        })
    }

    /// Check if the user is a site admin. False for absent/unknown users.
    pub fn is_admin(&self, uid: Option<&str>) -> Result<bool, error::LorekeeperError> {
        Ok(self
            .get_identity(uid)?
            .map(|identity| identity.is_admin)
            .unwrap_or(false))
    }

    /// Flip the admin flag. Out-of-band only — never reachable from the
    /// login path. Returns whether the user existed.
    pub fn set_admin(&self, uid: &str, is_admin: bool) -> Result<bool, error::LorekeeperError> {
        let db_path = db::user_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "user.set-admin", |conn| {
            let changed = conn.execute(
                "UPDATE users SET is_admin = ?1 WHERE uid = ?2",
                params![i64::from(is_admin), uid],
            )?;
            Ok(changed > 0)
        })
    }

    /// Record (or clear) an ad-free expiry. Returns whether the user
    /// existed.
    pub fn set_ads_disabled_until(
        &self,
        uid: &str,
        until: Option<&str>,
    ) -> Result<bool, error::LorekeeperError> {
        let db_path = db::user_db_path(&self.store.root);
        db::with_conn(&self.store.root, &db_path, "user.disable-ads", |conn| {
            let changed = conn.execute(
                "UPDATE users SET ads_disabled_until = ?1 WHERE uid = ?2",
                params![until, uid],
            )?;
            Ok(changed > 0)
        })
    }
}

#[derive(clap::Parser, Debug)]
#[clap(name = "user", about = "Track login and admin state for external identities.")]
pub struct UserCli {
    #[clap(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Record a login, creating the identity on first sight.
    Login {
        #[clap(long)]
        uid: String,
        #[clap(long)]
        email: String,
    },
    /// Show one identity.
    Show {
        #[clap(long)]
        uid: String,
    },
    /// Grant (or with --revoke, remove) the site-admin flag.
    GrantAdmin {
        #[clap(long)]
        uid: String,
        #[clap(long)]
        revoke: bool,
    },
    /// Disable ads for a user until the given timestamp, or clear the
    /// window with --clear.
    DisableAds {
        #[clap(long)]
        uid: String,
        #[clap(long, conflicts_with = "clear")]
        until: Option<String>,
        #[clap(long)]
        clear: bool,
    },
}

pub fn run_user_cli(
    service: &UserIdentityService,
    cli: UserCli,
) -> Result<(), error::LorekeeperError> {
    match cli.command {
        UserCommand::Login { uid, email } => {
            let outcome = service.user_logged_in(&uid, &email)?;
            print_envelope("user.login", "ok", json!({ "outcome": outcome.as_str() }));
        }
        UserCommand::Show { uid } => {
            let identity = service.get_identity(Some(&uid))?;
            let status = if identity.is_some() { "ok" } else { "not_found" };
            let show_ads = identity
                .as_ref()
                .map(|id| id.show_ads(&time::now_epoch_ms()))
                .unwrap_or(true);
            print_envelope(
                "user.show",
                status,
                json!({ "user": identity, "show_ads": show_ads }),
            );
        }
        UserCommand::GrantAdmin { uid, revoke } => {
            let found = service.set_admin(&uid, !revoke)?;
            if !found {
                return Err(error::LorekeeperError::NotFound(format!(
                    "no identity with uid {}",
                    uid
                )));
            }
            print_envelope("user.grant-admin", "ok", json!({ "uid": uid, "is_admin": !revoke }));
        }
        UserCommand::DisableAds { uid, until, clear } => {
            if until.is_none() && !clear {
                return Err(error::LorekeeperError::ValidationError(
                    "provide --until <timestamp> or --clear".into(),
                ));
            }
            let found = service.set_ads_disabled_until(&uid, until.as_deref())?;
            if !found {
                return Err(error::LorekeeperError::NotFound(format!(
                    "no identity with uid {}",
                    uid
                )));
            }
            print_envelope("user.disable-ads", "ok", json!({ "uid": uid, "until": until }));
        }
    }
    Ok(())
}

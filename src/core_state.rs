//! Transport-agnostic application state.
//!
//! `CoreState` is wrapped in an `Arc` at startup and shared by every command.
//! The active user sits behind a `RwLock`: most commands only read it.

use std::sync::RwLock;

use rusqlite::Connection;
use thiserror::Error;

use crate::attachments::{AttachmentError, AttachmentStore};
use crate::config::AppConfig;
use crate::db;
use crate::users::{self, UserError};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    /// Selected user. `None` until one is chosen.
    active_user: RwLock<Option<String>>,
    store: AttachmentStore,
}

impl CoreState {
    pub fn new(config: AppConfig) -> Self {
        let store = AttachmentStore::new(&config.archive);
        Self {
            config,
            active_user: RwLock::new(None),
            store,
        }
    }

    // ── Active user ─────────────────────────────────────────

    /// Make `name` the active user. The user must already exist.
    pub fn select_user(&self, name: &str) -> Result<(), CoreError> {
        users::validate_user_name(name)?;
        if !users::user_db_path(&self.config.data_dir, name).exists() {
            return Err(UserError::NotFound(name.to_string()).into());
        }
        let mut guard = self.active_user.write().map_err(|_| CoreError::LockPoisoned)?;
        *guard = Some(name.to_string());
        tracing::info!(user = name, "User selected");
        Ok(())
    }

    pub fn clear_user(&self) -> Result<(), CoreError> {
        let mut guard = self.active_user.write().map_err(|_| CoreError::LockPoisoned)?;
        *guard = None;
        Ok(())
    }

    /// Name of the active user (owned copy).
    pub fn active_user(&self) -> Result<String, CoreError> {
        let guard = self.active_user.read().map_err(|_| CoreError::LockPoisoned)?;
        guard.clone().ok_or(CoreError::NoActiveUser)
    }

    // ── Resources ───────────────────────────────────────────

    /// Open (and migrate) the active user's database.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        let user = self.active_user()?;
        let path = users::user_db_path(&self.config.data_dir, &user);
        Ok(db::open_database(&path)?)
    }

    pub fn store(&self) -> &AttachmentStore {
        &self.store
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No active user")]
    NoActiveUser,
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}

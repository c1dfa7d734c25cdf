//! Per-user archives.
//!
//! Each user owns one SQLite file `<data_dir>/<name>.sqlite` and one
//! attachment directory `<archive_root>/<name>/`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::attachments::naming::is_valid_segment;
use crate::db::{self, DatabaseError};

const DB_EXTENSION: &str = "sqlite";
const MAX_USER_NAME_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Invalid user name: {0:?}")]
    InvalidName(String),

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A user name doubles as a file stem and a directory name.
pub fn validate_user_name(name: &str) -> Result<(), UserError> {
    let ok = is_valid_segment(name)
        && name.chars().count() <= MAX_USER_NAME_LEN
        && !name.contains("..")
        && name.trim() == name;
    if ok {
        Ok(())
    } else {
        Err(UserError::InvalidName(name.to_string()))
    }
}

pub fn user_db_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{name}.{DB_EXTENSION}"))
}

/// Users with a database in `data_dir`, sorted.
pub fn list_users(data_dir: &Path) -> Result<Vec<String>, UserError> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }
    let mut users = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DB_EXTENSION) || !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if validate_user_name(stem).is_ok() {
                users.push(stem.to_string());
            }
        }
    }
    users.sort();
    Ok(users)
}

/// Create and migrate a new user database.
pub fn create_user(data_dir: &Path, name: &str) -> Result<PathBuf, UserError> {
    validate_user_name(name)?;
    let path = user_db_path(data_dir, name);
    if path.exists() {
        return Err(UserError::AlreadyExists(name.to_string()));
    }
    std::fs::create_dir_all(data_dir)?;
    db::open_database(&path)?;
    tracing::info!(user = name, "User created");
    Ok(path)
}

/// Remove a user's database and every managed file they own.
pub fn delete_user(data_dir: &Path, archive_root: &Path, name: &str) -> Result<(), UserError> {
    validate_user_name(name)?;
    let path = user_db_path(data_dir, name);
    if !path.exists() {
        return Err(UserError::NotFound(name.to_string()));
    }

    let archive = archive_root.join(name);
    match std::fs::remove_dir_all(&archive) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::remove_file(&path)?;
    for suffix in ["-wal", "-shm"] {
        let side = data_dir.join(format!("{name}.{DB_EXTENSION}{suffix}"));
        if side.exists() {
            if let Err(e) = std::fs::remove_file(&side) {
                tracing::warn!(user = name, path = %side.display(), error = %e, "Failed to remove SQLite side file");
            }
        }
    }

    tracing::info!(user = name, "User deleted");
    Ok(())
}

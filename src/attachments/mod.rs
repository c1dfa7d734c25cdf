//! Managed attachment archive.
//!
//! Every uploaded file is copied to `{archive_root}/{user}/{visit}_{attachment}_{name}`:
//! 1. Naming: pure sanitize/truncate rules and the canonical path
//! 2. Store: atomic copy-in, idempotent removal, copy-out
//! 3. Service: keeps `attachment_records` rows and managed files in step
//! 4. Consistency: detects and repairs rows/files that drifted apart

pub mod consistency;
pub mod naming;
pub mod service;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;

// ═══════════════════════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error(
        "Identifiers too long to store this file: the name needs at least \
         {required} characters but only {budget} are available"
    )]
    NameTooLong { budget: usize, required: usize },

    #[error("Source file not found or unreadable: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Storage I/O error at {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid archive path: {0}")]
    InvalidPath(String),

    #[error("Invalid {field}: {value}")]
    InvalidId { field: &'static str, value: i64 },

    #[error("Visit record not found: {0}")]
    VisitRecordNotFound(i64),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl AttachmentError {
    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AttachmentError::StoreIo {
            path: path.into(),
            source,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════

pub use consistency::*;
pub use naming::*;
pub use service::*;
pub use store::*;

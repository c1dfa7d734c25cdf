use std::collections::HashSet;
use std::fs;
use std::io;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::db::repository;

use super::store::{AttachmentStore, TEMP_FILE_PREFIX};
use super::AttachmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveIssueKind {
    /// Row whose managed file is gone.
    MissingFile,
    /// Row whose path does not resolve inside the archive root.
    InvalidPath,
    /// File under the user's directory that no row points at.
    OrphanedFile,
    /// Temp file from a copy that never completed.
    StaleTempFile,
    /// Placeholder row from an upload that never completed.
    UnfinishedUpload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveIssue {
    pub kind: ArchiveIssueKind,
    /// Path relative to the archive root; empty for unfinished uploads.
    pub path: String,
    pub attachment_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    pub issues: Vec<ArchiveIssue>,
    pub attachments_checked: usize,
    pub files_checked: usize,
}

impl ArchiveReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: ArchiveIssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }
}

/// Compare one user's attachment rows with the files in `<archive_root>/<user>/`.
///
/// Read-only.
pub fn check_archive(
    conn: &Connection,
    store: &AttachmentStore,
    user: &str,
) -> Result<ArchiveReport, AttachmentError> {
    let mut report = ArchiveReport::default();

    // 1. Rows pointing at files that no longer exist
    let attachments = repository::list_attachments(conn)?;
    let mut referenced = HashSet::with_capacity(attachments.len());
    for record in &attachments {
        let kind = match store.exists(&record.file_path) {
            Ok(true) => None,
            Ok(false) => Some(ArchiveIssueKind::MissingFile),
            Err(e) => {
                tracing::debug!(attachment_id = record.id, error = %e, "Unresolvable attachment path");
                Some(ArchiveIssueKind::InvalidPath)
            }
        };
        if let Some(kind) = kind {
            report.issues.push(ArchiveIssue {
                kind,
                path: record.file_path.clone(),
                attachment_id: Some(record.id),
            });
        }
        referenced.insert(record.file_path.as_str());
    }
    report.attachments_checked = attachments.len();

    // 2. Placeholders from interrupted uploads
    for record in repository::list_attachment_placeholders(conn)? {
        report.issues.push(ArchiveIssue {
            kind: ArchiveIssueKind::UnfinishedUpload,
            path: String::new(),
            attachment_id: Some(record.id),
        });
    }

    // 3. Files nobody owns
    let user_dir = store.user_dir(user)?;
    let entries = match fs::read_dir(&user_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(user, "No archive directory yet");
            return Ok(report);
        }
        Err(e) => return Err(AttachmentError::store_io(&user_dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| AttachmentError::store_io(&user_dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| AttachmentError::store_io(entry.path(), e))?
            .is_file();
        if !is_file {
            continue;
        }
        report.files_checked += 1;

        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = format!("{user}/{name}");
        let kind = if name.starts_with(TEMP_FILE_PREFIX) {
            ArchiveIssueKind::StaleTempFile
        } else if !referenced.contains(relative.as_str()) {
            ArchiveIssueKind::OrphanedFile
        } else {
            continue;
        };
        report.issues.push(ArchiveIssue {
            kind,
            path: relative,
            attachment_id: None,
        });
    }

    if !report.is_consistent() {
        tracing::warn!(
            user,
            issues = report.issues.len(),
            missing = report.count(ArchiveIssueKind::MissingFile),
            invalid = report.count(ArchiveIssueKind::InvalidPath),
            orphaned = report.count(ArchiveIssueKind::OrphanedFile),
            "Archive inconsistencies detected"
        );
    }
    Ok(report)
}

/// Fix everything [`check_archive`] reports.
///
/// - Missing file or invalid path -> delete the row
/// - Orphaned or temp file -> delete the file
/// - Unfinished upload -> delete the placeholder row
///
/// Runs under an immediate write transaction, so it fails with a busy error
/// instead of touching a file an in-flight upload has not finalized yet.
///
/// Returns the number of issues repaired.
pub fn repair_archive(
    conn: &Connection,
    store: &AttachmentStore,
    user: &str,
) -> Result<usize, AttachmentError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let report = check_archive(&tx, store, user)?;
    let mut repaired = 0;

    for issue in &report.issues {
        match issue.kind {
            ArchiveIssueKind::MissingFile | ArchiveIssueKind::InvalidPath => {
                if let Some(id) = issue.attachment_id {
                    repository::delete_attachment_row(&tx, id)?;
                    repaired += 1;
                }
            }
            ArchiveIssueKind::OrphanedFile | ArchiveIssueKind::StaleTempFile => {
                store.remove(&issue.path)?;
                repaired += 1;
            }
            ArchiveIssueKind::UnfinishedUpload => {}
        }
    }

    let placeholders = repository::delete_attachment_placeholders(&tx)?;
    repaired += placeholders;
    tx.commit()?;

    if repaired > 0 {
        tracing::info!(user, repaired, "Archive repaired");
    }
    Ok(repaired)
}

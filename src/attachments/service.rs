//! Record/file orchestration.
//!
//! SQLite and the filesystem share no transaction. Every operation here is a
//! two-step protocol: the file step runs inside an open write transaction and
//! the transaction commits only after it succeeded. When the database step
//! fails after a file was written, the file is removed again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;

use crate::db::repository;
use crate::models::{AttachmentRecord, VisitFields, VisitRecord};

use super::naming::split_extension;
use super::store::AttachmentStore;
use super::AttachmentError;

/// Copy `source` into the archive and record it under `visit_record_id`.
///
/// The attachment id is reserved with a placeholder row first so the managed
/// name can embed it. The row is finalized only after the copy succeeded.
pub fn create_attachment(
    conn: &Connection,
    store: &AttachmentStore,
    user: &str,
    visit_record_id: i64,
    source: &Path,
) -> Result<AttachmentRecord, AttachmentError> {
    if !repository::visit_record_exists(conn, visit_record_id)? {
        return Err(AttachmentError::VisitRecordNotFound(visit_record_id));
    }

    let tx = conn.unchecked_transaction()?;
    let attachment_id = repository::insert_attachment_placeholder(&tx, visit_record_id)?;

    // Dropping `tx` on error rolls the placeholder back.
    let file_path = store.store(user, visit_record_id, attachment_id, source)?;

    let finalized = repository::set_attachment_path(&tx, attachment_id, &file_path)
        .and_then(|()| tx.commit().map_err(Into::into));
    if let Err(e) = finalized {
        discard_stored_file(store, &file_path);
        return Err(e.into());
    }

    tracing::info!(visit_record_id, attachment_id, "Attachment created");
    Ok(AttachmentRecord {
        id: attachment_id,
        visit_record_id,
        file_path,
    })
}

/// Remove one attachment's file and row.
pub fn delete_attachment(
    conn: &Connection,
    store: &AttachmentStore,
    attachment_id: i64,
) -> Result<AttachmentRecord, AttachmentError> {
    let record = repository::get_attachment(conn, attachment_id)?
        .ok_or(AttachmentError::AttachmentNotFound(attachment_id))?;

    let tx = conn.unchecked_transaction()?;
    repository::delete_attachment_row(&tx, attachment_id)?;
    remove_managed_file(store, &record)?;
    tx.commit()?;

    tracing::info!(
        visit_record_id = record.visit_record_id,
        attachment_id,
        "Attachment deleted"
    );
    Ok(record)
}

/// Delete a visit, every managed file it owns, and (by cascade) its
/// attachment rows. Returns the number of attachments removed.
pub fn delete_visit_record(
    conn: &Connection,
    store: &AttachmentStore,
    visit_record_id: i64,
) -> Result<usize, AttachmentError> {
    if !repository::visit_record_exists(conn, visit_record_id)? {
        return Err(AttachmentError::VisitRecordNotFound(visit_record_id));
    }
    let attachments = repository::list_attachments_for_visit(conn, visit_record_id)?;

    let tx = conn.unchecked_transaction()?;
    for (done, record) in attachments.iter().enumerate() {
        if let Err(e) = remove_managed_file(store, record) {
            if done > 0 {
                tracing::warn!(
                    visit_record_id,
                    removed = done,
                    "Visit delete aborted after removing some files; rows kept"
                );
            }
            return Err(e);
        }
    }
    repository::delete_visit_record_row(&tx, visit_record_id)?;
    tx.commit()?;

    tracing::info!(
        visit_record_id,
        attachments = attachments.len(),
        "Visit record deleted"
    );
    Ok(attachments.len())
}

/// Insert a visit together with its uploaded files in one user action.
///
/// All or nothing: if any file cannot be stored, the files already copied and
/// the new visit are removed again.
pub fn create_visit_with_attachments(
    conn: &Connection,
    store: &AttachmentStore,
    user: &str,
    fields: &VisitFields,
    sources: &[PathBuf],
) -> Result<(VisitRecord, Vec<AttachmentRecord>), AttachmentError> {
    let fields = fields.clone().normalized();
    let visit_record_id = repository::insert_visit_record(conn, &fields)?;

    let mut created = Vec::with_capacity(sources.len());
    for source in sources {
        match create_attachment(conn, store, user, visit_record_id, source) {
            Ok(record) => created.push(record),
            Err(e) => {
                tracing::warn!(
                    visit_record_id,
                    source = %source.display(),
                    error = %e,
                    "Upload failed, rolling back new visit"
                );
                if let Err(cleanup) = delete_visit_record(conn, store, visit_record_id) {
                    tracing::error!(
                        visit_record_id,
                        error = %cleanup,
                        "Rollback of new visit failed; run an archive check"
                    );
                }
                return Err(e);
            }
        }
    }

    let visit = repository::get_visit_record(conn, visit_record_id)?
        .ok_or(AttachmentError::VisitRecordNotFound(visit_record_id))?;
    Ok((visit, created))
}

/// Swap the file behind an existing attachment for `new_source`.
///
/// The attachment keeps its id. If the new managed path differs from the old
/// one, the old file is removed after the row points at the new one. A failed
/// removal is logged and left for [`check_archive`](super::check_archive).
pub fn replace_attachment(
    conn: &Connection,
    store: &AttachmentStore,
    user: &str,
    attachment_id: i64,
    new_source: &Path,
) -> Result<AttachmentRecord, AttachmentError> {
    let old = repository::get_attachment(conn, attachment_id)?
        .ok_or(AttachmentError::AttachmentNotFound(attachment_id))?;

    let new_path = store.store(user, old.visit_record_id, attachment_id, new_source)?;

    if new_path != old.file_path {
        // Paths differing only by case share one file on some filesystems.
        let aliased = store.same_file(&new_path, &old.file_path).unwrap_or(false);

        if let Err(e) = repository::set_attachment_path(conn, attachment_id, &new_path) {
            if !aliased {
                discard_stored_file(store, &new_path);
            }
            return Err(e.into());
        }

        if aliased {
            tracing::debug!(attachment_id, "Replacement landed on the old file");
        } else if let Err(e) = remove_managed_file(store, &old) {
            tracing::warn!(
                attachment_id,
                path = %old.file_path,
                error = %e,
                "Old attachment file left behind; run an archive check"
            );
        }
    }

    tracing::info!(
        visit_record_id = old.visit_record_id,
        attachment_id,
        "Attachment replaced"
    );
    Ok(AttachmentRecord {
        file_path: new_path,
        ..old
    })
}

/// One attachment that could not be exported.
#[derive(Debug, Clone, Serialize)]
pub struct ExportFailure {
    pub attachment_id: i64,
    pub file_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub copied: Vec<PathBuf>,
    pub failed: Vec<ExportFailure>,
}

/// Copy every attachment of the given visits into `dest_dir`.
///
/// Clashing names get `_1`, `_2`, … before the extension. A failing file is
/// reported and the batch continues.
pub fn export_visit_attachments(
    conn: &Connection,
    store: &AttachmentStore,
    visit_record_ids: &[i64],
    dest_dir: &Path,
) -> Result<ExportReport, AttachmentError> {
    std::fs::create_dir_all(dest_dir)
        .map_err(|e| AttachmentError::store_io(dest_dir, e))?;

    let mut report = ExportReport::default();
    let mut taken = HashSet::new();

    for &visit_record_id in visit_record_ids {
        for record in repository::list_attachments_for_visit(conn, visit_record_id)? {
            let target = unique_destination(dest_dir, record.file_name(), &mut taken);
            match store.export(&record.file_path, &target) {
                Ok(path) => report.copied.push(path),
                Err(e) => {
                    tracing::warn!(
                        attachment_id = record.id,
                        error = %e,
                        "Attachment export failed"
                    );
                    report.failed.push(ExportFailure {
                        attachment_id: record.id,
                        file_path: record.file_path,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    tracing::info!(
        visits = visit_record_ids.len(),
        copied = report.copied.len(),
        failed = report.failed.len(),
        "Attachments exported"
    );
    Ok(report)
}

/// `dir/name`, or `dir/base_N.ext` for the first free N.
fn unique_destination(dir: &Path, name: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let mut candidate = dir.join(name);
    if !candidate.exists() && !taken.contains(&candidate) {
        taken.insert(candidate.clone());
        return candidate;
    }

    let (base, ext) = split_extension(name);
    let mut counter = 1u32;
    loop {
        candidate = dir.join(format!("{base}_{counter}{ext}"));
        if !candidate.exists() && !taken.contains(&candidate) {
            taken.insert(candidate.clone());
            return candidate;
        }
        counter += 1;
    }
}

fn remove_managed_file(
    store: &AttachmentStore,
    record: &AttachmentRecord,
) -> Result<(), AttachmentError> {
    if record.file_path.is_empty() {
        return Ok(());
    }
    if !store.remove(&record.file_path)? {
        tracing::debug!(attachment_id = record.id, "Managed file was already absent");
    }
    Ok(())
}

/// Compensating action after a stored file lost its database row.
fn discard_stored_file(store: &AttachmentStore, file_path: &str) {
    if let Err(e) = store.remove(file_path) {
        tracing::error!(
            path = %file_path,
            error = %e,
            "Could not remove orphaned attachment file; run an archive check"
        );
    }
}

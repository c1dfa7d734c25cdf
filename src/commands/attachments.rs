use std::path::PathBuf;
use std::sync::Arc;

use crate::attachments::{self, ArchiveReport, ExportReport};
use crate::core_state::CoreState;
use crate::db::repository;
use crate::models::AttachmentRecord;

use super::run_blocking;

pub async fn list_attachments(
    state: &Arc<CoreState>,
    visit_record_id: i64,
) -> Result<Vec<AttachmentRecord>, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        repository::list_attachments_for_visit(&conn, visit_record_id).map_err(|e| e.to_string())
    })
    .await
}

pub async fn add_attachment(
    state: &Arc<CoreState>,
    visit_record_id: i64,
    source: PathBuf,
) -> Result<AttachmentRecord, String> {
    run_blocking(state, move |s| {
        let user = s.active_user().map_err(|e| e.to_string())?;
        let conn = s.open_db().map_err(|e| e.to_string())?;
        attachments::create_attachment(&conn, s.store(), &user, visit_record_id, &source)
            .map_err(|e| e.to_string())
    })
    .await
}

pub async fn delete_attachment(state: &Arc<CoreState>, attachment_id: i64) -> Result<(), String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        attachments::delete_attachment(&conn, s.store(), attachment_id)
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await
}

pub async fn replace_attachment(
    state: &Arc<CoreState>,
    attachment_id: i64,
    source: PathBuf,
) -> Result<AttachmentRecord, String> {
    run_blocking(state, move |s| {
        let user = s.active_user().map_err(|e| e.to_string())?;
        let conn = s.open_db().map_err(|e| e.to_string())?;
        attachments::replace_attachment(&conn, s.store(), &user, attachment_id, &source)
            .map_err(|e| e.to_string())
    })
    .await
}

/// Copy one attachment out to `destination` (a file path or a directory).
pub async fn export_attachment(
    state: &Arc<CoreState>,
    attachment_id: i64,
    destination: PathBuf,
) -> Result<PathBuf, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        let record = repository::get_attachment(&conn, attachment_id)
            .map_err(|e| e.to_string())?
            .filter(|r| !r.file_path.is_empty())
            .ok_or_else(|| format!("Attachment not found: {attachment_id}"))?;
        s.store()
            .export(&record.file_path, &destination)
            .map_err(|e| e.to_string())
    })
    .await
}

pub async fn export_visits(
    state: &Arc<CoreState>,
    visit_record_ids: Vec<i64>,
    dest_dir: PathBuf,
) -> Result<ExportReport, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        attachments::export_visit_attachments(&conn, s.store(), &visit_record_ids, &dest_dir)
            .map_err(|e| e.to_string())
    })
    .await
}

pub async fn check_archive(state: &Arc<CoreState>) -> Result<ArchiveReport, String> {
    run_blocking(state, |s| {
        let user = s.active_user().map_err(|e| e.to_string())?;
        let conn = s.open_db().map_err(|e| e.to_string())?;
        attachments::check_archive(&conn, s.store(), &user).map_err(|e| e.to_string())
    })
    .await
}

pub async fn repair_archive(state: &Arc<CoreState>) -> Result<usize, String> {
    run_blocking(state, |s| {
        let user = s.active_user().map_err(|e| e.to_string())?;
        let conn = s.open_db().map_err(|e| e.to_string())?;
        attachments::repair_archive(&conn, s.store(), &user).map_err(|e| e.to_string())
    })
    .await
}

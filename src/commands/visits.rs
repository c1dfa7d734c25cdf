use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::attachments;
use crate::core_state::CoreState;
use crate::db::repository;
use crate::models::{AttachmentRecord, HistoryField, VisitFields, VisitFilter, VisitRecord};

use super::run_blocking;

/// A visit together with its attachments.
#[derive(Debug, Clone, Serialize)]
pub struct VisitDetail {
    pub visit: VisitRecord,
    pub attachments: Vec<AttachmentRecord>,
}

/// Save a new visit with the files picked in the upload form.
pub async fn create_visit(
    state: &Arc<CoreState>,
    fields: VisitFields,
    sources: Vec<PathBuf>,
) -> Result<VisitDetail, String> {
    run_blocking(state, move |s| {
        let user = s.active_user().map_err(|e| e.to_string())?;
        let conn = s.open_db().map_err(|e| e.to_string())?;
        let (visit, attachments) =
            attachments::create_visit_with_attachments(&conn, s.store(), &user, &fields, &sources)
                .map_err(|e| e.to_string())?;
        Ok(VisitDetail { visit, attachments })
    })
    .await
}

pub async fn get_visit(state: &Arc<CoreState>, visit_record_id: i64) -> Result<VisitDetail, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        let visit = repository::get_visit_record(&conn, visit_record_id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("Visit record not found: {visit_record_id}"))?;
        let attachments = repository::list_attachments_for_visit(&conn, visit_record_id)
            .map_err(|e| e.to_string())?;
        Ok(VisitDetail { visit, attachments })
    })
    .await
}

/// Visits matching `filter`, newest first. An empty filter lists everything.
pub async fn search_visits(
    state: &Arc<CoreState>,
    filter: VisitFilter,
) -> Result<Vec<VisitRecord>, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        repository::search_visit_records(&conn, &filter).map_err(|e| e.to_string())
    })
    .await
}

pub async fn update_visit(
    state: &Arc<CoreState>,
    visit_record_id: i64,
    fields: VisitFields,
) -> Result<VisitRecord, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        repository::update_visit_record(&conn, visit_record_id, &fields.normalized())
            .map_err(|e| e.to_string())?;
        repository::get_visit_record(&conn, visit_record_id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("Visit record not found: {visit_record_id}"))
    })
    .await
}

/// Delete a visit and every attachment file it owns. Returns the number of
/// attachments removed.
pub async fn delete_visit(state: &Arc<CoreState>, visit_record_id: i64) -> Result<usize, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        attachments::delete_visit_record(&conn, s.store(), visit_record_id)
            .map_err(|e| e.to_string())
    })
    .await
}

/// Autocomplete values for a form field.
pub async fn suggest_values(
    state: &Arc<CoreState>,
    field: HistoryField,
    typed: String,
) -> Result<Vec<String>, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        repository::suggest_field_values(&conn, field, &typed, s.config.history_limit)
            .map_err(|e| e.to_string())
    })
    .await
}

pub async fn doctors_at_hospital(
    state: &Arc<CoreState>,
    hospital: String,
) -> Result<Vec<String>, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        repository::get_doctors_by_hospital(&conn, &hospital, s.config.history_limit)
            .map_err(|e| e.to_string())
    })
    .await
}

use std::path::PathBuf;
use std::sync::Arc;

use crate::core_state::CoreState;
use crate::export::{self, PdfReport, RecordsExportReport, ScanOptions};

use super::run_blocking;

/// Write the chosen visits to an `.xlsx` file plus its attachment folder.
pub async fn export_records(
    state: &Arc<CoreState>,
    visit_record_ids: Vec<i64>,
    workbook_path: PathBuf,
) -> Result<RecordsExportReport, String> {
    run_blocking(state, move |s| {
        let conn = s.open_db().map_err(|e| e.to_string())?;
        export::export_visit_records(&conn, s.store(), &visit_record_ids, &workbook_path)
            .map_err(|e| e.to_string())
    })
    .await
}

pub async fn compress_scans(
    state: &Arc<CoreState>,
    folder: PathBuf,
    options: Option<ScanOptions>,
) -> Result<PdfReport, String> {
    run_blocking(state, move |_| {
        export::compress_folder_to_pdf(&folder, options.unwrap_or_default())
            .map_err(|e| e.to_string())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::state_with_user;
    use crate::commands::visits;
    use crate::models::VisitFields;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn export_records_writes_workbook() {
        let (dir, state) = state_with_user();
        let fields = VisitFields::new(NaiveDate::from_ymd_opt(2024, 2, 2).unwrap());
        let upload = dir.path().join("note.txt");
        std::fs::write(&upload, b"note").unwrap();
        let created = visits::create_visit(&state, fields, vec![upload]).await.unwrap();

        let path = dir.path().join("visits.xlsx");
        let report = export_records(&state, vec![created.visit.id], path.clone())
            .await
            .unwrap();
        assert!(path.is_file());
        assert_eq!(report.attachment_dir, Some(dir.path().join("visits附件")));
        assert_eq!(report.attachments.copied.len(), 1);

        let err = export_records(&state, Vec::new(), path).await.unwrap_err();
        assert_eq!(err, "No visit records to export");
    }

    #[tokio::test]
    async fn compress_scans_reports_missing_folder() {
        let (dir, state) = state_with_user();
        let err = compress_scans(&state, dir.path().join("nope"), None)
            .await
            .unwrap_err();
        assert!(err.starts_with("Folder not found"), "{err}");
    }
}

//! Selected visits as an `.xlsx` table, with their attachments copied into a
//! `<name>附件` folder beside the workbook.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;

use crate::attachments::{self, split_extension, AttachmentStore, ExportReport};
use crate::db::{repository, DatabaseError};
use crate::models::{AttachmentRecord, VisitRecord};

use super::ExportError;

pub const WORKSHEET_NAME: &str = "就诊记录";
pub const ATTACHMENT_DIR_SUFFIX: &str = "附件";

pub const VISIT_HEADERS: [&str; 11] = [
    "记录ID",
    "就诊日期",
    "医院",
    "科室",
    "医生",
    "器官系统",
    "症状事由",
    "诊断结果",
    "用药信息",
    "备注",
    "附件",
];

const MIN_COLUMN_WIDTH: usize = 10;
const MAX_COLUMN_WIDTH: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct RecordsExportReport {
    pub workbook: PathBuf,
    pub rows: usize,
    /// Set only when at least one exported visit has attachments.
    pub attachment_dir: Option<PathBuf>,
    pub attachments: ExportReport,
}

/// `report.xlsx` → `report附件` in the same directory.
pub fn attachment_dir_for(workbook: &Path) -> Result<PathBuf, ExportError> {
    let stem = workbook
        .file_stem()
        .ok_or_else(|| ExportError::InvalidTarget(workbook.to_path_buf()))?;
    let dir_name = format!("{}{ATTACHMENT_DIR_SUFFIX}", stem.to_string_lossy());
    Ok(workbook.with_file_name(dir_name))
}

/// Managed file names without extension, joined with `; `.
pub fn attachments_cell(attachments: &[AttachmentRecord]) -> String {
    attachments
        .iter()
        .filter(|a| !a.file_path.is_empty())
        .map(|a| split_extension(a.file_name()).0)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One worksheet row, in [`VISIT_HEADERS`] order.
pub fn visit_cells(visit: &VisitRecord, attachments: &[AttachmentRecord]) -> Vec<String> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    vec![
        visit.id.to_string(),
        visit.date.format("%Y-%m-%d").to_string(),
        text(&visit.hospital),
        text(&visit.department),
        text(&visit.doctor),
        text(&visit.organ_system),
        text(&visit.reason),
        text(&visit.diagnosis),
        text(&visit.medication),
        text(&visit.remark),
        attachments_cell(attachments),
    ]
}

/// Write the given visits to `workbook_path` and copy their attachments next
/// to it. Visits appear in the order given.
pub fn export_visit_records(
    conn: &Connection,
    store: &AttachmentStore,
    visit_record_ids: &[i64],
    workbook_path: &Path,
) -> Result<RecordsExportReport, ExportError> {
    if visit_record_ids.is_empty() {
        return Err(ExportError::NoRecords);
    }
    let attachment_dir = attachment_dir_for(workbook_path)?;

    let mut rows = Vec::with_capacity(visit_record_ids.len());
    let mut has_attachments = false;
    for &id in visit_record_ids {
        let visit = repository::get_visit_record(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "VisitRecord".into(),
            id: id.to_string(),
        })?;
        let attachments = repository::list_attachments_for_visit(conn, id)?;
        has_attachments |= !attachments.is_empty();
        rows.push(visit_cells(&visit, &attachments));
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(WORKSHEET_NAME)?;
    write_table(sheet, &rows)?;
    workbook.save(workbook_path)?;
    tracing::info!(path = %workbook_path.display(), rows = rows.len(), "Visit workbook written");

    let (attachment_dir, attachments) = if has_attachments {
        let report =
            attachments::export_visit_attachments(conn, store, visit_record_ids, &attachment_dir)?;
        (Some(attachment_dir), report)
    } else {
        (None, ExportReport::default())
    };

    Ok(RecordsExportReport {
        workbook: workbook_path.to_path_buf(),
        rows: rows.len(),
        attachment_dir,
        attachments,
    })
}

fn write_table(sheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<(), ExportError> {
    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin);
    let centered = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);
    let wrapped = Format::new()
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin);

    for (col, title) in VISIT_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (r, cells) in rows.iter().enumerate() {
        let row = r as u32 + 1;
        for (col, value) in cells.iter().enumerate() {
            // Id, date and the short name columns are centered.
            let format = if col < 6 { &centered } else { &wrapped };
            let id = if col == 0 { value.parse::<f64>().ok() } else { None };
            match id {
                Some(id) => sheet.write_number_with_format(row, 0, id, format)?,
                None => sheet.write_string_with_format(row, col as u16, value.as_str(), format)?,
            };
        }
    }

    for col in 1..VISIT_HEADERS.len() {
        let widest = std::iter::once(VISIT_HEADERS[col])
            .chain(rows.iter().map(|cells| cells[col].as_str()))
            .map(|value| value.lines().next().unwrap_or("").chars().count())
            .max()
            .unwrap_or(0);
        let width = (widest + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH);
        sheet.set_column_width(col as u16, width as f64)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::create_attachment;
    use crate::config::ArchiveConfig;
    use crate::db::sqlite::open_memory_database;
    use crate::models::VisitFields;
    use chrono::NaiveDate;
    use std::fs;

    fn setup() -> (tempfile::TempDir, Connection, AttachmentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(&ArchiveConfig::new(dir.path().join("archive")));
        let conn = open_memory_database().unwrap();
        (dir, conn, store)
    }

    fn visit(conn: &Connection, hospital: &str) -> i64 {
        let fields = VisitFields {
            hospital: Some(hospital.into()),
            diagnosis: Some("Mild anemia".into()),
            ..VisitFields::new(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap())
        };
        repository::insert_visit_record(conn, &fields).unwrap()
    }

    fn upload(
        dir: &tempfile::TempDir,
        conn: &Connection,
        store: &AttachmentStore,
        visit_id: i64,
        name: &str,
    ) -> AttachmentRecord {
        let source = dir.path().join(name);
        fs::write(&source, name.as_bytes()).unwrap();
        create_attachment(conn, store, "alice", visit_id, &source).unwrap()
    }

    #[test]
    fn attachment_folder_named_after_workbook() {
        let dir = attachment_dir_for(Path::new("/exports/2024 report.xlsx")).unwrap();
        assert_eq!(dir, PathBuf::from("/exports/2024 report附件"));
        assert_eq!(
            attachment_dir_for(Path::new("visits")).unwrap(),
            PathBuf::from("visits附件")
        );
    }

    #[test]
    fn attachments_cell_lists_stems() {
        let (dir, conn, store) = setup();
        let visit_id = visit(&conn, "City Hospital");
        let a = upload(&dir, &conn, &store, visit_id, "blood panel.pdf");
        let b = upload(&dir, &conn, &store, visit_id, "x-ray.tar.gz");

        let cell = attachments_cell(&[a.clone(), b.clone()]);
        assert_eq!(
            cell,
            format!("{visit_id}_{}_blood panel; {visit_id}_{}_x-ray.tar", a.id, b.id)
        );
        assert_eq!(attachments_cell(&[]), "");
    }

    #[test]
    fn visit_cells_follow_header_order() {
        let (_dir, conn, _store) = setup();
        let visit_id = visit(&conn, "City Hospital");
        let record = repository::get_visit_record(&conn, visit_id).unwrap().unwrap();

        let cells = visit_cells(&record, &[]);
        assert_eq!(cells.len(), VISIT_HEADERS.len());
        assert_eq!(cells[0], visit_id.to_string());
        assert_eq!(cells[1], "2024-06-03");
        assert_eq!(cells[2], "City Hospital");
        assert_eq!(cells[3], "");
        assert_eq!(cells[7], "Mild anemia");
        assert_eq!(cells[10], "");
    }

    #[test]
    fn export_writes_workbook_and_attachment_folder() {
        let (dir, conn, store) = setup();
        let with_files = visit(&conn, "City Hospital");
        let without = visit(&conn, "Harbor Clinic");
        let scan = upload(&dir, &conn, &store, with_files, "scan.png");

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let path = out.join("visits.xlsx");
        let report = export_visit_records(&conn, &store, &[with_files, without], &path).unwrap();

        assert_eq!(report.rows, 2);
        assert!(fs::read(&path).unwrap().starts_with(b"PK"));
        let folder = out.join("visits附件");
        assert_eq!(report.attachment_dir.as_deref(), Some(folder.as_path()));
        assert_eq!(report.attachments.copied, vec![folder.join(scan.file_name())]);
        assert_eq!(fs::read(folder.join(scan.file_name())).unwrap(), b"scan.png");
    }

    #[test]
    fn export_without_attachments_creates_no_folder() {
        let (dir, conn, store) = setup();
        let visit_id = visit(&conn, "City Hospital");
        let path = dir.path().join("plain.xlsx");

        let report = export_visit_records(&conn, &store, &[visit_id], &path).unwrap();
        assert!(path.is_file());
        assert!(report.attachment_dir.is_none());
        assert!(!dir.path().join("plain附件").exists());
    }

    #[test]
    fn export_rejects_empty_and_unknown_selections() {
        let (dir, conn, store) = setup();
        let path = dir.path().join("x.xlsx");
        assert!(matches!(
            export_visit_records(&conn, &store, &[], &path),
            Err(ExportError::NoRecords)
        ));
        assert!(matches!(
            export_visit_records(&conn, &store, &[404], &path),
            Err(ExportError::Database(DatabaseError::NotFound { .. }))
        ));
        assert!(!path.exists());
    }
}

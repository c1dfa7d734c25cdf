use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::*;

const VISIT_COLUMNS: &str = "id, date, hospital, department, doctor, organ_system,
     reason, diagnosis, medication, remark, created_at, updated_at";

pub fn insert_visit_record(conn: &Connection, fields: &VisitFields) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO visit_records (date, hospital, department, doctor, organ_system,
         reason, diagnosis, medication, remark)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            fields.date.to_string(),
            fields.hospital,
            fields.department,
            fields.doctor,
            fields.organ_system,
            fields.reason,
            fields.diagnosis,
            fields.medication,
            fields.remark,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_visit_record(conn: &Connection, id: i64) -> Result<Option<VisitRecord>, DatabaseError> {
    let sql = format!("SELECT {VISIT_COLUMNS} FROM visit_records WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], read_visit_row)
        .optional()?;
    row.map(visit_from_row).transpose()
}

pub fn visit_record_exists(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM visit_records WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Overwrite the editable fields and bump `updated_at`.
pub fn update_visit_record(
    conn: &Connection,
    id: i64,
    fields: &VisitFields,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE visit_records SET date = ?2, hospital = ?3, department = ?4, doctor = ?5,
         organ_system = ?6, reason = ?7, diagnosis = ?8, medication = ?9, remark = ?10,
         updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![
            id,
            fields.date.to_string(),
            fields.hospital,
            fields.department,
            fields.doctor,
            fields.organ_system,
            fields.reason,
            fields.diagnosis,
            fields.medication,
            fields.remark,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "VisitRecord".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Delete the visit row. Attachment rows go with it through ON DELETE CASCADE;
/// their files are the caller's responsibility.
pub fn delete_visit_record_row(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM visit_records WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "VisitRecord".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// All visits, newest first.
pub fn list_visit_records(conn: &Connection) -> Result<Vec<VisitRecord>, DatabaseError> {
    let sql = format!("SELECT {VISIT_COLUMNS} FROM visit_records ORDER BY date DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], read_visit_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(visit_from_row).collect()
}

/// Visits matching a filter, newest first.
///
/// Date and hospital narrowing happen in SQL; keywords are matched in Rust so
/// that case folding covers non-ASCII text.
pub fn search_visit_records(
    conn: &Connection,
    filter: &VisitFilter,
) -> Result<Vec<VisitRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {VISIT_COLUMNS} FROM visit_records
         WHERE (?1 IS NULL OR date >= ?1)
         AND (?2 IS NULL OR date <= ?2)
         AND (?3 IS NULL OR hospital = ?3)
         ORDER BY date DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                filter.date_from.map(|d| d.to_string()),
                filter.date_to.map(|d| d.to_string()),
                filter.hospital,
            ],
            read_visit_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let query = filter.keywords.as_deref().unwrap_or("");
    let mut visits = Vec::with_capacity(rows.len());
    for row in rows {
        let visit = visit_from_row(row)?;
        if matches_keywords(&visit.searchable_text(), query) {
            visits.push(visit);
        }
    }
    Ok(visits)
}

/// True when every whitespace-separated keyword occurs in `text`,
/// ignoring case. A blank query matches everything; blank text matches
/// only a blank query.
pub fn matches_keywords(text: &str, query: &str) -> bool {
    let keywords: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if keywords.is_empty() {
        return true;
    }
    if text.is_empty() {
        return false;
    }
    let haystack = text.to_lowercase();
    keywords.iter().all(|kw| haystack.contains(kw.as_str()))
}

// Internal row type for VisitRecord mapping
struct VisitRow {
    id: i64,
    date: String,
    hospital: Option<String>,
    department: Option<String>,
    doctor: Option<String>,
    organ_system: Option<String>,
    reason: Option<String>,
    diagnosis: Option<String>,
    medication: Option<String>,
    remark: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

fn read_visit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VisitRow> {
    Ok(VisitRow {
        id: row.get(0)?,
        date: row.get(1)?,
        hospital: row.get(2)?,
        department: row.get(3)?,
        doctor: row.get(4)?,
        organ_system: row.get(5)?,
        reason: row.get(6)?,
        diagnosis: row.get(7)?,
        medication: row.get(8)?,
        remark: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn visit_from_row(row: VisitRow) -> Result<VisitRecord, DatabaseError> {
    let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
        DatabaseError::ConstraintViolation(format!("visit {} has invalid date '{}': {e}", row.id, row.date))
    })?;
    Ok(VisitRecord {
        id: row.id,
        date,
        hospital: row.hospital,
        department: row.department,
        doctor: row.doctor,
        organ_system: row.organ_system,
        reason: row.reason,
        diagnosis: row.diagnosis,
        medication: row.medication,
        remark: row.remark,
        created_at: parse_timestamp(row.created_at.as_deref()),
        updated_at: parse_timestamp(row.updated_at.as_deref()),
    })
}

fn parse_timestamp(value: Option<&str>) -> NaiveDateTime {
    value
        .and_then(|s| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .ok()
        })
        .unwrap_or_default()
}

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::AttachmentRecord;

/// Reserve an attachment id for a visit. The row carries an empty path until
/// its file has been copied; see [`set_attachment_path`].
pub fn insert_attachment_placeholder(
    conn: &Connection,
    visit_record_id: i64,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO attachment_records (visit_record_id, file_path) VALUES (?1, '')",
        params![visit_record_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_attachment_path(
    conn: &Connection,
    attachment_id: i64,
    file_path: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE attachment_records SET file_path = ?2 WHERE id = ?1",
        params![attachment_id, file_path],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "AttachmentRecord".into(),
            id: attachment_id.to_string(),
        });
    }
    Ok(())
}

pub fn get_attachment(
    conn: &Connection,
    attachment_id: i64,
) -> Result<Option<AttachmentRecord>, DatabaseError> {
    let record = conn
        .query_row(
            "SELECT id, visit_record_id, file_path FROM attachment_records WHERE id = ?1",
            params![attachment_id],
            attachment_from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn list_attachments_for_visit(
    conn: &Connection,
    visit_record_id: i64,
) -> Result<Vec<AttachmentRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, visit_record_id, file_path FROM attachment_records
         WHERE visit_record_id = ?1 AND file_path != ''
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![visit_record_id], attachment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every finalized attachment row, in id order.
pub fn list_attachments(conn: &Connection) -> Result<Vec<AttachmentRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, visit_record_id, file_path FROM attachment_records
         WHERE file_path != '' ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], attachment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_attachments(conn: &Connection, visit_record_id: i64) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM attachment_records WHERE visit_record_id = ?1 AND file_path != ''",
        params![visit_record_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_attachment_row(conn: &Connection, attachment_id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM attachment_records WHERE id = ?1",
        params![attachment_id],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "AttachmentRecord".into(),
            id: attachment_id.to_string(),
        });
    }
    Ok(())
}

/// Rows whose upload never completed (empty `file_path`).
pub fn list_attachment_placeholders(
    conn: &Connection,
) -> Result<Vec<AttachmentRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, visit_record_id, file_path FROM attachment_records
         WHERE file_path = '' ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], attachment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Drop placeholder rows left behind by an interrupted upload.
pub fn delete_attachment_placeholders(conn: &Connection) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM attachment_records WHERE file_path = ''", [])?;
    Ok(deleted)
}

fn attachment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttachmentRecord> {
    Ok(AttachmentRecord {
        id: row.get(0)?,
        visit_record_id: row.get(1)?,
        file_path: row.get(2)?,
    })
}

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::HistoryField;

/// Distinct non-empty values previously entered for `field`, most recently
/// updated first. Feeds autocomplete for hospital/department/doctor.
pub fn get_field_history(
    conn: &Connection,
    field: HistoryField,
    limit: usize,
) -> Result<Vec<String>, DatabaseError> {
    let sql = format!("{} LIMIT ?1", history_query(field));
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
        .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}

fn history_query(field: HistoryField) -> String {
    // The column name comes from a closed enum, never from caller input.
    let column = field.as_str();
    format!(
        "SELECT {column} FROM visit_records
         WHERE {column} IS NOT NULL AND {column} != ''
         GROUP BY {column}
         ORDER BY MAX(updated_at) DESC, MAX(id) DESC"
    )
}

/// Doctors seen at a given hospital, most recent first.
pub fn get_doctors_by_hospital(
    conn: &Connection,
    hospital: &str,
    limit: usize,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT doctor FROM visit_records
         WHERE hospital = ?1 AND doctor IS NOT NULL AND doctor != ''
         GROUP BY doctor
         ORDER BY MAX(updated_at) DESC, MAX(id) DESC
         LIMIT ?2",
    )?;
    let values = stmt
        .query_map(params![hospital, limit as i64], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}

/// Autocomplete candidates for `field` containing `typed` (case-insensitive).
/// With nothing typed, the most recent `limit` values are returned.
pub fn suggest_field_values(
    conn: &Connection,
    field: HistoryField,
    typed: &str,
    limit: usize,
) -> Result<Vec<String>, DatabaseError> {
    let typed = typed.trim().to_lowercase();
    if typed.is_empty() {
        return get_field_history(conn, field, limit);
    }
    // Case folding happens in Rust (Unicode-aware), so walk the whole history.
    let mut stmt = conn.prepare(&history_query(field))?;
    let mut rows = stmt.query([])?;
    let mut matches = Vec::new();
    while matches.len() < limit {
        let Some(row) = rows.next()? else { break };
        let value: String = row.get(0)?;
        if value.to_lowercase().contains(&typed) {
            matches.push(value);
        }
    }
    Ok(matches)
}

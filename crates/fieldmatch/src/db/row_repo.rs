//! Template instance row repository for `template_instance_rows`.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, from_json, parse_enum, parse_timestamp, to_json, DatabaseError};
use crate::template::model::{RowFilter, RowStatus, TemplateInstanceRow};

struct RawRow {
    id: String,
    instance_id: String,
    row_key: String,
    row_index: u64,
    source_document_ids: String,
    field_values: String,
    field_issues: String,
    validation_errors: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            instance_id: row.get("instance_id")?,
            row_key: row.get("row_key")?,
            row_index: row.get("row_index")?,
            source_document_ids: row.get("source_document_ids")?,
            field_values: row.get("field_values")?,
            field_issues: row.get("field_issues")?,
            validation_errors: row.get("validation_errors")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn decode(self) -> Result<TemplateInstanceRow, DatabaseError> {
        Ok(TemplateInstanceRow {
            source_document_ids: from_json("source_document_ids", &self.source_document_ids)?,
            field_values: from_json("field_values", &self.field_values)?,
            field_issues: from_json("field_issues", &self.field_issues)?,
            validation_errors: from_json("validation_errors", &self.validation_errors)?,
            status: parse_enum::<RowStatus>("status", &self.status)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            instance_id: self.instance_id,
            row_key: self.row_key,
            row_index: self.row_index,
        })
    }
}

pub fn insert(conn: &Connection, row: &TemplateInstanceRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO template_instance_rows (id, instance_id, row_key, row_index,
         source_document_ids, field_values, field_issues, validation_errors, status,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            row.id,
            row.instance_id,
            row.row_key,
            row.row_index,
            to_json("source_document_ids", &row.source_document_ids)?,
            to_json("field_values", &row.field_values)?,
            to_json("field_issues", &row.field_issues)?,
            to_json("validation_errors", &row.validation_errors)?,
            row.status.as_str(),
            format_timestamp(&row.created_at),
            format_timestamp(&row.updated_at),
        ],
    )?;
    Ok(())
}

/// Overwrites the mutable columns of a row.
pub fn update(conn: &Connection, row: &TemplateInstanceRow) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE template_instance_rows SET source_document_ids=?2, field_values=?3,
         field_issues=?4, validation_errors=?5, status=?6, updated_at=?7
         WHERE id=?1",
        params![
            row.id,
            to_json("source_document_ids", &row.source_document_ids)?,
            to_json("field_values", &row.field_values)?,
            to_json("field_issues", &row.field_issues)?,
            to_json("validation_errors", &row.validation_errors)?,
            row.status.as_str(),
            format_timestamp(&row.updated_at),
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM template_instance_rows WHERE id=?1", params![id])?;
    Ok(changed > 0)
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<TemplateInstanceRow>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT * FROM template_instance_rows WHERE id = ?1",
            params![id],
            RawRow::from_row,
        )
        .optional()?;
    raw.map(RawRow::decode).transpose()
}

pub fn find_by_key(
    conn: &Connection,
    instance_id: &str,
    row_key: &str,
) -> Result<Option<TemplateInstanceRow>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT * FROM template_instance_rows WHERE instance_id = ?1 AND row_key = ?2",
            params![instance_id, row_key],
            RawRow::from_row,
        )
        .optional()?;
    raw.map(RawRow::decode).transpose()
}

/// Index for the next row created in an instance.
pub fn next_row_index(conn: &Connection, instance_id: &str) -> Result<u64, DatabaseError> {
    let next: u64 = conn.query_row(
        "SELECT COALESCE(MAX(row_index) + 1, 0) FROM template_instance_rows WHERE instance_id = ?1",
        params![instance_id],
        |r| r.get(0),
    )?;
    Ok(next)
}

/// Queries rows of an instance in creation order, returning (rows, total_count).
pub fn query(
    conn: &Connection,
    instance_id: &str,
    filter: &RowFilter,
) -> Result<(Vec<TemplateInstanceRow>, u64), DatabaseError> {
    let mut conditions = vec!["instance_id = ?1".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(instance_id.to_string())];

    if let Some(status) = filter.status {
        conditions.push(format!("status = ?{}", param_values.len() + 1));
        param_values.push(Box::new(status.as_str()));
    }

    let where_clause = format!("WHERE {}", conditions.join(" AND "));

    let count_sql = format!("SELECT COUNT(*) FROM template_instance_rows {}", where_clause);
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

    let limit = filter.limit.unwrap_or(100) as i64;
    let offset = filter.offset.unwrap_or(0) as i64;
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let query_sql = format!(
        "SELECT * FROM template_instance_rows {} ORDER BY row_index LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query_sql)?;
    let raws = stmt
        .query_map(params_ref.as_slice(), RawRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    let rows = raws
        .into_iter()
        .map(RawRow::decode)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

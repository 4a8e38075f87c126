//! Template instance repository for `template_instances`.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_enum, parse_timestamp, DatabaseError};
use crate::template::model::{InstanceStats, InstanceStatus, TemplateInstance};

struct RawInstance {
    id: String,
    template_id: String,
    name: String,
    company_id: Option<String>,
    format_id: Option<String>,
    status: String,
    total_rows: u64,
    valid_rows: u64,
    invalid_rows: u64,
    created_at: String,
    updated_at: String,
    exported_at: Option<String>,
}

impl RawInstance {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            template_id: row.get("template_id")?,
            name: row.get("name")?,
            company_id: row.get("company_id")?,
            format_id: row.get("format_id")?,
            status: row.get("status")?,
            total_rows: row.get("total_rows")?,
            valid_rows: row.get("valid_rows")?,
            invalid_rows: row.get("invalid_rows")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            exported_at: row.get("exported_at")?,
        })
    }

    fn decode(self) -> Result<TemplateInstance, DatabaseError> {
        Ok(TemplateInstance {
            status: parse_enum::<InstanceStatus>("status", &self.status)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            exported_at: self
                .exported_at
                .as_deref()
                .map(|ts| parse_timestamp("exported_at", ts))
                .transpose()?,
            id: self.id,
            template_id: self.template_id,
            name: self.name,
            company_id: self.company_id,
            format_id: self.format_id,
            total_rows: self.total_rows,
            valid_rows: self.valid_rows,
            invalid_rows: self.invalid_rows,
        })
    }
}

pub fn insert(conn: &Connection, instance: &TemplateInstance) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO template_instances (id, template_id, name, company_id, format_id, status,
         total_rows, valid_rows, invalid_rows, created_at, updated_at, exported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            instance.id,
            instance.template_id,
            instance.name,
            instance.company_id,
            instance.format_id,
            instance.status.as_str(),
            instance.total_rows,
            instance.valid_rows,
            instance.invalid_rows,
            format_timestamp(&instance.created_at),
            format_timestamp(&instance.updated_at),
            instance.exported_at.as_ref().map(format_timestamp),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<TemplateInstance>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT * FROM template_instances WHERE id = ?1",
            params![id],
            RawInstance::from_row,
        )
        .optional()?;
    raw.map(RawInstance::decode).transpose()
}

pub fn set_status(
    conn: &Connection,
    id: &str,
    status: InstanceStatus,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE template_instances SET status=?2, updated_at=?3 WHERE id=?1",
        params![id, status.as_str(), updated_at],
    )?;
    Ok(changed > 0)
}

pub fn mark_exported(conn: &Connection, id: &str, exported_at: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE template_instances SET status='EXPORTED', exported_at=?2, updated_at=?2 WHERE id=?1",
        params![id, exported_at],
    )?;
    Ok(changed > 0)
}

/// Recounts rows by status and stores the counters on the instance.
pub fn refresh_stats(
    conn: &Connection,
    id: &str,
    updated_at: &str,
) -> Result<InstanceStats, DatabaseError> {
    let stats = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'VALID' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'INVALID' THEN 1 ELSE 0 END), 0)
         FROM template_instance_rows WHERE instance_id = ?1",
        params![id],
        |r| {
            Ok(InstanceStats {
                total_rows: r.get(0)?,
                valid_rows: r.get(1)?,
                invalid_rows: r.get(2)?,
            })
        },
    )?;
    conn.execute(
        "UPDATE template_instances SET total_rows=?2, valid_rows=?3, invalid_rows=?4, updated_at=?5
         WHERE id=?1",
        params![id, stats.total_rows, stats.valid_rows, stats.invalid_rows, updated_at],
    )?;
    Ok(stats)
}

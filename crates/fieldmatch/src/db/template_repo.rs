//! Template repository for `data_templates`.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, from_json, to_json, DatabaseError};
use crate::template::model::Template;

struct RawTemplate {
    id: String,
    name: String,
    description: Option<String>,
    row_key_field: Option<String>,
    fields: String,
}

impl RawTemplate {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            row_key_field: row.get("row_key_field")?,
            fields: row.get("fields")?,
        })
    }

    fn decode(self) -> Result<Template, DatabaseError> {
        Ok(Template {
            fields: from_json("fields", &self.fields)?,
            id: self.id,
            name: self.name,
            description: self.description,
            row_key_field: self.row_key_field,
        })
    }
}

/// Inserts or replaces a template definition, keeping its creation time.
pub fn upsert(conn: &Connection, template: &Template) -> Result<(), DatabaseError> {
    let now = format_timestamp(&Utc::now());
    conn.execute(
        "INSERT INTO data_templates (id, name, description, row_key_field, fields, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           description = excluded.description,
           row_key_field = excluded.row_key_field,
           fields = excluded.fields,
           updated_at = excluded.updated_at",
        params![
            template.id,
            template.name,
            template.description,
            template.row_key_field,
            to_json("fields", &template.fields)?,
            now,
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Template>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT * FROM data_templates WHERE id = ?1",
            params![id],
            RawTemplate::from_row,
        )
        .optional()?;
    raw.map(RawTemplate::decode).transpose()
}

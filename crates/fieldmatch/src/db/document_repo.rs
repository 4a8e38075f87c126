//! Source document repository for `source_documents`.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_timestamp, from_json, to_json, DatabaseError};
use crate::document::SourceDocument;

/// Inserts or replaces a document's fields.
pub fn upsert(conn: &Connection, document: &SourceDocument) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO source_documents (id, company_id, format_id, fields, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           company_id = excluded.company_id,
           format_id = excluded.format_id,
           fields = excluded.fields",
        params![
            document.id,
            document.company_id,
            document.format_id,
            to_json("fields", &document.fields)?,
            format_timestamp(&Utc::now()),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<SourceDocument>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT id, company_id, format_id, fields FROM source_documents WHERE id = ?1",
            params![id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    raw.map(|(id, company_id, format_id, fields)| -> Result<SourceDocument, DatabaseError> {
        Ok(SourceDocument {
            id,
            company_id,
            format_id,
            fields: from_json("fields", &fields)?,
        })
    })
    .transpose()
}

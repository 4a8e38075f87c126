//! Mapping configuration repository for `mapping_configurations`.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, from_json, parse_enum, parse_timestamp, to_json, DatabaseError};
use crate::mapping::model::{MappingConfigFilter, MappingConfiguration, MappingScope};

/// Raw column values; JSON and enum columns are decoded afterwards so their
/// errors surface as `DatabaseError` rather than `rusqlite::Error`.
struct RawConfig {
    id: String,
    template_id: String,
    scope: String,
    company_id: Option<String>,
    format_id: Option<String>,
    priority: i32,
    is_active: bool,
    rules: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawConfig {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            template_id: row.get("template_id")?,
            scope: row.get("scope")?,
            company_id: row.get("company_id")?,
            format_id: row.get("format_id")?,
            priority: row.get("priority")?,
            is_active: row.get("is_active")?,
            rules: row.get("rules")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn decode(self) -> Result<MappingConfiguration, DatabaseError> {
        Ok(MappingConfiguration {
            scope: parse_enum::<MappingScope>("scope", &self.scope)?,
            rules: from_json("rules", &self.rules)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            template_id: self.template_id,
            company_id: self.company_id,
            format_id: self.format_id,
            priority: self.priority,
            is_active: self.is_active,
            description: self.description,
        })
    }
}

fn collect(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<MappingConfiguration>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let raws = stmt
        .query_map(params, RawConfig::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawConfig::decode).collect()
}

/// Inserts a new configuration.
pub fn insert(conn: &Connection, config: &MappingConfiguration) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO mapping_configurations (id, template_id, scope, company_id, format_id,
         priority, is_active, rules, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            config.id,
            config.template_id,
            config.scope.as_str(),
            config.company_id,
            config.format_id,
            config.priority,
            config.is_active,
            to_json("rules", &config.rules)?,
            config.description,
            format_timestamp(&config.created_at),
            format_timestamp(&config.updated_at),
        ],
    )?;
    Ok(())
}

/// Overwrites every column except `id` and `created_at`.
pub fn update(conn: &Connection, config: &MappingConfiguration) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE mapping_configurations SET template_id=?2, scope=?3, company_id=?4,
         format_id=?5, priority=?6, is_active=?7, rules=?8, description=?9, updated_at=?10
         WHERE id=?1",
        params![
            config.id,
            config.template_id,
            config.scope.as_str(),
            config.company_id,
            config.format_id,
            config.priority,
            config.is_active,
            to_json("rules", &config.rules)?,
            config.description,
            format_timestamp(&config.updated_at),
        ],
    )?;
    Ok(changed > 0)
}

pub fn set_active(
    conn: &Connection,
    id: &str,
    is_active: bool,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE mapping_configurations SET is_active=?2, updated_at=?3 WHERE id=?1",
        params![id, is_active, updated_at],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM mapping_configurations WHERE id=?1", params![id])?;
    Ok(changed > 0)
}

/// Finds a configuration by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<MappingConfiguration>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT * FROM mapping_configurations WHERE id = ?1",
            params![id],
            RawConfig::from_row,
        )
        .optional()?;
    raw.map(RawConfig::decode).transpose()
}

/// Returns the ID of the configuration occupying a scope key, if any.
pub fn find_id_by_scope_key(
    conn: &Connection,
    template_id: &str,
    scope: MappingScope,
    company_id: Option<&str>,
    format_id: Option<&str>,
) -> Result<Option<String>, DatabaseError> {
    let id = conn
        .query_row(
            "SELECT id FROM mapping_configurations
             WHERE template_id = ?1 AND scope = ?2
               AND IFNULL(company_id, '') = IFNULL(?3, '')
               AND IFNULL(format_id, '') = IFNULL(?4, '')",
            params![template_id, scope.as_str(), company_id, format_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Active configurations that can apply to a (company, format) pair.
///
/// FORMAT configurations that also name a company are returned only when that
/// company matches.
pub fn find_applicable(
    conn: &Connection,
    template_id: &str,
    company_id: Option<&str>,
    format_id: Option<&str>,
) -> Result<Vec<MappingConfiguration>, DatabaseError> {
    collect(
        conn,
        "SELECT * FROM mapping_configurations
         WHERE template_id = ?1 AND is_active = 1 AND (
               scope = 'GLOBAL'
            OR (scope = 'COMPANY' AND ?2 IS NOT NULL AND company_id = ?2)
            OR (scope = 'FORMAT' AND ?3 IS NOT NULL AND format_id = ?3
                AND (company_id IS NULL OR company_id = ?2))
         )",
        &[&template_id, &company_id, &format_id],
    )
}

/// Lists configurations matching the filter, newest first.
pub fn query(
    conn: &Connection,
    filter: &MappingConfigFilter,
) -> Result<Vec<MappingConfiguration>, DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref template_id) = filter.template_id {
        conditions.push(format!("template_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(template_id.clone()));
    }
    if let Some(scope) = filter.scope {
        conditions.push(format!("scope = ?{}", param_values.len() + 1));
        param_values.push(Box::new(scope.as_str()));
    }
    if let Some(ref company_id) = filter.company_id {
        conditions.push(format!("company_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(company_id.clone()));
    }
    if let Some(ref format_id) = filter.format_id {
        conditions.push(format!("format_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(format_id.clone()));
    }
    if let Some(is_active) = filter.is_active {
        conditions.push(format!("is_active = ?{}", param_values.len() + 1));
        param_values.push(Box::new(is_active));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let sql = format!(
        "SELECT * FROM mapping_configurations {} ORDER BY created_at DESC, id",
        where_clause
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    collect(conn, &sql, params_ref.as_slice())
}

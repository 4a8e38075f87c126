//! Templates, template instances and their rows.
//!
//! `upsert_row` is the single write path used by matching: the lookup,
//! merge, validation and write of a row happen in one transaction under the
//! database lock, so concurrent contributions to the same row key serialize.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::merge::{apply_contribution, revalidate, ConflictPolicy, RowContribution, UpsertOutcome};
use super::model::{
    InstanceStats, InstanceStatus, RowFilter, Template, TemplateInstance, TemplateInstanceRow,
};
use crate::db::{format_timestamp, instance_repo, row_repo, template_repo, Database};
use crate::error::StoreError;
use crate::validation::ValidationEngine;
use crate::value::FieldMap;

#[derive(Clone)]
pub struct InstanceStore {
    db: Database,
}

fn load_instance(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<TemplateInstance, StoreError> {
    instance_repo::find_by_id(conn, id)?.ok_or_else(|| StoreError::not_found("Template instance", id))
}

fn load_writable_instance(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<TemplateInstance, StoreError> {
    let instance = load_instance(conn, id)?;
    if instance.status == InstanceStatus::Exported {
        return Err(StoreError::InstanceImmutable(id.to_string()));
    }
    Ok(instance)
}

fn validate_template(template: &Template) -> Result<(), StoreError> {
    let invalid = |reason: String| StoreError::InvalidTemplate {
        id: template.id.clone(),
        reason,
    };

    if template.id.trim().is_empty() {
        return Err(invalid("id is empty".to_string()));
    }
    if template.name.trim().is_empty() {
        return Err(invalid("name is empty".to_string()));
    }

    let mut names = HashSet::new();
    for field in &template.fields {
        if field.name.trim().is_empty() {
            return Err(invalid("a field has an empty name".to_string()));
        }
        if !names.insert(field.name.as_str()) {
            return Err(invalid(format!("field '{}' is defined twice", field.name)));
        }
    }

    if let Some(ref key) = template.row_key_field {
        if !names.contains(key.as_str()) {
            return Err(invalid(format!("row key field '{}' is not a template field", key)));
        }
    }
    Ok(())
}

impl InstanceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn save_template(&self, template: &Template) -> Result<(), StoreError> {
        validate_template(template)?;
        self.db.with_conn(|conn| template_repo::upsert(conn, template))?;
        info!(id = %template.id, fields = template.fields.len(), "Saved template");
        Ok(())
    }

    pub fn get_template(&self, id: &str) -> Result<Option<Template>, StoreError> {
        Ok(self.db.with_conn(|conn| template_repo::find_by_id(conn, id))?)
    }

    /// Creates a DRAFT instance of an existing template.
    pub fn create_instance(
        &self,
        template_id: &str,
        name: &str,
        company_id: Option<&str>,
        format_id: Option<&str>,
    ) -> Result<TemplateInstance, StoreError> {
        let now = Utc::now();
        let instance = TemplateInstance {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.to_string(),
            name: name.to_string(),
            company_id: company_id.map(str::to_string),
            format_id: format_id.map(str::to_string),
            status: InstanceStatus::Draft,
            total_rows: 0,
            valid_rows: 0,
            invalid_rows: 0,
            created_at: now,
            updated_at: now,
            exported_at: None,
        };

        self.db.with_transaction(|tx| {
            if template_repo::find_by_id(tx, template_id)?.is_none() {
                return Err(StoreError::not_found("Template", template_id));
            }
            instance_repo::insert(tx, &instance)?;
            Ok(())
        })?;

        info!(id = %instance.id, template_id, "Created template instance");
        Ok(instance)
    }

    pub fn get_instance(&self, id: &str) -> Result<Option<TemplateInstance>, StoreError> {
        Ok(self.db.with_conn(|conn| instance_repo::find_by_id(conn, id))?)
    }

    /// Moves an instance to `status`. EXPORTED instances never change.
    pub fn set_status(&self, id: &str, status: InstanceStatus) -> Result<(), StoreError> {
        self.db.with_transaction(|tx| {
            let instance = load_instance(tx, id)?;
            if instance.status == InstanceStatus::Exported {
                return Err(StoreError::InstanceImmutable(id.to_string()));
            }
            if !instance.status.can_transition_to(status) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: instance.status,
                    to: status,
                });
            }
            instance_repo::set_status(tx, id, status, &format_timestamp(&Utc::now()))?;
            Ok(())
        })?;
        debug!(id, %status, "Instance status changed");
        Ok(())
    }

    /// Freezes a COMPLETED instance. All later writes are refused.
    pub fn mark_exported(&self, id: &str) -> Result<TemplateInstance, StoreError> {
        let instance = self.db.with_transaction(|tx| {
            let instance = load_writable_instance(tx, id)?;
            if !instance.status.can_transition_to(InstanceStatus::Exported) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: instance.status,
                    to: InstanceStatus::Exported,
                });
            }
            instance_repo::mark_exported(tx, id, &format_timestamp(&Utc::now()))?;
            load_instance(tx, id)
        })?;
        info!(id, "Instance exported");
        Ok(instance)
    }

    /// Recounts rows and stores the aggregate counters.
    pub fn recompute_stats(&self, id: &str) -> Result<InstanceStats, StoreError> {
        self.db.with_transaction(|tx| {
            load_instance(tx, id)?;
            Ok(instance_repo::refresh_stats(tx, id, &format_timestamp(&Utc::now()))?)
        })
    }

    /// Merges a contribution into the row with the same key, creating the row
    /// when needed, and validates the result.
    pub fn upsert_row(
        &self,
        instance_id: &str,
        contribution: &RowContribution,
        validator: &ValidationEngine,
        policy: ConflictPolicy,
    ) -> Result<UpsertOutcome, StoreError> {
        self.db.with_transaction(|tx| {
            load_writable_instance(tx, instance_id)?;

            let existing = row_repo::find_by_key(tx, instance_id, &contribution.row_key)?;
            let next_index = match existing {
                Some(_) => 0,
                None => row_repo::next_row_index(tx, instance_id)?,
            };

            let outcome = apply_contribution(
                existing,
                instance_id,
                next_index,
                contribution,
                validator,
                policy,
            );

            if outcome.created {
                row_repo::insert(tx, &outcome.row)?;
            } else {
                row_repo::update(tx, &outcome.row)?;
            }
            Ok(outcome)
        })
    }

    pub fn get_row(&self, row_id: &str) -> Result<Option<TemplateInstanceRow>, StoreError> {
        Ok(self.db.with_conn(|conn| row_repo::find_by_id(conn, row_id))?)
    }

    pub fn get_row_by_key(
        &self,
        instance_id: &str,
        row_key: &str,
    ) -> Result<Option<TemplateInstanceRow>, StoreError> {
        Ok(self
            .db
            .with_conn(|conn| row_repo::find_by_key(conn, instance_id, row_key))?)
    }

    pub fn next_row_index(&self, instance_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .db
            .with_conn(|conn| row_repo::next_row_index(conn, instance_id))?)
    }

    /// Paginated rows of an instance in creation order, with the total count.
    pub fn list_rows(
        &self,
        instance_id: &str,
        filter: &RowFilter,
    ) -> Result<(Vec<TemplateInstanceRow>, u64), StoreError> {
        Ok(self
            .db
            .with_conn(|conn| row_repo::query(conn, instance_id, filter))?)
    }

    /// Manually sets field values on a row and revalidates it.
    ///
    /// Unlike merges, an explicit edit may set a field to null. Edited fields
    /// lose their pending issues.
    pub fn update_row(&self, row_id: &str, values: FieldMap) -> Result<TemplateInstanceRow, StoreError> {
        self.db.with_transaction(|tx| {
            let mut row = row_repo::find_by_id(tx, row_id)?
                .ok_or_else(|| StoreError::not_found("Row", row_id))?;
            let instance = load_writable_instance(tx, &row.instance_id)?;
            let template = template_repo::find_by_id(tx, &instance.template_id)?
                .ok_or_else(|| StoreError::not_found("Template", &instance.template_id))?;

            for (field, value) in values {
                row.field_issues.remove(&field);
                row.field_values.insert(field, value);
            }
            revalidate(&mut row, &ValidationEngine::new(template.fields));

            row_repo::update(tx, &row)?;
            instance_repo::refresh_stats(tx, &instance.id, &format_timestamp(&Utc::now()))?;
            Ok(row)
        })
    }

    pub fn delete_row(&self, row_id: &str) -> Result<(), StoreError> {
        self.db.with_transaction(|tx| {
            let row = row_repo::find_by_id(tx, row_id)?
                .ok_or_else(|| StoreError::not_found("Row", row_id))?;
            load_writable_instance(tx, &row.instance_id)?;
            row_repo::delete(tx, row_id)?;
            instance_repo::refresh_stats(tx, &row.instance_id, &format_timestamp(&Utc::now()))?;
            Ok(())
        })
    }
}

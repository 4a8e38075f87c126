//! Field-level merge of document contributions into rows.
//!
//! A contribution only ever fills or overrides fields it supplies with a
//! non-null value. Nulls never erase existing values, so several documents
//! describing the same shipment converge to one complete row regardless of
//! their processing order.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{RowStatus, TemplateInstanceRow};
use crate::validation::ValidationEngine;
use crate::value::{FieldMap, FieldValue};

/// How two different non-null values for the same field are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// The value processed last replaces the existing one.
    #[default]
    LastWriteWins,
    /// The existing value is kept.
    KeepFirst,
    /// The existing value is kept and the field is flagged, making the row INVALID.
    FlagForReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    Overwritten,
    Kept,
    Flagged,
}

/// Two documents disagreed on a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConflict {
    pub field: String,
    pub existing: FieldValue,
    pub incoming: FieldValue,
    pub resolution: ConflictResolution,
}

/// The values one document contributes to one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowContribution {
    pub document_id: String,
    pub row_key: String,
    pub values: FieldMap,
    /// Per-field problems found while transforming, keyed by target field.
    pub issues: BTreeMap<String, String>,
}

/// Result of merging one contribution.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub row: TemplateInstanceRow,
    pub created: bool,
    pub conflicts: Vec<FieldConflict>,
}

/// Merges `contribution` into `row` in place and returns the conflicts seen.
pub fn merge_contribution(
    row: &mut TemplateInstanceRow,
    contribution: &RowContribution,
    policy: ConflictPolicy,
) -> Vec<FieldConflict> {
    let mut conflicts = Vec::new();

    for (field, incoming) in &contribution.values {
        let current = row.field_values.get(field).cloned().flatten();

        match (current, incoming) {
            (None, None) => {
                row.field_values.entry(field.clone()).or_insert(None);
                if let Some(issue) = contribution.issues.get(field) {
                    row.field_issues.insert(field.clone(), issue.clone());
                }
            }
            (Some(_), None) => {}
            (None, Some(value)) => {
                row.field_values.insert(field.clone(), Some(value.clone()));
                row.field_issues.remove(field);
            }
            (Some(existing), Some(value)) if existing.same_as(value) => {}
            (Some(existing), Some(value)) => {
                let resolution = match policy {
                    ConflictPolicy::LastWriteWins => {
                        row.field_values.insert(field.clone(), Some(value.clone()));
                        row.field_issues.remove(field);
                        ConflictResolution::Overwritten
                    }
                    ConflictPolicy::KeepFirst => ConflictResolution::Kept,
                    ConflictPolicy::FlagForReview => {
                        row.field_issues.insert(
                            field.clone(),
                            format!(
                                "conflicting values: kept '{}', document {} supplied '{}'",
                                existing.as_text(),
                                contribution.document_id,
                                value.as_text()
                            ),
                        );
                        ConflictResolution::Flagged
                    }
                };
                conflicts.push(FieldConflict {
                    field: field.clone(),
                    existing,
                    incoming: value.clone(),
                    resolution,
                });
            }
        }
    }

    if !row
        .source_document_ids
        .iter()
        .any(|id| id == &contribution.document_id)
    {
        row.source_document_ids.push(contribution.document_id.clone());
    }

    conflicts
}

/// An empty row for `contribution`'s key.
pub fn new_row(instance_id: &str, row_index: u64, contribution: &RowContribution) -> TemplateInstanceRow {
    let now = Utc::now();
    TemplateInstanceRow {
        id: Uuid::new_v4().to_string(),
        instance_id: instance_id.to_string(),
        row_key: contribution.row_key.clone(),
        row_index,
        source_document_ids: Vec::new(),
        field_values: FieldMap::new(),
        field_issues: BTreeMap::new(),
        validation_errors: Vec::new(),
        status: RowStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

/// Re-runs validation and updates the row's status.
pub fn revalidate(row: &mut TemplateInstanceRow, validator: &ValidationEngine) {
    row.validation_errors = validator.validate(&row.field_values, &row.field_issues);
    row.status = ValidationEngine::status_for(&row.validation_errors);
    row.updated_at = Utc::now();
}

/// Merges a contribution into an existing row, or starts a new one, then
/// validates the result.
pub fn apply_contribution(
    existing: Option<TemplateInstanceRow>,
    instance_id: &str,
    next_row_index: u64,
    contribution: &RowContribution,
    validator: &ValidationEngine,
    policy: ConflictPolicy,
) -> UpsertOutcome {
    let created = existing.is_none();
    let mut row = existing.unwrap_or_else(|| new_row(instance_id, next_row_index, contribution));

    let conflicts = merge_contribution(&mut row, contribution, policy);
    revalidate(&mut row, validator);

    UpsertOutcome {
        row,
        created,
        conflicts,
    }
}

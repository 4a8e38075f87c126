//! Output templates, their instances and rows.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::FieldMap;

/// Declared type of a template field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl TemplateField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Target output template definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field whose value identifies a row. Falls back to the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_key_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

impl Template {
    pub fn field(&self, name: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Lifecycle of a template instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Draft,
    Processing,
    Completed,
    Exported,
    Error,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Draft => "DRAFT",
            InstanceStatus::Processing => "PROCESSING",
            InstanceStatus::Completed => "COMPLETED",
            InstanceStatus::Exported => "EXPORTED",
            InstanceStatus::Error => "ERROR",
        }
    }

    /// EXPORTED is terminal; every other state may be re-entered by a new run.
    pub fn can_transition_to(&self, next: InstanceStatus) -> bool {
        match (self, next) {
            (InstanceStatus::Exported, _) => false,
            (_, InstanceStatus::Exported) => *self == InstanceStatus::Completed,
            _ => true,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InstanceStatus::Draft),
            "PROCESSING" => Ok(InstanceStatus::Processing),
            "COMPLETED" => Ok(InstanceStatus::Completed),
            "EXPORTED" => Ok(InstanceStatus::Exported),
            "ERROR" => Ok(InstanceStatus::Error),
            other => Err(format!("unknown instance status '{}'", other)),
        }
    }
}

/// One output dataset being populated from documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInstance {
    pub id: String,
    pub template_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    pub status: InstanceStatus,
    pub total_rows: u64,
    pub valid_rows: u64,
    pub invalid_rows: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    Pending,
    Valid,
    Invalid,
    Skipped,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Pending => "PENDING",
            RowStatus::Valid => "VALID",
            RowStatus::Invalid => "INVALID",
            RowStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RowStatus::Pending),
            "VALID" => Ok(RowStatus::Valid),
            "INVALID" => Ok(RowStatus::Invalid),
            "SKIPPED" => Ok(RowStatus::Skipped),
            other => Err(format!("unknown row status '{}'", other)),
        }
    }
}

/// A validation message for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A merged output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInstanceRow {
    pub id: String,
    pub instance_id: String,
    pub row_key: String,
    /// Creation order within the instance.
    pub row_index: u64,
    pub source_document_ids: Vec<String>,
    pub field_values: FieldMap,
    /// Pending per-field problems. Cleared when a later contribution
    /// supplies a value for the field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_issues: BTreeMap<String, String>,
    #[serde(default)]
    pub validation_errors: Vec<FieldError>,
    pub status: RowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate row counts for an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStats {
    pub total_rows: u64,
    pub valid_rows: u64,
    pub invalid_rows: u64,
}

/// Filter for paginated row listing.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub status: Option<RowStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

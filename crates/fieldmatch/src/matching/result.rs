use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapping::ResolvedSource;
use crate::template::{
    FieldConflict, FieldError, InstanceStats, InstanceStatus, RowStatus, TemplateInstanceRow,
};
use crate::value::FieldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Merged into a row.
    Matched,
    /// No usable row key.
    Skipped,
    /// Could not be loaded or transformed.
    Failed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Matched => write!(f, "MATCHED"),
            DocumentStatus::Skipped => write!(f, "SKIPPED"),
            DocumentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// What happened to one requested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutcome {
    pub document_id: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_key: Option<String>,
    /// Status of the row after this document was merged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_status: Option<RowStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Transform problems for this document's fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
}

impl DocumentOutcome {
    pub(crate) fn skipped(document_id: &str, reason: String) -> Self {
        Self {
            document_id: document_id.to_string(),
            status: DocumentStatus::Skipped,
            row_key: None,
            row_status: None,
            error: Some(reason),
            field_errors: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn failed(document_id: &str, error: String) -> Self {
        Self {
            document_id: document_id.to_string(),
            status: DocumentStatus::Failed,
            row_key: None,
            row_status: None,
            error: Some(error),
            field_errors: Vec::new(),
            conflicts: Vec::new(),
        }
    }
}

/// Final state of a row touched by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSummary {
    pub row_id: String,
    pub row_key: String,
    pub status: RowStatus,
    pub source_document_ids: Vec<String>,
    pub field_values: FieldMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<FieldError>,
}

impl From<&TemplateInstanceRow> for RowSummary {
    fn from(row: &TemplateInstanceRow) -> Self {
        Self {
            row_id: row.id.clone(),
            row_key: row.row_key.clone(),
            status: row.status,
            source_document_ids: row.source_document_ids.clone(),
            field_values: row.field_values.clone(),
            validation_errors: row.validation_errors.clone(),
        }
    }
}

/// Outcome of a match or preview run.
///
/// Row counters cover the rows this run touched. `instance_stats` holds the
/// instance-wide counters after a persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub run_id: String,
    pub template_instance_id: String,
    pub preview: bool,
    pub cancelled: bool,
    pub total_documents: usize,
    pub processed_documents: usize,
    pub matched_documents: usize,
    pub skipped_documents: usize,
    pub failed_documents: usize,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub instance_status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_stats: Option<InstanceStats>,
    pub resolved_from: Vec<ResolvedSource>,
    pub results: Vec<DocumentOutcome>,
    pub rows: Vec<RowSummary>,
}

impl MatchResult {
    pub fn outcome(&self, document_id: &str) -> Option<&DocumentOutcome> {
        self.results.iter().find(|o| o.document_id == document_id)
    }

    pub fn row(&self, row_key: &str) -> Option<&RowSummary> {
        self.rows.iter().find(|r| r.row_key == row_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingScope;
    use crate::value::FieldValue;

    #[test]
    fn test_result_reads_back_from_json() {
        let mut field_values = FieldMap::new();
        field_values.insert("shipment_no".to_string(), Some(FieldValue::from("SHP-001")));
        field_values.insert("shipping_cost".to_string(), Some(FieldValue::Number(120.0)));

        let result = MatchResult {
            run_id: "run-1".to_string(),
            template_instance_id: "inst-1".to_string(),
            preview: false,
            cancelled: false,
            total_documents: 1,
            processed_documents: 1,
            matched_documents: 1,
            skipped_documents: 0,
            failed_documents: 0,
            total_rows: 1,
            valid_rows: 1,
            invalid_rows: 0,
            instance_status: InstanceStatus::Completed,
            instance_stats: Some(InstanceStats {
                total_rows: 1,
                valid_rows: 1,
                invalid_rows: 0,
            }),
            resolved_from: vec![ResolvedSource {
                configuration_id: "cfg-1".to_string(),
                scope: MappingScope::Format,
                priority: 0,
                target_fields: vec!["shipping_cost".to_string()],
            }],
            results: vec![DocumentOutcome {
                document_id: "doc-1".to_string(),
                status: DocumentStatus::Matched,
                row_key: Some("SHP-001".to_string()),
                row_status: Some(RowStatus::Valid),
                error: None,
                field_errors: Vec::new(),
                conflicts: Vec::new(),
            }],
            rows: vec![RowSummary {
                row_id: "row-1".to_string(),
                row_key: "SHP-001".to_string(),
                status: RowStatus::Valid,
                source_document_ids: vec!["doc-1".to_string()],
                field_values,
                validation_errors: Vec::new(),
            }],
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"resolvedFrom\":[{\"configurationId\":\"cfg-1\",\"scope\":\"FORMAT\""));
        let parsed: MatchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}

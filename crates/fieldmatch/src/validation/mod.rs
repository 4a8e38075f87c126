//! Row validation against template field definitions.
//!
//! Validation never fails a run. It produces [`FieldError`]s that turn a row
//! INVALID while keeping it in the instance.

pub mod types;

use std::collections::BTreeMap;

use crate::template::model::{FieldError, RowStatus, TemplateField};
use crate::value::FieldMap;

pub use types::{check_type, parse_bool, parse_date};

/// Validates materialized row values for one template.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    fields: Vec<TemplateField>,
}

impl ValidationEngine {
    pub fn new(fields: Vec<TemplateField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    /// Checks required fields, declared types and pending field issues.
    ///
    /// Errors follow template field order; issues on fields the template does
    /// not define come last.
    pub fn validate(&self, values: &FieldMap, issues: &BTreeMap<String, String>) -> Vec<FieldError> {
        let mut errors = Vec::new();

        for field in &self.fields {
            if let Some(issue) = issues.get(&field.name) {
                errors.push(FieldError::new(&field.name, issue));
                continue;
            }

            match values.get(&field.name).and_then(Option::as_ref) {
                Some(value) if !value.is_blank() => {
                    if let Err(message) = check_type(field.field_type, value) {
                        errors.push(FieldError::new(&field.name, message));
                    }
                }
                _ if field.required => {
                    errors.push(FieldError::new(&field.name, "is required"));
                }
                _ => {}
            }
        }

        for (name, issue) in issues {
            if !self.fields.iter().any(|f| &f.name == name) {
                errors.push(FieldError::new(name, issue));
            }
        }

        errors
    }

    /// Row status implied by a set of validation errors.
    pub fn status_for(errors: &[FieldError]) -> RowStatus {
        if errors.is_empty() {
            RowStatus::Valid
        } else {
            RowStatus::Invalid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::model::FieldType;
    use crate::value::FieldValue;

    fn engine() -> ValidationEngine {
        ValidationEngine::new(vec![
            TemplateField::new("shipment_no", FieldType::Text).required(),
            TemplateField::new("shipping_cost", FieldType::Number).required(),
            TemplateField::new("eta", FieldType::Date),
            TemplateField::new("hazardous", FieldType::Boolean),
        ])
    }

    fn values(pairs: &[(&str, Option<FieldValue>)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_valid_row() {
        let row = values(&[
            ("shipment_no", Some("SHP-001".into())),
            ("shipping_cost", Some(FieldValue::Number(120.0))),
            ("eta", Some("2026-03-01".into())),
            ("hazardous", Some("no".into())),
            ("extra", Some("kept".into())),
        ]);
        let errors = engine().validate(&row, &BTreeMap::new());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(ValidationEngine::status_for(&errors), RowStatus::Valid);
    }

    #[test]
    fn test_required_null_and_blank() {
        let row = values(&[("shipment_no", Some("  ".into())), ("shipping_cost", None)]);
        let errors = engine().validate(&row, &BTreeMap::new());
        assert_eq!(
            errors,
            vec![
                FieldError::new("shipment_no", "is required"),
                FieldError::new("shipping_cost", "is required"),
            ]
        );
    }

    #[test]
    fn test_type_errors() {
        let row = values(&[
            ("shipment_no", Some("SHP-001".into())),
            ("shipping_cost", Some("lots".into())),
            ("eta", Some("soon".into())),
        ]);
        let errors = engine().validate(&row, &BTreeMap::new());
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["shipping_cost", "eta"]);
        assert_eq!(ValidationEngine::status_for(&errors), RowStatus::Invalid);
    }

    #[test]
    fn test_issues_become_errors() {
        let row = values(&[
            ("shipment_no", Some("SHP-001".into())),
            ("shipping_cost", None),
        ]);
        let mut issues = BTreeMap::new();
        issues.insert("shipping_cost".to_string(), "division by zero".to_string());
        issues.insert("unmapped".to_string(), "lookup failed".to_string());

        let errors = engine().validate(&row, &issues);
        assert_eq!(
            errors,
            vec![
                FieldError::new("shipping_cost", "division by zero"),
                FieldError::new("unmapped", "lookup failed"),
            ]
        );
    }
}

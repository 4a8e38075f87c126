//! Per-document field transformation for one run.
//!
//! A [`TransformPlan`] is built once from the resolved rule set and shared by
//! all workers. Turning a document into a row contribution is pure; nothing
//! here touches the store.

use std::collections::BTreeMap;

use crate::document::SourceDocument;
use crate::mapping::{MappingRule, ResolvedMappingConfig};
use crate::template::model::FieldError;
use crate::template::RowContribution;
use crate::transform::{Transform, TransformError};
use crate::value::{FieldMap, FieldValue};

/// A rule with its transform compiled up front. A rule whose parameters do
/// not compile yields a field issue for every document.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: MappingRule,
    pub transform: Result<Transform, TransformError>,
}

/// What one document contributes.
#[derive(Debug, Clone)]
pub enum DocumentTransform {
    Ready {
        contribution: RowContribution,
        field_errors: Vec<FieldError>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct TransformPlan {
    rules: Vec<CompiledRule>,
    row_key_field: String,
}

fn non_blank(value: Option<FieldValue>) -> Option<FieldValue> {
    value.filter(|v| !v.is_blank())
}

impl TransformPlan {
    pub fn new(resolved: &ResolvedMappingConfig, row_key_field: &str) -> Self {
        let rules = resolved
            .mappings
            .iter()
            .map(|rule| CompiledRule {
                rule: rule.clone(),
                transform: rule.compile(),
            })
            .collect();
        Self {
            rules,
            row_key_field: row_key_field.to_string(),
        }
    }

    pub fn row_key_field(&self) -> &str {
        &self.row_key_field
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Derives the row key: the document's own row-key field first, then the
    /// output of the rule that targets the row-key field.
    pub fn row_key(&self, document: &SourceDocument) -> Option<String> {
        let direct = document
            .fields
            .get(&self.row_key_field)
            .cloned()
            .flatten();

        let value = non_blank(direct).or_else(|| {
            let compiled = self
                .rules
                .iter()
                .find(|c| c.rule.target_field == self.row_key_field)?;
            let source = document
                .fields
                .get(&compiled.rule.source_field)
                .and_then(Option::as_ref);
            let transform = compiled.transform.as_ref().ok()?;
            non_blank(transform.apply(source, &document.fields).ok().flatten())
        })?;

        let key = value.as_text().trim().to_string();
        (!key.is_empty()).then_some(key)
    }

    /// Applies every rule to `document`.
    pub fn transform(&self, document: &SourceDocument) -> DocumentTransform {
        let Some(row_key) = self.row_key(document) else {
            return DocumentTransform::Skipped {
                reason: format!("row key field '{}' is missing or blank", self.row_key_field),
            };
        };

        let mut values = FieldMap::new();
        let mut issues = BTreeMap::new();
        let mut field_errors = Vec::new();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            let source = document
                .fields
                .get(&rule.source_field)
                .and_then(Option::as_ref);

            let result = compiled
                .transform
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|t| t.apply(source, &document.fields));

            match result {
                Ok(value) => {
                    let value = non_blank(value);
                    if value.is_none() && rule.required {
                        let message = format!("required source field '{}' is missing", rule.source_field);
                        issues.insert(rule.target_field.clone(), message.clone());
                        field_errors.push(FieldError::new(&rule.target_field, message));
                    }
                    values.insert(rule.target_field.clone(), value);
                }
                Err(e) => {
                    let message = e.to_string();
                    issues.insert(rule.target_field.clone(), message.clone());
                    field_errors.push(FieldError::new(&rule.target_field, message));
                    values.insert(rule.target_field.clone(), None);
                }
            }
        }

        issues.remove(&self.row_key_field);
        values.insert(
            self.row_key_field.clone(),
            Some(FieldValue::Text(row_key.clone())),
        );

        DocumentTransform::Ready {
            contribution: RowContribution {
                document_id: document.id.clone(),
                row_key,
                values,
                issues,
            },
            field_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{TransformParams, TransformType};
    use chrono::Utc;

    fn resolved(mappings: Vec<MappingRule>) -> ResolvedMappingConfig {
        ResolvedMappingConfig {
            template_id: "tpl".to_string(),
            company_id: None,
            format_id: None,
            mappings,
            resolved_from: Vec::new(),
            resolved_at: Utc::now(),
        }
    }

    fn document(id: &str, pairs: &[(&str, Option<FieldValue>)]) -> SourceDocument {
        SourceDocument {
            id: id.to_string(),
            company_id: None,
            format_id: None,
            fields: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    fn ready(output: DocumentTransform) -> (RowContribution, Vec<FieldError>) {
        match output {
            DocumentTransform::Ready {
                contribution,
                field_errors,
            } => (contribution, field_errors),
            other => panic!("expected a contribution, got {other:?}"),
        }
    }

    #[test]
    fn test_shipping_cost_formula() {
        let plan = TransformPlan::new(
            &resolved(vec![MappingRule::direct("sea_freight", "shipping_cost").with_transform(
                TransformType::Formula,
                TransformParams::formula("{sea_freight} + {thc}"),
            )]),
            "shipment_no",
        );
        let doc = document(
            "d1",
            &[
                ("shipment_no", Some("SHP-001".into())),
                ("sea_freight", Some("100".into())),
                ("thc", Some("20".into())),
            ],
        );

        let (contribution, errors) = ready(plan.transform(&doc));
        assert!(errors.is_empty());
        assert_eq!(contribution.row_key, "SHP-001");
        assert_eq!(contribution.values["shipment_no"], Some("SHP-001".into()));
        assert_eq!(contribution.values["shipping_cost"], Some(FieldValue::Number(120.0)));
    }

    #[test]
    fn test_row_key_from_mapped_source() {
        let plan = TransformPlan::new(
            &resolved(vec![MappingRule::direct("bl_no", "shipment_no")]),
            "shipment_no",
        );
        let doc = document("d1", &[("bl_no", Some(" BL-9 ".into()))]);
        assert_eq!(plan.row_key(&doc).as_deref(), Some("BL-9"));
    }

    #[test]
    fn test_numeric_row_key_is_canonical() {
        let plan = TransformPlan::new(&resolved(vec![]), "shipment_no");
        let doc = document("d1", &[("shipment_no", Some(FieldValue::Number(1001.0)))]);
        assert_eq!(plan.row_key(&doc).as_deref(), Some("1001"));
    }

    #[test]
    fn test_missing_row_key_skips() {
        let plan = TransformPlan::new(&resolved(vec![]), "shipment_no");
        let doc = document("d1", &[("shipment_no", Some("   ".into()))]);
        assert!(matches!(plan.transform(&doc), DocumentTransform::Skipped { .. }));
    }

    #[test]
    fn test_transform_failure_becomes_issue() {
        let plan = TransformPlan::new(
            &resolved(vec![MappingRule::direct("x", "ratio").with_transform(
                TransformType::Formula,
                TransformParams::formula("{a} / {b}"),
            )]),
            "shipment_no",
        );
        let doc = document("d1", &[("shipment_no", Some("S".into())), ("a", Some("1".into()))]);

        let (contribution, errors) = ready(plan.transform(&doc));
        assert_eq!(contribution.values["ratio"], None);
        assert!(contribution.issues["ratio"].contains("division by zero"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_uncompilable_rule_reports_every_document() {
        let plan = TransformPlan::new(
            &resolved(vec![MappingRule::direct("mode", "service_mode")
                .with_transform(TransformType::Lookup, TransformParams::default())]),
            "shipment_no",
        );
        let doc = document("d1", &[("shipment_no", Some("S".into())), ("mode", Some("CY".into()))]);
        let (contribution, _) = ready(plan.transform(&doc));
        assert!(contribution.issues.contains_key("service_mode"));
    }

    #[test]
    fn test_required_rule_miss_and_blank_values() {
        let plan = TransformPlan::new(
            &resolved(vec![
                MappingRule::direct("consignee", "consignee").required(),
                MappingRule::direct("remarks", "remarks"),
            ]),
            "shipment_no",
        );
        let doc = document(
            "d1",
            &[("shipment_no", Some("S".into())), ("remarks", Some("".into()))],
        );
        let (contribution, errors) = ready(plan.transform(&doc));
        assert_eq!(contribution.values["remarks"], None);
        assert!(contribution.issues.contains_key("consignee"));
        assert_eq!(errors[0].field, "consignee");
    }
}

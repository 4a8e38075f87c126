//! Field transforms: DIRECT copy, FORMULA arithmetic and LOOKUP substitution.
//!
//! Rules persist their transform as a `transformType` tag plus a loose
//! `transformParams` object. [`Transform::compile`] turns that pair into a
//! typed, validated transform; it runs when a configuration is saved and
//! again before a match run uses the rule.

pub mod error;
pub mod formula;
pub mod lookup;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{FieldMap, FieldValue};

pub use error::TransformError;
pub use formula::Formula;
pub use lookup::LookupTable;

/// Transform discriminant as stored on a mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformType {
    #[default]
    Direct,
    Formula,
    Lookup,
}

impl TransformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformType::Direct => "DIRECT",
            TransformType::Formula => "FORMULA",
            TransformType::Lookup => "LOOKUP",
        }
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped transform parameters as they appear in configuration documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_table: Option<BTreeMap<String, FieldValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
}

impl TransformParams {
    pub fn formula(formula: impl Into<String>) -> Self {
        Self {
            formula: Some(formula.into()),
            ..Default::default()
        }
    }

    pub fn lookup(table: BTreeMap<String, FieldValue>, default_value: Option<FieldValue>) -> Self {
        Self {
            lookup_table: Some(table),
            default_value,
            ..Default::default()
        }
    }
}

/// A compiled transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Direct,
    Formula(Formula),
    Lookup(LookupTable),
}

impl Transform {
    /// Validates `params` against `transform_type` and builds the transform.
    pub fn compile(
        transform_type: TransformType,
        params: &TransformParams,
    ) -> Result<Self, TransformError> {
        match transform_type {
            TransformType::Direct => Ok(Transform::Direct),
            TransformType::Formula => {
                let source = params.formula.as_deref().unwrap_or_default();
                Ok(Transform::Formula(Formula::parse(source)?))
            }
            TransformType::Lookup => {
                let entries = params
                    .lookup_table
                    .clone()
                    .filter(|table| !table.is_empty())
                    .ok_or_else(|| TransformError::InvalidParams {
                        transform_type: "LOOKUP",
                        reason: "lookupTable must contain at least one entry".to_string(),
                    })?;
                Ok(Transform::Lookup(LookupTable::new(
                    entries,
                    params.default_value.clone(),
                )))
            }
        }
    }

    pub fn transform_type(&self) -> TransformType {
        match self {
            Transform::Direct => TransformType::Direct,
            Transform::Formula(_) => TransformType::Formula,
            Transform::Lookup(_) => TransformType::Lookup,
        }
    }

    /// Applies the transform to a source value. `context` is the full field
    /// set of the document, used by formula placeholders.
    pub fn apply(
        &self,
        value: Option<&FieldValue>,
        context: &FieldMap,
    ) -> Result<Option<FieldValue>, TransformError> {
        match self {
            Transform::Direct => Ok(value.cloned()),
            Transform::Formula(formula) => {
                formula.evaluate(context).map(|n| Some(FieldValue::Number(n)))
            }
            Transform::Lookup(table) => Ok(table.apply(value)),
        }
    }
}

/// Compiles and applies a transform in one step.
pub fn execute(
    value: Option<&FieldValue>,
    transform_type: TransformType,
    params: &TransformParams,
    context: &FieldMap,
) -> Result<Option<FieldValue>, TransformError> {
    Transform::compile(transform_type, params)?.apply(value, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_returns_value_unchanged() {
        let ctx = FieldMap::new();
        let value = FieldValue::from("SHP-001");
        let out = execute(Some(&value), TransformType::Direct, &TransformParams::default(), &ctx);
        assert_eq!(out.unwrap(), Some(value));

        let out = execute(None, TransformType::Direct, &TransformParams::default(), &ctx);
        assert_eq!(out.unwrap(), None);
    }

    #[test]
    fn test_formula_dispatch() {
        let mut ctx = FieldMap::new();
        ctx.insert("sea_freight".into(), Some("100".into()));
        ctx.insert("thc".into(), Some("20".into()));
        let params = TransformParams::formula("{sea_freight} + {thc}");
        let out = execute(None, TransformType::Formula, &params, &ctx).unwrap();
        assert_eq!(out, Some(FieldValue::Number(120.0)));
    }

    #[test]
    fn test_formula_missing_param() {
        let err = Transform::compile(TransformType::Formula, &TransformParams::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidParams { .. }));
    }

    #[test]
    fn test_lookup_requires_table() {
        let err = Transform::compile(TransformType::Lookup, &TransformParams::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidParams { .. }));

        let empty = TransformParams::lookup(BTreeMap::new(), None);
        assert!(Transform::compile(TransformType::Lookup, &empty).is_err());
    }

    #[test]
    fn test_params_deserialize_camel_case() {
        let params: TransformParams = serde_json::from_str(
            r#"{"lookupTable": {"CY": "Container Yard"}, "defaultValue": "Other"}"#,
        )
        .unwrap();
        assert_eq!(params.default_value, Some("Other".into()));
        assert_eq!(params.lookup_table.unwrap().len(), 1);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let mut ctx = FieldMap::new();
        ctx.insert("a".into(), Some("5".into()));
        let before = ctx.clone();
        let params = TransformParams::formula("{a} * 2");
        execute(ctx["a"].as_ref(), TransformType::Formula, &params, &ctx).unwrap();
        assert_eq!(ctx, before);
    }
}

//! Table-driven tests for the public transform entry point.

use std::collections::BTreeMap;

use fieldmatch::transform::execute;
use fieldmatch::{FieldMap, FieldValue, TransformError, TransformParams, TransformType};

struct TransformTestCase {
    name: &'static str,
    value: Option<FieldValue>,
    transform_type: TransformType,
    params: fn() -> TransformParams,
    expected: Result<Option<FieldValue>, fn(&TransformError) -> bool>,
}

fn service_modes(default_value: Option<&str>) -> TransformParams {
    let mut table = BTreeMap::new();
    table.insert("CY".to_string(), FieldValue::from("Container Yard"));
    table.insert("CFS".to_string(), FieldValue::from("Container Freight Station"));
    TransformParams::lookup(table, default_value.map(FieldValue::from))
}

fn is_formula_error(err: &TransformError) -> bool {
    matches!(err, TransformError::FormulaEvaluation(_))
}

fn is_invalid_params(err: &TransformError) -> bool {
    matches!(err, TransformError::InvalidParams { .. })
}

fn transform_tests() -> Vec<TransformTestCase> {
    vec![
        TransformTestCase {
            name: "direct_copies_value",
            value: Some(FieldValue::Number(7.5)),
            transform_type: TransformType::Direct,
            params: TransformParams::default,
            expected: Ok(Some(FieldValue::Number(7.5))),
        },
        TransformTestCase {
            name: "direct_keeps_null",
            value: None,
            transform_type: TransformType::Direct,
            params: TransformParams::default,
            expected: Ok(None),
        },
        TransformTestCase {
            name: "formula_sums_context",
            value: None,
            transform_type: TransformType::Formula,
            params: || TransformParams::formula("{sea_freight} + {thc} * 2"),
            expected: Ok(Some(FieldValue::Number(140.0))),
        },
        TransformTestCase {
            name: "formula_rejects_statement_separator",
            value: None,
            transform_type: TransformType::Formula,
            params: || TransformParams::formula("{thc}; 1"),
            expected: Err(is_formula_error),
        },
        TransformTestCase {
            name: "formula_rejects_identifiers",
            value: None,
            transform_type: TransformType::Formula,
            params: || TransformParams::formula("import os"),
            expected: Err(is_formula_error),
        },
        TransformTestCase {
            name: "formula_rejects_backticks",
            value: None,
            transform_type: TransformType::Formula,
            params: || TransformParams::formula("`whoami`"),
            expected: Err(is_formula_error),
        },
        TransformTestCase {
            name: "formula_without_expression",
            value: None,
            transform_type: TransformType::Formula,
            params: TransformParams::default,
            expected: Err(is_invalid_params),
        },
        TransformTestCase {
            name: "lookup_hit",
            value: Some(FieldValue::Text("CY".to_string())),
            transform_type: TransformType::Lookup,
            params: || service_modes(None),
            expected: Ok(Some(FieldValue::Text("Container Yard".to_string()))),
        },
        TransformTestCase {
            name: "lookup_hit_after_trim",
            value: Some(FieldValue::Text(" CFS ".to_string())),
            transform_type: TransformType::Lookup,
            params: || service_modes(None),
            expected: Ok(Some(FieldValue::Text(
                "Container Freight Station".to_string(),
            ))),
        },
        TransformTestCase {
            name: "lookup_miss_uses_default",
            value: Some(FieldValue::Text("DOOR".to_string())),
            transform_type: TransformType::Lookup,
            params: || service_modes(Some("Other")),
            expected: Ok(Some(FieldValue::Text("Other".to_string()))),
        },
        TransformTestCase {
            name: "lookup_miss_passes_through",
            value: Some(FieldValue::Text("DOOR".to_string())),
            transform_type: TransformType::Lookup,
            params: || service_modes(None),
            expected: Ok(Some(FieldValue::Text("DOOR".to_string()))),
        },
        TransformTestCase {
            name: "lookup_null_uses_default",
            value: None,
            transform_type: TransformType::Lookup,
            params: || service_modes(Some("Other")),
            expected: Ok(Some(FieldValue::Text("Other".to_string()))),
        },
        TransformTestCase {
            name: "lookup_null_without_default",
            value: None,
            transform_type: TransformType::Lookup,
            params: || service_modes(None),
            expected: Ok(None),
        },
        TransformTestCase {
            name: "lookup_without_table",
            value: Some(FieldValue::Text("CY".to_string())),
            transform_type: TransformType::Lookup,
            params: TransformParams::default,
            expected: Err(is_invalid_params),
        },
    ]
}

#[test]
fn test_transforms() {
    let mut context = FieldMap::new();
    context.insert("sea_freight".to_string(), Some(FieldValue::from("100")));
    context.insert("thc".to_string(), Some(FieldValue::Number(20.0)));

    for case in transform_tests() {
        let actual = execute(
            case.value.as_ref(),
            case.transform_type,
            &(case.params)(),
            &context,
        );

        match (&case.expected, actual) {
            (Ok(expected), Ok(actual)) => {
                assert_eq!(&actual, expected, "Test '{}'", case.name)
            }
            (Err(check), Err(err)) => {
                assert!(check(&err), "Test '{}': unexpected error {err:?}", case.name)
            }
            (expected, actual) => panic!(
                "Test '{}': expected {}, got {actual:?}",
                case.name,
                if expected.is_ok() { "a value" } else { "an error" }
            ),
        }
    }
}

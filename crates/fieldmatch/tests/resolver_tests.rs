//! Table-driven tests for scope precedence, priorities and the resolver cache.

mod common;

use std::sync::Arc;

use common::{company, direct, format, global, TestHarness};
use fieldmatch::mapping::{ConfigurationError, ResolveKey};
use fieldmatch::{MappingConfigInput, MappingScope, StoreError};

/// One resolution scenario: configurations to save, the refs to resolve
/// with, and the source field expected to win for target `x`.
struct ResolveTestCase {
    name: &'static str,
    configs: fn() -> Vec<MappingConfigInput>,
    company_id: Option<&'static str>,
    format_id: Option<&'static str>,
    expected_source: &'static str,
}

const PRECEDENCE_TESTS: &[ResolveTestCase] = &[
    ResolveTestCase {
        name: "global_only",
        configs: || vec![global("tpl").rule(direct("g", "x"))],
        company_id: Some("acme"),
        format_id: Some("fmt-1"),
        expected_source: "g",
    },
    ResolveTestCase {
        name: "format_beats_global",
        configs: || {
            vec![
                global("tpl").rule(direct("g", "x")),
                format("tpl", "fmt-1").rule(direct("f", "x")),
            ]
        },
        company_id: None,
        format_id: Some("fmt-1"),
        expected_source: "f",
    },
    ResolveTestCase {
        name: "company_beats_global",
        configs: || {
            vec![
                global("tpl").rule(direct("g", "x")).priority(100),
                company("tpl", "acme").rule(direct("c", "x")),
            ]
        },
        company_id: Some("acme"),
        format_id: None,
        expected_source: "c",
    },
    ResolveTestCase {
        name: "format_beats_company",
        configs: || {
            vec![
                company("tpl", "acme").rule(direct("c", "x")).priority(100),
                format("tpl", "fmt-1").rule(direct("f", "x")),
            ]
        },
        company_id: Some("acme"),
        format_id: Some("fmt-1"),
        expected_source: "f",
    },
    ResolveTestCase {
        name: "other_company_ignored",
        configs: || {
            vec![
                global("tpl").rule(direct("g", "x")),
                company("tpl", "globex").rule(direct("c", "x")),
            ]
        },
        company_id: Some("acme"),
        format_id: None,
        expected_source: "g",
    },
    ResolveTestCase {
        name: "other_format_ignored",
        configs: || {
            vec![
                global("tpl").rule(direct("g", "x")),
                format("tpl", "fmt-2").rule(direct("f", "x")),
            ]
        },
        company_id: None,
        format_id: Some("fmt-1"),
        expected_source: "g",
    },
    ResolveTestCase {
        name: "company_specific_format_needs_matching_company",
        configs: || {
            vec![
                global("tpl").rule(direct("g", "x")),
                format("tpl", "fmt-1").company("globex").rule(direct("f", "x")),
            ]
        },
        company_id: Some("acme"),
        format_id: Some("fmt-1"),
        expected_source: "g",
    },
    ResolveTestCase {
        name: "higher_priority_wins_within_scope",
        configs: || {
            vec![
                format("tpl", "fmt-1").priority(10).rule(direct("high", "x")),
                format("tpl", "fmt-1").company("acme").priority(5).rule(direct("low", "x")),
            ]
        },
        company_id: Some("acme"),
        format_id: Some("fmt-1"),
        expected_source: "high",
    },
    ResolveTestCase {
        name: "higher_priority_wins_within_scope_swapped",
        configs: || {
            vec![
                format("tpl", "fmt-1").priority(5).rule(direct("low", "x")),
                format("tpl", "fmt-1").company("acme").priority(10).rule(direct("high", "x")),
            ]
        },
        company_id: Some("acme"),
        format_id: Some("fmt-1"),
        expected_source: "high",
    },
];

#[test]
fn test_scope_precedence() {
    for case in PRECEDENCE_TESTS {
        let harness = TestHarness::new();
        for input in (case.configs)() {
            harness.config(input);
        }

        let resolved = harness
            .app
            .engine
            .resolve_mapping("tpl", case.company_id, case.format_id)
            .unwrap();

        let rule = resolved
            .rule_for("x")
            .unwrap_or_else(|| panic!("Test '{}': no rule for x", case.name));
        assert_eq!(
            rule.source_field, case.expected_source,
            "Test '{}': expected source '{}', got '{}'",
            case.name, case.expected_source, rule.source_field
        );
        assert_eq!(
            resolved.mappings.len(),
            1,
            "Test '{}': one rule per target field",
            case.name
        );
    }
}

#[test]
fn test_non_overlapping_rules_are_combined() {
    let harness = TestHarness::new();
    let global_config = harness.config(
        global("tpl")
            .rule(direct("bl_no", "shipment_no").with_order(0))
            .rule(direct("port_code", "port").with_order(2)),
    );
    let format_config = harness.config(
        format("tpl", "fmt-1")
            .rule(direct("gross_wt", "weight").with_order(1))
            .rule(direct("pol", "port").with_order(2)),
    );

    let resolved = harness
        .app
        .engine
        .resolve_mapping("tpl", None, Some("fmt-1"))
        .unwrap();

    let targets: Vec<_> = resolved
        .mappings
        .iter()
        .map(|r| r.target_field.as_str())
        .collect();
    assert_eq!(targets, vec!["shipment_no", "weight", "port"]);
    assert_eq!(resolved.rule_for("port").unwrap().source_field, "pol");

    assert_eq!(resolved.resolved_from.len(), 2);
    assert_eq!(resolved.resolved_from[0].configuration_id, format_config.id);
    assert_eq!(resolved.resolved_from[0].scope, MappingScope::Format);
    assert_eq!(resolved.resolved_from[1].configuration_id, global_config.id);
    assert_eq!(
        resolved.source_of("port").unwrap().configuration_id,
        format_config.id
    );
    assert_eq!(
        resolved.source_of("shipment_no").unwrap().configuration_id,
        global_config.id
    );
}

#[test]
fn test_inactive_configuration_is_ignored() {
    let harness = TestHarness::new();
    harness.config(global("tpl").rule(direct("g", "x")));
    let format_config = harness.config(format("tpl", "fmt-1").rule(direct("f", "x")));

    harness.app.configs.deactivate(&format_config.id).unwrap();
    let resolved = harness
        .app
        .engine
        .resolve_mapping("tpl", None, Some("fmt-1"))
        .unwrap();
    assert_eq!(resolved.rule_for("x").unwrap().source_field, "g");

    harness.app.configs.activate(&format_config.id).unwrap();
    let resolved = harness
        .app
        .engine
        .resolve_mapping("tpl", None, Some("fmt-1"))
        .unwrap();
    assert_eq!(resolved.rule_for("x").unwrap().source_field, "f");
}

#[test]
fn test_no_configuration_resolves_empty() {
    let harness = TestHarness::new();
    let resolved = harness
        .app
        .engine
        .resolve_mapping("unknown", None, None)
        .unwrap();
    assert!(resolved.mappings.is_empty());
    assert!(resolved.resolved_from.is_empty());
}

#[test]
fn test_second_resolve_is_served_from_cache() {
    let harness = TestHarness::new();
    harness.config(global("tpl").rule(direct("g", "x")));
    let key = ResolveKey::new("tpl", Some("acme"), None);

    let first = harness
        .app
        .engine
        .resolve_mapping("tpl", Some("acme"), None)
        .unwrap();
    assert!(harness.app.configs.cache().contains(&key));

    let second = harness
        .app
        .engine
        .resolve_mapping("tpl", Some("acme"), None)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_saving_configuration_invalidates_cache() {
    let harness = TestHarness::new();
    harness.config(global("tpl").rule(direct("g", "x")));
    let key = ResolveKey::new("tpl", Some("acme"), None);

    let before = harness
        .app
        .engine
        .resolve_mapping("tpl", Some("acme"), None)
        .unwrap();
    assert_eq!(before.rule_for("x").unwrap().source_field, "g");

    harness.config(company("tpl", "acme").rule(direct("c", "x")));
    assert!(!harness.app.configs.cache().contains(&key));

    let after = harness
        .app
        .engine
        .resolve_mapping("tpl", Some("acme"), None)
        .unwrap();
    assert_eq!(after.rule_for("x").unwrap().source_field, "c");
}

#[test]
fn test_other_templates_stay_cached() {
    let harness = TestHarness::new();
    harness.config(global("a").rule(direct("g", "x")));
    harness.config(global("b").rule(direct("g", "x")));

    harness.app.engine.resolve_mapping("a", None, None).unwrap();
    harness.app.engine.resolve_mapping("b", None, None).unwrap();

    harness.config(company("a", "acme").rule(direct("c", "x")));
    assert!(!harness
        .app
        .configs
        .cache()
        .contains(&ResolveKey::new("a", None, None)));
    assert!(harness
        .app
        .configs
        .cache()
        .contains(&ResolveKey::new("b", None, None)));
}

#[test]
fn test_duplicate_scope_key_is_rejected() {
    let harness = TestHarness::new();
    let first = harness.config(company("tpl", "acme").rule(direct("a", "x")));

    let err = harness
        .app
        .configs
        .create(company("tpl", "acme").rule(direct("b", "x")))
        .unwrap_err();
    match err {
        StoreError::Configuration(ConfigurationError::DuplicateConfiguration {
            existing_id, ..
        }) => assert_eq!(existing_id, first.id),
        other => panic!("expected duplicate configuration, got {other:?}"),
    }
}

#[test]
fn test_invalid_configuration_is_rejected_at_save() {
    let harness = TestHarness::new();

    let missing_company = MappingConfigInput::new("tpl", MappingScope::Company).rule(direct("a", "x"));
    assert!(matches!(
        harness.app.configs.create(missing_company),
        Err(StoreError::Configuration(_))
    ));

    let bad_formula = global("tpl").rule(common::formula("a", "x", "{a} + import"));
    assert!(matches!(
        harness.app.configs.create(bad_formula),
        Err(StoreError::Configuration(_))
    ));

    let duplicate_target = global("tpl")
        .rule(direct("a", "x"))
        .rule(direct("b", "x"));
    assert!(matches!(
        harness.app.configs.create(duplicate_target),
        Err(StoreError::Configuration(_))
    ));
}

#[test]
fn test_updates_racing_resolutions_leave_no_stale_entry() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let harness = TestHarness::new();
    let config = harness.config(global("tpl").rule(direct("v0", "x")));
    let engine = &harness.app.engine;
    let done = AtomicBool::new(false);

    let observed = std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    engine.resolve_mapping("tpl", Some("acme"), None).unwrap();
                }
            });
        }

        let mut observed = Vec::new();
        for n in 1..=25 {
            let source = format!("v{n}");
            let updated = harness
                .app
                .configs
                .update(&config.id, global("tpl").rule(direct(&source, "x")));
            let resolved = engine.resolve_mapping("tpl", Some("acme"), None);
            observed.push((source, updated.is_ok(), resolved));
        }
        done.store(true, Ordering::Release);
        observed
    });

    for (source, updated, resolved) in observed {
        assert!(updated, "update to {source} failed");
        let resolved = resolved.unwrap();
        assert_eq!(resolved.rule_for("x").unwrap().source_field, source);
    }

    let resolved = engine.resolve_mapping("tpl", Some("acme"), None).unwrap();
    assert_eq!(resolved.rule_for("x").unwrap().source_field, "v25");
}

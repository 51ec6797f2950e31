//! End-to-end panel validation tests.
//!
//! Builds a complete schema tree on disk (base definition, generator, shared
//! query sub-types, chart plugins), reloads the registry, and validates
//! panel batches against it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashboard_schemas::{PanelValidator, SchemaError, SchemaRegistry, SchemasConfig};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn schema_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "base.cue",
        r#"package panel

kind: string
display: {
    name: string
}
options: _
"#,
    );

    write(
        root,
        "generator.cue",
        r#"package panel

#anyQuery: #CustomGraphQuery | #SQLGraphQuery

options: {
    queries?: [...#anyQuery]
    query?: #anyQuery
    ...
}
"#,
    );

    write(
        root,
        "queries/custom_graph.cue",
        r#"package panel

#CustomGraphQuery: {
    kind: "CustomGraphQuery"
    options: {
        custom: bool
    }
}
"#,
    );

    write(
        root,
        "queries/sql_graph.cue",
        r#"package panel

#SQLGraphQuery: {
    kind: "SQLGraphQuery"
    options: {
        select: string
        from: string
        where: string
    }
}
"#,
    );

    // AwesomeChart leaves `options` wide open; the generator still
    // constrains `options.queries` when present.
    write(
        root,
        "charts/awesomechart/schema.cue",
        r#"package panel

kind: "AwesomeChart"
"#,
    );

    write(
        root,
        "charts/averagechart/schema.cue",
        r#"package panel

kind: "AverageChart"
options: {
    a: string
    b: _
    ...
}
"#,
    );

    dir
}

fn validator_for(dir: &TempDir) -> PanelValidator {
    let registry = Arc::new(SchemaRegistry::new(SchemasConfig::new(dir.path())));
    registry.reload();
    PanelValidator::new(registry)
}

fn batch(entries: &[(&str, &str)]) -> HashMap<String, Vec<u8>> {
    entries
        .iter()
        .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
        .collect()
}

const AWESOME_PANEL: &str = r#"{
    "kind": "AwesomeChart",
    "display": {"name": "simple awesome chart"},
    "datasource": {"kind": "CustomDatasource", "key": "MyCustomDatasource"},
    "options": {
        "a": "yes",
        "b": {"c": [{"e": "up", "f": "the up metric"}]},
        "queries": [
            {"kind": "CustomGraphQuery", "options": {"custom": true}},
            {"kind": "CustomGraphQuery", "options": {"custom": false}}
        ]
    }
}"#;

const AVERAGE_PANEL: &str = r#"{
    "kind": "AverageChart",
    "display": {"name": "simple average chart"},
    "options": {
        "a": "yes",
        "b": {"c": false},
        "query": {
            "kind": "SQLGraphQuery",
            "options": {"select": "*", "from": "TABLE", "where": "ID > 0"}
        }
    }
}"#;

#[test]
fn test_valid_panels_pass() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[
        ("MyAwesomePanel", AWESOME_PANEL),
        ("MyAveragePanel", AVERAGE_PANEL),
    ]);
    validator.validate(&panels).unwrap();
}

#[test]
fn test_minimal_panel_passes() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[(
        "Minimal",
        r#"{"kind": "AwesomeChart", "display": {"name": "x"}, "options": {}}"#,
    )]);
    validator.validate(&panels).unwrap();
}

#[test]
fn test_disallowed_display_field_is_violation() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[(
        "MyInvalidPanel",
        r#"{"kind": "AwesomeChart", "display": {"aaaaaa": "x"}, "options": {}}"#,
    )]);
    let err = validator.validate(&panels).unwrap_err();
    let SchemaError::SchemaViolation { name, kind, .. } = &err else {
        panic!("expected schema violation, got {err}");
    };
    assert_eq!(name, "MyInvalidPanel");
    assert_eq!(kind, "AwesomeChart");
    assert!(err.to_string().contains("field not allowed: aaaaaa"));
}

#[test]
fn test_unknown_kind() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[("GhostPanel", r#"{"kind": "Ghost"}"#)]);
    let err = validator.validate(&panels).unwrap_err();
    let SchemaError::UnknownKind { name, kind } = &err else {
        panic!("expected unknown kind, got {err}");
    };
    assert_eq!(name, "GhostPanel");
    assert_eq!(kind, "Ghost");
    assert_eq!(
        err.to_string(),
        "invalid panel GhostPanel: unknown kind Ghost"
    );
}

#[test]
fn test_empty_kind_is_unknown() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[("Blank", r#"{"kind": "", "options": {}}"#)]);
    let err = validator.validate(&panels).unwrap_err();
    let SchemaError::UnknownKind { name, kind } = &err else {
        panic!("expected unknown kind, got {err}");
    };
    assert_eq!(name, "Blank");
    assert_eq!(kind, "");
}

#[test]
fn test_missing_kind_is_invalid_panel() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[("NoKind", r#"{"display": {"name": "x"}}"#)]);
    let err = validator.validate(&panels).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidPanel { .. }));
}

#[test]
fn test_unparseable_panel_is_invalid_panel() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[("Garbage", "{not json at all")]);
    let err = validator.validate(&panels).unwrap_err();
    let SchemaError::InvalidPanel { name, .. } = &err else {
        panic!("expected invalid panel, got {err}");
    };
    assert_eq!(name, "Garbage");
}

#[test]
fn test_fail_fast_batch_reports_the_invalid_panel() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[
        ("MyAveragePanel", AVERAGE_PANEL),
        (
            "MyInvalidPanel",
            r#"{"kind": "AwesomeChart", "display": {"aaaaaa": "x"}, "options": {}}"#,
        ),
    ]);
    // Whatever the iteration order, the valid sibling never produces an
    // error: the reported failure always names the invalid panel.
    let err = validator.validate(&panels).unwrap_err();
    assert!(err.to_string().contains("MyInvalidPanel"));
}

#[test]
fn test_query_matching_no_disjunct_fails() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[(
        "MyAveragePanel",
        r#"{
            "kind": "AverageChart",
            "display": {"name": "avg"},
            "options": {
                "a": "yes",
                "b": 1,
                "query": {
                    "kind": "SQUALGraphQuery",
                    "options": {"select": "*", "from": "TABLE", "where": "ID < 100"}
                }
            }
        }"#,
    )]);
    let err = validator.validate(&panels).unwrap_err();
    let SchemaError::SchemaViolation { kind, .. } = &err else {
        panic!("expected schema violation, got {err}");
    };
    assert_eq!(kind, "AverageChart");
    assert!(err.to_string().contains("2 errors in empty disjunction"));
}

#[test]
fn test_query_matching_one_disjunct_passes() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    let panels = batch(&[(
        "P",
        r#"{
            "kind": "AwesomeChart",
            "display": {"name": "x"},
            "options": {"queries": [{"kind": "SQLGraphQuery",
                "options": {"select": "*", "from": "T", "where": "1"}}]}
        }"#,
    )]);
    validator.validate(&panels).unwrap();
}

#[test]
fn test_abstract_field_left_unresolved_fails_concreteness() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    // Shape matches #CustomGraphQuery but `options.custom` is never given a
    // concrete value.
    let panels = batch(&[(
        "P",
        r#"{
            "kind": "AwesomeChart",
            "display": {"name": "x"},
            "options": {"queries": [{"kind": "CustomGraphQuery", "options": {}}]}
        }"#,
    )]);
    let err = validator.validate(&panels).unwrap_err();
    assert!(err.to_string().contains("incomplete value"));
}

#[test]
fn test_reload_is_idempotent_for_validation() {
    let dir = schema_tree();
    let registry = Arc::new(SchemaRegistry::new(SchemasConfig::new(dir.path())));
    registry.reload();
    let kinds = registry.kinds();
    registry.reload();
    assert_eq!(registry.kinds(), kinds);

    let validator = PanelValidator::new(registry);
    let panels = batch(&[("MyAwesomePanel", AWESOME_PANEL)]);
    validator.validate(&panels).unwrap();
}

#[test]
fn test_duplicate_kind_second_plugin_dropped() {
    let dir = schema_tree();
    write(
        dir.path(),
        "charts/aadup/schema.cue",
        "package panel\n\nkind: \"Dup\"\noptions: {source: \"aaa\", ...}\n",
    );
    write(
        dir.path(),
        "charts/zzdup/schema.cue",
        "package panel\n\nkind: \"Dup\"\noptions: {source: \"zzz\", ...}\n",
    );
    let registry = Arc::new(SchemaRegistry::new(SchemasConfig::new(dir.path())));
    registry.reload();
    assert_eq!(
        registry.kinds(),
        vec!["AverageChart", "AwesomeChart", "Dup"]
    );

    // Only the first plugin in traversal order survives: a document carrying
    // the second plugin's marker is rejected.
    let validator = PanelValidator::new(registry);
    let good = batch(&[(
        "P",
        r#"{"kind": "Dup", "display": {"name": "x"}, "options": {"source": "aaa"}}"#,
    )]);
    validator.validate(&good).unwrap();

    let bad = batch(&[(
        "P",
        r#"{"kind": "Dup", "display": {"name": "x"}, "options": {"source": "zzz"}}"#,
    )]);
    let err = validator.validate(&bad).unwrap_err();
    assert!(matches!(err, SchemaError::SchemaViolation { .. }));
}

#[test]
fn test_extra_top_level_fields_are_allowed() {
    let dir = schema_tree();
    let validator = validator_for(&dir);
    // `datasource` is not declared by any fragment; the schema root is open.
    let panels = batch(&[(
        "P",
        r#"{
            "kind": "AwesomeChart",
            "display": {"name": "x"},
            "datasource": {"kind": "SQLDatasource"},
            "options": {}
        }"#,
    )]);
    validator.validate(&panels).unwrap();
}

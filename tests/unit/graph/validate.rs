use super::*;

use serde_json::json;

fn identity() -> Value {
    json!([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0]
    ])
}

fn unsolved() -> Value {
    json!([
        [null, null, null, null],
        [null, null, null, null],
        [null, null, null, null],
        [null, null, null, null]
    ])
}

fn snapshot(local: Value) -> Value {
    json!({
        "edges": {"0": {"1": {"type": "rigid-known", "noise": 0.5}}},
        "local_transforms": {"0": {"1": {"0": local}}},
        "world_transforms": {"0": {"0": identity()}}
    })
}

#[test]
fn empty_mappings_are_valid() {
    let state = validate(&json!({
        "edges": {},
        "local_transforms": {},
        "world_transforms": {}
    }))
    .unwrap();
    assert!(state.is_empty());
}

#[test]
fn valid_snapshot_builds_typed_state() {
    let state = validate(&snapshot(identity())).unwrap();
    let edge = state.edge(NodeId(0), NodeId(1)).unwrap();
    assert_eq!(edge.kind, EdgeKind::RigidKnown);
    assert_eq!(edge.noise, Some(0.5));
    assert_eq!(
        state.local_transform(NodeId(0), NodeId(1), FrameIndex(0)),
        Some(&Transform::Solved(Matrix4::IDENTITY))
    );
    assert_eq!(
        state.world_transform(NodeId(0), FrameIndex(0)),
        Some(&Matrix4::IDENTITY)
    );
}

#[test]
fn all_null_local_transform_is_unsolved() {
    let state = validate(&snapshot(unsolved())).unwrap();
    assert_eq!(
        state.local_transform(NodeId(0), NodeId(1), FrameIndex(0)),
        Some(&Transform::Unsolved)
    );
}

#[test]
fn unknown_top_level_keys_are_ignored() {
    let mut doc = snapshot(identity());
    doc["meta"] = json!({"producer": "estimator"});
    assert!(validate(&doc).is_ok());
}

#[test]
fn root_must_be_object() {
    let errs = validate(&json!([1, 2, 3])).unwrap_err();
    assert_eq!(errs.errors.len(), 1);
    assert_eq!(errs.errors[0].rule, SchemaRule::NotAnObject);
    assert_eq!(errs.errors[0].path_string(), "<root>");
}

#[test]
fn missing_mappings_are_all_reported() {
    let errs = validate(&json!({"edges": {}})).unwrap_err();
    assert_eq!(errs.errors.len(), 2);
    assert!(errs.errors.iter().all(|e| e.rule == SchemaRule::MissingField));
    assert!(errs.at_path("local_transforms").is_some());
    assert!(errs.at_path("world_transforms").is_some());
}

#[test]
fn mapping_that_is_not_an_object_is_rejected() {
    let errs = validate(&json!({
        "edges": [],
        "local_transforms": {},
        "world_transforms": {}
    }))
    .unwrap_err();
    assert_eq!(errs.at_path("edges").unwrap().rule, SchemaRule::NotAnObject);
}

#[test]
fn mixed_local_transform_is_rejected_at_its_path() {
    let mut m = identity();
    m[2][3] = Value::Null;
    let errs = validate(&snapshot(m)).unwrap_err();
    assert_eq!(errs.errors.len(), 1);
    let e = errs.at_path("local_transforms.0.1.0").unwrap();
    assert_eq!(e.rule, SchemaRule::MixedTransform);
    assert!(e.message.contains("15 numeric and 1 null"));
}

#[test]
fn wrong_row_count_is_a_shape_error() {
    let errs = validate(&snapshot(json!([[1.0, 0.0, 0.0, 0.0]]))).unwrap_err();
    assert!(errs.has_rule(SchemaRule::MatrixShape));
    assert!(errs.at_path("local_transforms.0.1.0").is_some());
}

#[test]
fn short_row_is_reported_per_row() {
    let mut m = identity();
    m[1] = json!([0.0, 1.0, 0.0]);
    m[3] = json!("row");
    let errs = validate(&snapshot(m)).unwrap_err();
    assert_eq!(errs.errors.len(), 2);
    assert_eq!(
        errs.at_path("local_transforms.0.1.0[1]").unwrap().rule,
        SchemaRule::MatrixShape
    );
    assert_eq!(
        errs.at_path("local_transforms.0.1.0[3]").unwrap().rule,
        SchemaRule::MatrixShape
    );
}

#[test]
fn non_numeric_entry_is_reported_at_its_cell() {
    let mut m = identity();
    m[0][2] = json!("x");
    let errs = validate(&snapshot(m)).unwrap_err();
    let e = errs.at_path("local_transforms.0.1.0[0][2]").unwrap();
    assert_eq!(e.rule, SchemaRule::InvalidEntry);
    assert!(!errs.has_rule(SchemaRule::MixedTransform));
}

#[test]
fn unsolved_world_transform_is_rejected() {
    let mut doc = snapshot(identity());
    doc["world_transforms"]["0"]["0"] = unsolved();
    let errs = validate(&doc).unwrap_err();
    assert_eq!(
        errs.at_path("world_transforms.0.0").unwrap().rule,
        SchemaRule::UnsolvedWorldTransform
    );
}

#[test]
fn invalid_keys_are_rejected() {
    let doc = json!({
        "edges": {"a": {"1": {}}},
        "local_transforms": {"0": {"01": {"0": identity()}}},
        "world_transforms": {"0": {"-1": identity()}}
    });
    let errs = validate(&doc).unwrap_err();
    assert_eq!(errs.errors.len(), 3);
    assert!(errs.errors.iter().all(|e| e.rule == SchemaRule::InvalidKey));
    assert!(errs.at_path("edges.a").is_some());
    assert!(errs.at_path("local_transforms.0.01").is_some());
    assert!(errs.at_path("world_transforms.0.-1").is_some());
}

#[test]
fn edge_type_and_noise_are_checked() {
    let doc = json!({
        "edges": {"0": {
            "1": {"type": "springy", "noise": 1},
            "2": {"type": 3, "noise": "loud"},
            "3": {"type": null, "noise": null},
            "4": {}
        }},
        "local_transforms": {},
        "world_transforms": {}
    });
    let errs = validate(&doc).unwrap_err();
    assert_eq!(
        errs.at_path("edges.0.1.type").unwrap().rule,
        SchemaRule::EdgeType
    );
    assert_eq!(
        errs.at_path("edges.0.2.type").unwrap().rule,
        SchemaRule::EdgeType
    );
    assert_eq!(
        errs.at_path("edges.0.2.noise").unwrap().rule,
        SchemaRule::EdgeNoise
    );
    assert_eq!(errs.errors.len(), 3);
}

#[test]
fn null_and_missing_edge_fields_are_unspecified() {
    let doc = json!({
        "edges": {"0": {"3": {"type": null, "noise": null}, "4": {}}},
        "local_transforms": {},
        "world_transforms": {}
    });
    let state = validate(&doc).unwrap();
    for nb in [3, 4] {
        let e = state.edge(NodeId(0), NodeId(nb)).unwrap();
        assert_eq!(e.kind, EdgeKind::Unspecified);
        assert_eq!(e.noise, None);
    }
}

#[test]
fn validation_is_total() {
    let mut m = identity();
    m[0][0] = Value::Null;
    let doc = json!({
        "edges": {"0": {"1": {"type": "wobbly"}}},
        "local_transforms": {"0": {"1": {"0": m, "x": identity()}}},
        "world_transforms": {"0": {"0": unsolved()}}
    });
    let errs = validate(&doc).unwrap_err();
    assert!(errs.has_rule(SchemaRule::EdgeType));
    assert!(errs.has_rule(SchemaRule::MixedTransform));
    assert!(errs.has_rule(SchemaRule::InvalidKey));
    assert!(errs.has_rule(SchemaRule::UnsolvedWorldTransform));
    assert_eq!(errs.errors.len(), 4);
}

#[test]
fn display_lists_one_violation_per_line() {
    let errs = validate(&json!({})).unwrap_err();
    let text = errs.to_string();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("edges: required mapping \"edges\" is missing [missing_field]"));
}

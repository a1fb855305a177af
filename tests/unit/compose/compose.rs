use super::*;

use std::collections::BTreeMap;

fn translation(x: f64, y: f64, z: f64) -> Matrix4 {
    Matrix4::from_rows([
        [1.0, 0.0, 0.0, x],
        [0.0, 1.0, 0.0, y],
        [0.0, 0.0, 1.0, z],
        [0.0, 0.0, 0.0, 1.0],
    ])
}

fn state() -> WorldState {
    WorldState::new(
        BTreeMap::new(),
        BTreeMap::from([
            (LocalKey::new(0, 1, 0), Transform::Solved(translation(1.0, 2.0, 3.0))),
            (LocalKey::new(0, 2, 0), Transform::Unsolved),
        ]),
        BTreeMap::from([(WorldKey::new(0, 0), translation(4.0, 5.0, 6.0))]),
    )
}

#[test]
fn identity_composes_to_identity() {
    let out = compose(&Transform::Solved(Matrix4::IDENTITY)).unwrap();
    assert_eq!(
        out.as_slice(),
        &[
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0
        ]
    );
}

#[test]
fn output_is_column_major_of_wire_matrix() {
    let m = Matrix4::from_rows([
        [0.0, 1.0, 2.0, 3.0],
        [4.0, 5.0, 6.0, 7.0],
        [8.0, 9.0, 10.0, 11.0],
        [12.0, 13.0, 14.0, 15.0],
    ]);
    let out = compose(&Transform::Solved(m)).unwrap();
    assert_eq!(
        out.0,
        [
            0.0, 4.0, 8.0, 12.0, 1.0, 5.0, 9.0, 13.0, 2.0, 6.0, 10.0, 14.0, 3.0, 7.0, 11.0, 15.0
        ]
    );
    assert_eq!(out.to_row_major(), m);
}

#[test]
fn translation_lands_in_last_four_elements() {
    let out = compose(&Transform::Solved(translation(1.0, 2.0, 3.0))).unwrap();
    assert_eq!(&out.0[12..], &[1.0, 2.0, 3.0, 1.0]);
}

#[test]
fn matches_glam_column_major_layout() {
    let m = translation(-1.5, 0.25, 8.0);
    let out = compose(&Transform::Solved(m)).unwrap();
    assert_eq!(out.0, m.to_dmat4().to_cols_array());
}

#[test]
fn unsolved_is_an_error_not_identity() {
    let err = compose(&Transform::Unsolved).unwrap_err();
    assert_eq!(err.target, UnresolvedTarget::Transform);
    assert_eq!(err.reason, UnresolvedReason::Unsolved);
}

#[test]
fn compose_local_reports_target_and_reason() {
    let state = state();
    let out = compose_local(&state, NodeId(0), NodeId(1), FrameIndex(0)).unwrap();
    assert_eq!(&out.0[12..15], &[1.0, 2.0, 3.0]);

    let unsolved = compose_local(&state, NodeId(0), NodeId(2), FrameIndex(0)).unwrap_err();
    assert_eq!(unsolved.target, UnresolvedTarget::Local(LocalKey::new(0, 2, 0)));
    assert_eq!(unsolved.reason, UnresolvedReason::Unsolved);

    let missing = compose_local(&state, NodeId(0), NodeId(1), FrameIndex(1)).unwrap_err();
    assert_eq!(missing.reason, UnresolvedReason::Missing);
    assert_eq!(
        missing.to_string(),
        "unresolved transform: local_transforms.0.1.1 is missing"
    );
}

#[test]
fn compose_world_never_falls_back_to_another_frame() {
    let state = state();
    let out = compose_world(&state, NodeId(0), FrameIndex(0)).unwrap();
    assert_eq!(&out.0[12..15], &[4.0, 5.0, 6.0]);

    let err = compose_world(&state, NodeId(0), FrameIndex(1)).unwrap_err();
    assert_eq!(err.target, UnresolvedTarget::World(WorldKey::new(0, 1)));
    assert_eq!(err.reason, UnresolvedReason::Missing);
}

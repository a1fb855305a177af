//! Conversion of stored row-major transforms into renderer matrices.
//!
//! Snapshots carry matrices row-major (outer array = rows). Scene graphs consume a flat,
//! column-major array of 16 numbers. [`compose`] does that conversion for one resolved
//! transform; [`scene::SceneComposer`] applies it to a whole snapshot at one active frame.

pub(crate) mod scene;

use crate::foundation::core::{FrameIndex, LocalKey, NodeId, WorldKey};
use crate::graph::model::WorldState;
use crate::transform::{Matrix4, Transform};

/// Flat 16-number matrix in the order renderers assign it (column-major of the wire matrix).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct RenderMatrix(pub [f64; 16]);

impl RenderMatrix {
    /// Borrow the flat elements.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Undo [`compose`]: rebuild the row-major matrix this was produced from.
    pub fn to_row_major(&self) -> Matrix4 {
        let mut transposed = [[0.0; 4]; 4];
        for (i, chunk) in self.0.chunks_exact(4).enumerate() {
            transposed[i].copy_from_slice(chunk);
        }
        Matrix4::from_rows(transposed).transpose()
    }
}

/// Which element failed to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnresolvedTarget {
    /// A transform passed in directly.
    Transform,
    /// Local transform lookup.
    Local(LocalKey),
    /// World transform lookup.
    World(WorldKey),
}

/// Why an element has no renderable pose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The entry exists but is unsolved.
    Unsolved,
    /// No entry exists for the exact requested key (e.g. that frame was never estimated).
    Missing,
}

/// No solved pose for the requested element; render it as absent, never as identity.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unresolved transform: {target} is {reason}")]
pub struct UnresolvedTransformError {
    /// Element that was requested.
    pub target: UnresolvedTarget,
    /// Failure cause.
    pub reason: UnresolvedReason,
}

impl std::fmt::Display for UnresolvedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transform => write!(f, "transform"),
            Self::Local(k) => write!(f, "local_transforms.{k}"),
            Self::World(k) => write!(f, "world_transforms.{k}"),
        }
    }
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsolved => write!(f, "unsolved"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Transpose a solved transform and flatten it row by row.
///
/// Output row `i` of the transpose is input column `i`, so the result is the column-major
/// flattening of the wire matrix. For column-vector poses the translation lands at
/// elements 12..15.
pub fn compose(transform: &Transform) -> Result<RenderMatrix, UnresolvedTransformError> {
    match transform {
        Transform::Solved(m) => Ok(flatten_transposed(m)),
        Transform::Unsolved => Err(UnresolvedTransformError {
            target: UnresolvedTarget::Transform,
            reason: UnresolvedReason::Unsolved,
        }),
    }
}

fn flatten_transposed(m: &Matrix4) -> RenderMatrix {
    let t = m.transpose();
    let mut out = [0.0; 16];
    for (i, row) in t.rows.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(row);
    }
    RenderMatrix(out)
}

/// Compose the local transform of `neighbor` relative to `node` at exactly `frame`.
pub fn compose_local(
    state: &WorldState,
    node: NodeId,
    neighbor: NodeId,
    frame: FrameIndex,
) -> Result<RenderMatrix, UnresolvedTransformError> {
    let key = LocalKey {
        node,
        neighbor,
        frame,
    };
    let transform = state
        .local_transform(node, neighbor, frame)
        .ok_or(UnresolvedTransformError {
            target: UnresolvedTarget::Local(key),
            reason: UnresolvedReason::Missing,
        })?;
    compose(transform).map_err(|e| UnresolvedTransformError {
        target: UnresolvedTarget::Local(key),
        ..e
    })
}

/// Compose the world transform of `node` at exactly `frame`.
pub fn compose_world(
    state: &WorldState,
    node: NodeId,
    frame: FrameIndex,
) -> Result<RenderMatrix, UnresolvedTransformError> {
    state
        .world_transform(node, frame)
        .map(flatten_transposed)
        .ok_or(UnresolvedTransformError {
            target: UnresolvedTarget::World(WorldKey { node, frame }),
            reason: UnresolvedReason::Missing,
        })
}

#[cfg(test)]
#[path = "../../tests/unit/compose/compose.rs"]
mod tests;

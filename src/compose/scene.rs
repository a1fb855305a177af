use crate::compose::{RenderMatrix, UnresolvedTransformError, compose_local, compose_world};
use crate::foundation::core::{FrameIndex, NodeId};
use crate::graph::model::{EdgeKind, WorldState};

/// Scene-graph side of the render contract.
///
/// Implementations assign the matrix verbatim and must keep the object's own matrix
/// auto-update disabled so the composed value is not recomputed from position/rotation/scale.
pub trait RenderTarget {
    /// Place a node at its world pose.
    fn set_node_matrix(&mut self, node: NodeId, matrix: &RenderMatrix);
    /// Hide a node that has no world pose at the active frame.
    fn hide_node(&mut self, node: NodeId);
    /// Place the pose of `neighbor` relative to `node`.
    fn set_edge_matrix(&mut self, node: NodeId, neighbor: NodeId, matrix: &RenderMatrix);
    /// Hide an edge that has no solved local pose at the active frame.
    fn hide_edge(&mut self, node: NodeId, neighbor: NodeId);
}

/// Node with a resolved world pose.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PlacedNode {
    /// Node id.
    pub node: NodeId,
    /// Matrix to assign.
    pub matrix: RenderMatrix,
    /// Always `false`: the assigned matrix is authoritative.
    pub matrix_auto_update: bool,
}

/// Edge with a resolved local pose.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PlacedEdge {
    /// Reference node.
    pub node: NodeId,
    /// Node whose relative pose is drawn.
    pub neighbor: NodeId,
    /// Edge class, for styling.
    pub kind: EdgeKind,
    /// Matrix to assign.
    pub matrix: RenderMatrix,
    /// Always `false`: the assigned matrix is authoritative.
    pub matrix_auto_update: bool,
}

/// Everything a renderer needs for one active frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct SceneFrame {
    /// Frame the scene was composed for.
    pub frame: FrameIndex,
    /// Nodes to draw.
    pub nodes: Vec<PlacedNode>,
    /// Edges to draw.
    pub edges: Vec<PlacedEdge>,
    /// Nodes omitted this frame.
    #[serde(skip)]
    pub omitted_nodes: Vec<(NodeId, UnresolvedTransformError)>,
    /// Edges omitted this frame.
    #[serde(skip)]
    pub omitted_edges: Vec<((NodeId, NodeId), UnresolvedTransformError)>,
}

impl SceneFrame {
    /// Push placements into `target` and hide every omitted element.
    pub fn apply(&self, target: &mut dyn RenderTarget) {
        for n in &self.nodes {
            target.set_node_matrix(n.node, &n.matrix);
        }
        for (node, _) in &self.omitted_nodes {
            target.hide_node(*node);
        }
        for e in &self.edges {
            target.set_edge_matrix(e.node, e.neighbor, &e.matrix);
        }
        for ((node, neighbor), _) in &self.omitted_edges {
            target.hide_edge(*node, *neighbor);
        }
    }
}

/// Projects a snapshot onto a scene at one active frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneComposer {
    active_frame: FrameIndex,
}

impl SceneComposer {
    /// Composer for `active_frame`.
    pub fn new(active_frame: FrameIndex) -> Self {
        Self { active_frame }
    }

    /// Currently selected frame.
    pub fn active_frame(&self) -> FrameIndex {
        self.active_frame
    }

    /// Select another frame, e.g. from a scrubber.
    pub fn set_active_frame(&mut self, frame: FrameIndex) {
        self.active_frame = frame;
    }

    /// Compose every node and edge of `state` at the active frame.
    ///
    /// Unresolved elements are listed as omitted. No frame fallback is attempted.
    #[tracing::instrument(level = "debug", skip(self, state), fields(frame = self.active_frame.0))]
    pub fn compose_frame(&self, state: &WorldState) -> SceneFrame {
        let frame = self.active_frame;
        let mut out = SceneFrame {
            frame,
            ..SceneFrame::default()
        };

        for node in state.nodes() {
            match compose_world(state, node, frame) {
                Ok(matrix) => out.nodes.push(PlacedNode {
                    node,
                    matrix,
                    matrix_auto_update: false,
                }),
                Err(e) => out.omitted_nodes.push((node, e)),
            }
        }

        for ((node, neighbor), edge) in state.edges() {
            match compose_local(state, node, neighbor, frame) {
                Ok(matrix) => out.edges.push(PlacedEdge {
                    node,
                    neighbor,
                    kind: edge.kind,
                    matrix,
                    matrix_auto_update: false,
                }),
                Err(e) => out.omitted_edges.push(((node, neighbor), e)),
            }
        }

        tracing::debug!(
            placed_nodes = out.nodes.len(),
            omitted_nodes = out.omitted_nodes.len(),
            placed_edges = out.edges.len(),
            omitted_edges = out.omitted_edges.len(),
            "composed scene frame"
        );
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/scene.rs"]
mod tests;

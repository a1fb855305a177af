//! Deterministic ground-truth pose graphs for development and tests.
//!
//! Nodes joined by rigid edges form a group that moves as one body: each node has a fixed
//! random offset inside its group and each group has a random pose per frame. Known edges
//! carry the exact relative pose derived from that ground truth; unknown edges are emitted
//! unsolved.

use std::collections::{BTreeMap, VecDeque};

use glam::{DMat4, DQuat, DVec3};

use crate::foundation::core::{FrameIndex, LocalKey, NodeId, WorldKey};
use crate::foundation::error::{PoseGraphError, PoseGraphResult};
use crate::foundation::rng::Rng64;
use crate::graph::model::{Edge, EdgeKind, WorldState};
use crate::transform::{Matrix4, Transform};

/// Node ids of [`SyntheticGraph::demo_rig`].
pub mod rig {
    /// Tracked camera.
    pub const CAMERA: u32 = 0;
    /// Tracked headset.
    pub const HEADSET: u32 = 1;
    /// World anchor.
    pub const WORLD: u32 = 2;
}

/// Undirected edge specification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeSpec {
    /// One endpoint.
    pub a: u32,
    /// Other endpoint.
    pub b: u32,
    /// Connection class.
    pub kind: EdgeKind,
    /// Reported noise.
    pub noise: f64,
}

impl EdgeSpec {
    /// Build an edge specification.
    pub fn new(a: u32, b: u32, kind: EdgeKind, noise: f64) -> Self {
        Self { a, b, kind, noise }
    }
}

/// Ground-truth graph with per-frame world poses.
#[derive(Clone, Debug)]
pub struct SyntheticGraph {
    num_nodes: u32,
    frames: u64,
    edges: Vec<EdgeSpec>,
    groups: Vec<Vec<NodeId>>,
    group_of: Vec<usize>,
    // world[node][frame]
    world: Vec<Vec<DMat4>>,
}

impl SyntheticGraph {
    /// Generate a graph. Identical inputs always produce identical poses.
    #[tracing::instrument(skip(edges), fields(num_edges = edges.len()))]
    pub fn new(
        num_nodes: u32,
        edges: &[EdgeSpec],
        frames: u64,
        seed: u64,
    ) -> PoseGraphResult<Self> {
        if frames == 0 {
            return Err(PoseGraphError::synthetic(
                "number of frames must be at least 1",
            ));
        }
        for e in edges {
            if e.a >= num_nodes || e.b >= num_nodes {
                return Err(PoseGraphError::synthetic(format!(
                    "edge {}-{} references a node outside 0..{num_nodes}",
                    e.a, e.b
                )));
            }
            if e.a == e.b {
                return Err(PoseGraphError::synthetic(format!(
                    "edge {}-{} connects a node to itself",
                    e.a, e.b
                )));
            }
            if !e.noise.is_finite() {
                return Err(PoseGraphError::synthetic(format!(
                    "edge {}-{} noise must be finite",
                    e.a, e.b
                )));
            }
        }

        let (groups, group_of) = rigid_groups(num_nodes, edges);

        let mut rng = Rng64::new(seed);
        let intra: Vec<DMat4> = (0..num_nodes).map(|_| random_rigid(&mut rng)).collect();
        let group_poses: Vec<Vec<DMat4>> = (0..frames)
            .map(|_| groups.iter().map(|_| random_rigid(&mut rng)).collect())
            .collect();

        let world = (0..num_nodes as usize)
            .map(|node| {
                (0..frames as usize)
                    .map(|frame| group_poses[frame][group_of[node]] * intra[node])
                    .collect()
            })
            .collect();

        tracing::debug!(groups = groups.len(), "generated synthetic graph");
        Ok(Self {
            num_nodes,
            frames,
            edges: edges.to_vec(),
            groups,
            group_of,
            world,
        })
    }

    /// Camera, headset and world anchor: the camera–headset link is tracked-but-unsolved,
    /// the other two links are calibrated rigid mounts.
    pub fn demo_rig(frames: u64, seed: u64) -> PoseGraphResult<Self> {
        use rig::{CAMERA, HEADSET, WORLD};
        Self::new(
            3,
            &[
                EdgeSpec::new(CAMERA, HEADSET, EdgeKind::NonRigidUnknown, 1.0),
                EdgeSpec::new(CAMERA, WORLD, EdgeKind::RigidKnown, 1.0),
                EdgeSpec::new(HEADSET, WORLD, EdgeKind::RigidKnown, 1.0),
            ],
            frames,
            seed,
        )
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> u32 {
        self.num_nodes
    }

    /// Number of frames.
    pub fn num_frames(&self) -> u64 {
        self.frames
    }

    /// Rigidly connected groups, each sorted ascending.
    pub fn groups(&self) -> &[Vec<NodeId>] {
        &self.groups
    }

    /// Index into [`SyntheticGraph::groups`] of the group containing `node`.
    pub fn group_of(&self, node: NodeId) -> Option<usize> {
        self.group_of.get(node.0 as usize).copied()
    }

    /// Ground-truth world pose.
    pub fn world_pose(&self, node: NodeId, frame: FrameIndex) -> Option<Matrix4> {
        self.world
            .get(node.0 as usize)?
            .get(usize::try_from(frame.0).ok()?)
            .map(|m| Matrix4::from_dmat4(*m))
    }

    /// Snapshot in the wire model: symmetric edges, local poses for every edge and frame
    /// (solved for known edges only) and world poses for every node and frame.
    pub fn to_world_state(&self) -> WorldState {
        let mut edges = BTreeMap::new();
        let mut local = BTreeMap::new();
        let mut world = BTreeMap::new();

        for (node, per_frame) in self.world.iter().enumerate() {
            for (frame, m) in per_frame.iter().enumerate() {
                world.insert(
                    WorldKey::new(node as u32, frame as u64),
                    Matrix4::from_dmat4(*m),
                );
            }
        }

        for spec in &self.edges {
            let edge = Edge {
                kind: spec.kind,
                noise: Some(spec.noise),
            };
            for (from, to) in [(spec.a, spec.b), (spec.b, spec.a)] {
                edges.insert((NodeId(from), NodeId(to)), edge);
                for frame in 0..self.frames {
                    let transform = if spec.kind.is_known() {
                        let f = frame as usize;
                        let rel =
                            self.world[from as usize][f].inverse() * self.world[to as usize][f];
                        Transform::Solved(Matrix4::from_dmat4(rel))
                    } else {
                        Transform::Unsolved
                    };
                    local.insert(LocalKey::new(from, to, frame), transform);
                }
            }
        }

        WorldState::new(edges, local, world)
    }
}

fn rigid_groups(num_nodes: u32, edges: &[EdgeSpec]) -> (Vec<Vec<NodeId>>, Vec<usize>) {
    let n = num_nodes as usize;
    let mut adjacency = vec![Vec::new(); n];
    for e in edges.iter().filter(|e| e.kind.is_rigid()) {
        adjacency[e.a as usize].push(e.b as usize);
        adjacency[e.b as usize].push(e.a as usize);
    }

    let mut group_of = vec![usize::MAX; n];
    let mut groups = Vec::new();
    for start in 0..n {
        if group_of[start] != usize::MAX {
            continue;
        }
        let id = groups.len();
        let mut members = vec![NodeId(start as u32)];
        group_of[start] = id;
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &next in &adjacency[node] {
                if group_of[next] == usize::MAX {
                    group_of[next] = id;
                    members.push(NodeId(next as u32));
                    queue.push_back(next);
                }
            }
        }
        members.sort();
        groups.push(members);
    }
    (groups, group_of)
}

/// Uniformly random rotation with translation in `[-1, 1)^3` and unit scale.
fn random_rigid(rng: &mut Rng64) -> DMat4 {
    // Shoemake's uniform unit quaternion.
    let (u1, u2, u3) = (rng.next_f64_01(), rng.next_f64_01(), rng.next_f64_01());
    let tau = std::f64::consts::TAU;
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    let rotation = DQuat::from_xyzw(
        a * (tau * u2).sin(),
        a * (tau * u2).cos(),
        b * (tau * u3).sin(),
        b * (tau * u3).cos(),
    )
    .normalize();
    let translation = DVec3::new(
        rng.next_range(-1.0, 1.0),
        rng.next_range(-1.0, 1.0),
        rng.next_range(-1.0, 1.0),
    );
    DMat4::from_rotation_translation(rotation, translation)
}

#[cfg(test)]
#[path = "../tests/unit/synthetic/synthetic.rs"]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::foundation::core::{FrameIndex, LocalKey, NodeId, WorldKey};
use crate::foundation::error::{PoseGraphError, PoseGraphResult};
use crate::graph::validate::validate;
use crate::transform::{Matrix4, Transform};

/// Physical/estimation class of an edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// No class reported (`null` or missing `type`).
    #[default]
    Unspecified,
    /// Rigid connection with a pre-calibrated pose.
    RigidKnown,
    /// Rigid connection whose pose must be solved.
    RigidUnknown,
    /// Live-tracked connection.
    NonRigidKnown,
    /// Moving connection whose pose must be solved.
    NonRigidUnknown,
}

impl EdgeKind {
    /// Every accepted wire token.
    pub const TOKENS: [&'static str; 4] = [
        "rigid-known",
        "rigid-unknown",
        "non-rigid-known",
        "non-rigid-unknown",
    ];

    /// Parse a wire token. `Unspecified` has no token; it is spelled `null`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "rigid-known" => Some(Self::RigidKnown),
            "rigid-unknown" => Some(Self::RigidUnknown),
            "non-rigid-known" => Some(Self::NonRigidKnown),
            "non-rigid-unknown" => Some(Self::NonRigidUnknown),
            _ => None,
        }
    }

    /// Wire token, `None` for [`EdgeKind::Unspecified`].
    pub fn token(self) -> Option<&'static str> {
        match self {
            Self::Unspecified => None,
            Self::RigidKnown => Some("rigid-known"),
            Self::RigidUnknown => Some("rigid-unknown"),
            Self::NonRigidKnown => Some("non-rigid-known"),
            Self::NonRigidUnknown => Some("non-rigid-unknown"),
        }
    }

    /// Rigid edges keep the same relative pose across frames.
    pub fn is_rigid(self) -> bool {
        matches!(self, Self::RigidKnown | Self::RigidUnknown)
    }

    /// Known edges are given by the producer rather than solved.
    pub fn is_known(self) -> bool {
        matches!(self, Self::RigidKnown | Self::NonRigidKnown)
    }
}

impl Serialize for EdgeKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.token().serialize(serializer)
    }
}

/// Metadata of one directed edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct Edge {
    /// Connection class.
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Estimated uncertainty; opaque to this crate. Omitted on the wire when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
}

/// One validated pose-graph snapshot.
///
/// Snapshots are immutable: a newer push replaces the whole value in
/// [`crate::store::WorldStore`]. Transforms are keyed by composite keys
/// (`node, neighbor, frame` and `node, frame`) so a missing entry is a single failed lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldState {
    edges: BTreeMap<(NodeId, NodeId), Edge>,
    local_transforms: BTreeMap<LocalKey, Transform>,
    world_transforms: BTreeMap<WorldKey, Matrix4>,
    declared: DeclaredKeys,
}

/// Map keys that were present on the wire even when their sub-map was empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DeclaredKeys {
    pub(crate) edge_nodes: BTreeSet<NodeId>,
    pub(crate) local_nodes: BTreeSet<NodeId>,
    pub(crate) local_pairs: BTreeSet<(NodeId, NodeId)>,
    pub(crate) world_nodes: BTreeSet<NodeId>,
}

impl WorldState {
    /// Assemble a snapshot from already-typed parts.
    ///
    /// World transforms are plain matrices, so an unsolved world pose is unrepresentable.
    pub fn new(
        edges: BTreeMap<(NodeId, NodeId), Edge>,
        local_transforms: BTreeMap<LocalKey, Transform>,
        world_transforms: BTreeMap<WorldKey, Matrix4>,
    ) -> Self {
        let mut declared = DeclaredKeys::default();
        for (a, _) in edges.keys() {
            declared.edge_nodes.insert(*a);
        }
        for k in local_transforms.keys() {
            declared.local_nodes.insert(k.node);
            declared.local_pairs.insert((k.node, k.neighbor));
        }
        for k in world_transforms.keys() {
            declared.world_nodes.insert(k.node);
        }
        Self {
            edges,
            local_transforms,
            world_transforms,
            declared,
        }
    }

    pub(crate) fn from_parts(
        edges: BTreeMap<(NodeId, NodeId), Edge>,
        local_transforms: BTreeMap<LocalKey, Transform>,
        world_transforms: BTreeMap<WorldKey, Matrix4>,
        declared: DeclaredKeys,
    ) -> Self {
        Self {
            edges,
            local_transforms,
            world_transforms,
            declared,
        }
    }

    /// Parse and validate a snapshot from a JSON string.
    pub fn from_json_str(s: &str) -> PoseGraphResult<Self> {
        let value: serde_json::Value = serde_json::from_str(s)
            .map_err(|e| PoseGraphError::serde(format!("parse snapshot JSON: {e}")))?;
        Ok(validate(&value)?)
    }

    /// Parse and validate a snapshot from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> PoseGraphResult<Self> {
        let value: serde_json::Value = serde_json::from_reader(r)
            .map_err(|e| PoseGraphError::serde(format!("parse snapshot JSON: {e}")))?;
        Ok(validate(&value)?)
    }

    /// Parse and validate a snapshot from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> PoseGraphResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PoseGraphError::serde(format!("open snapshot JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Edge metadata for the directed pair `node -> neighbor`.
    pub fn edge(&self, node: NodeId, neighbor: NodeId) -> Option<&Edge> {
        self.edges.get(&(node, neighbor))
    }

    /// All edges in `(node, neighbor)` order.
    pub fn edges(&self) -> impl Iterator<Item = ((NodeId, NodeId), &Edge)> {
        self.edges.iter().map(|(k, e)| (*k, e))
    }

    /// Neighbors listed under `node` in the edge map.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .range((node, NodeId(0))..=(node, NodeId(u32::MAX)))
            .map(|((_, nb), _)| *nb)
    }

    /// Local transform of `neighbor` relative to `node` at `frame`.
    pub fn local_transform(
        &self,
        node: NodeId,
        neighbor: NodeId,
        frame: FrameIndex,
    ) -> Option<&Transform> {
        self.local_transforms.get(&LocalKey {
            node,
            neighbor,
            frame,
        })
    }

    /// All local transforms in key order.
    pub fn local_transforms(&self) -> impl Iterator<Item = (LocalKey, &Transform)> {
        self.local_transforms.iter().map(|(k, t)| (*k, t))
    }

    /// World transform of `node` at `frame`. Always solved when present.
    pub fn world_transform(&self, node: NodeId, frame: FrameIndex) -> Option<&Matrix4> {
        self.world_transforms.get(&WorldKey { node, frame })
    }

    /// All world transforms in key order.
    pub fn world_transforms(&self) -> impl Iterator<Item = (WorldKey, &Matrix4)> {
        self.world_transforms.iter().map(|(k, m)| (*k, m))
    }

    /// Frames at which `node` has a world transform, ascending.
    pub fn frames_for_node(&self, node: NodeId) -> Vec<FrameIndex> {
        self.world_transforms
            .range(WorldKey::new(node.0, 0)..=WorldKey::new(node.0, u64::MAX))
            .map(|(k, _)| k.frame)
            .collect()
    }

    /// Every node mentioned anywhere in the snapshot, ascending.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut out = BTreeSet::new();
        out.extend(self.declared.edge_nodes.iter().copied());
        out.extend(self.declared.local_nodes.iter().copied());
        out.extend(self.declared.world_nodes.iter().copied());
        for (a, b) in self.edges.keys() {
            out.insert(*a);
            out.insert(*b);
        }
        for (a, b) in &self.declared.local_pairs {
            out.insert(*a);
            out.insert(*b);
        }
        out.into_iter().collect()
    }

    /// Every frame mentioned by either transform map, ascending.
    pub fn frames(&self) -> Vec<FrameIndex> {
        let mut out = BTreeSet::new();
        out.extend(self.local_transforms.keys().map(|k| k.frame));
        out.extend(self.world_transforms.keys().map(|k| k.frame));
        out.into_iter().collect()
    }

    /// `(solved, total)` local transform counts.
    pub fn solved_counts(&self) -> (usize, usize) {
        let solved = self
            .local_transforms
            .values()
            .filter(|t| t.is_solved())
            .count();
        (solved, self.local_transforms.len())
    }

    /// Return `true` when the snapshot carries no keys at all.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
            && self.local_transforms.is_empty()
            && self.world_transforms.is_empty()
            && self.declared == DeclaredKeys::default()
    }

    fn edges_wire(&self) -> BTreeMap<u32, BTreeMap<u32, &Edge>> {
        let mut out: BTreeMap<u32, BTreeMap<u32, &Edge>> = BTreeMap::new();
        for n in &self.declared.edge_nodes {
            out.entry(n.0).or_default();
        }
        for ((a, b), e) in &self.edges {
            out.entry(a.0).or_default().insert(b.0, e);
        }
        out
    }

    #[allow(clippy::type_complexity)]
    fn local_wire(&self) -> BTreeMap<u32, BTreeMap<u32, BTreeMap<u64, &Transform>>> {
        let mut out: BTreeMap<u32, BTreeMap<u32, BTreeMap<u64, &Transform>>> = BTreeMap::new();
        for n in &self.declared.local_nodes {
            out.entry(n.0).or_default();
        }
        for (a, b) in &self.declared.local_pairs {
            out.entry(a.0).or_default().entry(b.0).or_default();
        }
        for (k, t) in &self.local_transforms {
            out.entry(k.node.0)
                .or_default()
                .entry(k.neighbor.0)
                .or_default()
                .insert(k.frame.0, t);
        }
        out
    }

    fn world_wire(&self) -> BTreeMap<u32, BTreeMap<u64, &Matrix4>> {
        let mut out: BTreeMap<u32, BTreeMap<u64, &Matrix4>> = BTreeMap::new();
        for n in &self.declared.world_nodes {
            out.entry(n.0).or_default();
        }
        for (k, m) in &self.world_transforms {
            out.entry(k.node.0).or_default().insert(k.frame.0, m);
        }
        out
    }
}

impl Serialize for WorldState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Integer map keys come out as decimal strings in JSON.
        let mut st = serializer.serialize_struct("WorldState", 3)?;
        st.serialize_field("edges", &self.edges_wire())?;
        st.serialize_field("local_transforms", &self.local_wire())?;
        st.serialize_field("world_transforms", &self.world_wire())?;
        st.end()
    }
}

impl<'de> serde::Deserialize<'de> for WorldState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        validate(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/model.rs"]
mod tests;

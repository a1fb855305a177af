use std::fmt;

/// Identifier of a rigid body in the pose graph.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u32);

/// Discrete 0-based time step at which a transform may have been estimated.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of one local transform: the pose of `neighbor` relative to `node` at `frame`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalKey {
    /// Reference node.
    pub node: NodeId,
    /// Node whose pose is expressed in the reference node's frame.
    pub neighbor: NodeId,
    /// Time step.
    pub frame: FrameIndex,
}

impl LocalKey {
    /// Build a key from raw ids.
    pub fn new(node: u32, neighbor: u32, frame: u64) -> Self {
        Self {
            node: NodeId(node),
            neighbor: NodeId(neighbor),
            frame: FrameIndex(frame),
        }
    }
}

impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.node, self.neighbor, self.frame)
    }
}

/// Key of one world transform: the pose of `node` in the shared frame at `frame`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldKey {
    /// Node.
    pub node: NodeId,
    /// Time step.
    pub frame: FrameIndex,
}

impl WorldKey {
    /// Build a key from raw ids.
    pub fn new(node: u32, frame: u64) -> Self {
        Self {
            node: NodeId(node),
            frame: FrameIndex(frame),
        }
    }
}

impl fmt::Display for WorldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.frame)
    }
}

/// Parse a map key that encodes a non-negative integer.
///
/// Only canonical decimal is accepted (`"0"`, `"17"`; not `"+1"`, `"007"` or `" 3"`), so a
/// parsed key always prints back to the same string.
pub(crate) fn parse_index_key<T: std::str::FromStr>(key: &str) -> Option<T> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if !canonical {
        return None;
    }
    key.parse().ok()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;

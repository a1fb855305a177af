use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::foundation::core::{FrameIndex, LocalKey, NodeId, WorldKey, parse_index_key};
use crate::graph::model::{DeclaredKeys, Edge, EdgeKind, WorldState};
use crate::transform::{Matrix4, Transform};

/// One step of a path into a snapshot document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaPathElem {
    /// Fixed schema field.
    Field(&'static str),
    /// Map key taken from the document (node id, neighbor id or frame index).
    Key(String),
    /// Array position inside a matrix.
    Index(usize),
}

/// Rule violated by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaRule {
    /// A mapping was expected.
    NotAnObject,
    /// A required top-level mapping is missing.
    MissingField,
    /// A map key is not a canonical non-negative integer.
    InvalidKey,
    /// A transform is not 4 arrays of 4 elements.
    MatrixShape,
    /// A matrix entry is neither a finite number nor null.
    InvalidEntry,
    /// A transform mixes numeric and null entries.
    MixedTransform,
    /// An edge `type` is not one of the allowed tokens.
    EdgeType,
    /// An edge `noise` is neither a number nor null.
    EdgeNoise,
    /// A world transform is unsolved.
    UnsolvedWorldTransform,
}

impl SchemaRule {
    /// Stable identifier used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAnObject => "not_an_object",
            Self::MissingField => "missing_field",
            Self::InvalidKey => "invalid_key",
            Self::MatrixShape => "matrix_shape",
            Self::InvalidEntry => "invalid_entry",
            Self::MixedTransform => "mixed_transform",
            Self::EdgeType => "edge_type",
            Self::EdgeNoise => "edge_noise",
            Self::UnsolvedWorldTransform => "unsolved_world_transform",
        }
    }
}

impl fmt::Display for SchemaRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violation, located by path.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// Location of the offending value.
    pub path: Vec<SchemaPathElem>,
    /// Violated rule.
    pub rule: SchemaRule,
    /// Human-readable detail.
    pub message: String,
}

impl SchemaError {
    fn at(path: &[SchemaPathElem], rule: SchemaRule, message: impl Into<String>) -> Self {
        Self {
            path: path.to_vec(),
            rule,
            message: message.into(),
        }
    }

    /// Dotted path such as `local_transforms.3.7.2`, with matrix positions in brackets.
    pub fn path_string(&self) -> String {
        format_path(&self.path)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}]",
            format_path(&self.path),
            self.message,
            self.rule
        )
    }
}

fn format_path(path: &[SchemaPathElem]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    let mut s = String::new();
    for p in path {
        match p {
            SchemaPathElem::Field(name) => {
                if !s.is_empty() {
                    s.push('.');
                }
                s.push_str(name);
            }
            SchemaPathElem::Key(key) => {
                if !s.is_empty() {
                    s.push('.');
                }
                s.push_str(key);
            }
            SchemaPathElem::Index(i) => {
                s.push('[');
                s.push_str(&i.to_string());
                s.push(']');
            }
        }
    }
    s
}

/// Every violation found in one snapshot, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaErrors {
    /// Collected violations; never empty.
    pub errors: Vec<SchemaError>,
}

impl SchemaErrors {
    /// Return `true` if any violation has `rule`.
    pub fn has_rule(&self, rule: SchemaRule) -> bool {
        self.errors.iter().any(|e| e.rule == rule)
    }

    /// Return the violation located exactly at `path`, if any.
    pub fn at_path(&self, path: &str) -> Option<&SchemaError> {
        self.errors.iter().find(|e| e.path_string() == path)
    }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

/// Validate a candidate snapshot and build the typed [`WorldState`].
///
/// Validation is total: every entry is visited and all violations are reported together.
/// Unknown top-level keys are ignored. The function is pure.
#[tracing::instrument(level = "debug", skip(candidate))]
pub fn validate(candidate: &Value) -> Result<WorldState, SchemaErrors> {
    let mut v = Validator::default();
    v.world_state(candidate);
    if v.errors.is_empty() {
        Ok(WorldState::from_parts(
            v.edges, v.local, v.world, v.declared,
        ))
    } else {
        Err(SchemaErrors { errors: v.errors })
    }
}

#[derive(Default)]
struct Validator {
    path: Vec<SchemaPathElem>,
    errors: Vec<SchemaError>,
    edges: BTreeMap<(NodeId, NodeId), Edge>,
    local: BTreeMap<LocalKey, Transform>,
    world: BTreeMap<WorldKey, Matrix4>,
    declared: DeclaredKeys,
}

impl Validator {
    fn fail(&mut self, rule: SchemaRule, message: impl Into<String>) {
        self.errors.push(SchemaError::at(&self.path, rule, message));
    }

    fn object<'v>(&mut self, value: &'v Value, what: &str) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(m) => Some(m),
            None => {
                self.fail(
                    SchemaRule::NotAnObject,
                    format!("{what} must be an object, got {}", kind_name(value)),
                );
                None
            }
        }
    }

    fn index_key<T: std::str::FromStr>(&mut self, key: &str, what: &str) -> Option<T> {
        let parsed = parse_index_key::<T>(key);
        if parsed.is_none() {
            self.fail(
                SchemaRule::InvalidKey,
                format!("{what} key \"{key}\" must be a non-negative integer"),
            );
        }
        parsed
    }

    fn world_state(&mut self, candidate: &Value) {
        let Some(root) = self.object(candidate, "snapshot") else {
            return;
        };

        for field in ["edges", "local_transforms", "world_transforms"] {
            self.path.push(SchemaPathElem::Field(field));
            match root.get(field) {
                None => self.fail(
                    SchemaRule::MissingField,
                    format!("required mapping \"{field}\" is missing"),
                ),
                Some(value) => match field {
                    "edges" => self.edges(value),
                    "local_transforms" => self.local_transforms(value),
                    _ => self.world_transforms(value),
                },
            }
            self.path.pop();
        }
    }

    fn edges(&mut self, value: &Value) {
        let Some(nodes) = self.object(value, "edges") else {
            return;
        };
        for (node_key, neighbors) in nodes {
            self.path.push(SchemaPathElem::Key(node_key.clone()));
            let node = self.index_key::<u32>(node_key, "node").map(NodeId);
            if let Some(node) = node {
                self.declared.edge_nodes.insert(node);
            }
            if let Some(neighbors) = self.object(neighbors, "neighbor map") {
                for (nb_key, body) in neighbors {
                    self.path.push(SchemaPathElem::Key(nb_key.clone()));
                    let nb = self.index_key::<u32>(nb_key, "neighbor").map(NodeId);
                    let edge = self.edge(body);
                    if let (Some(node), Some(nb), Some(edge)) = (node, nb, edge) {
                        self.edges.insert((node, nb), edge);
                    }
                    self.path.pop();
                }
            }
            self.path.pop();
        }
    }

    fn edge(&mut self, value: &Value) -> Option<Edge> {
        let body = self.object(value, "edge")?;
        let mut ok = true;

        self.path.push(SchemaPathElem::Field("type"));
        let kind = match body.get("type") {
            None | Some(Value::Null) => EdgeKind::Unspecified,
            Some(Value::String(token)) => match EdgeKind::from_token(token) {
                Some(kind) => kind,
                None => {
                    self.fail(
                        SchemaRule::EdgeType,
                        format!(
                            "edge type \"{token}\" is not one of null, {}",
                            EdgeKind::TOKENS.join(", ")
                        ),
                    );
                    ok = false;
                    EdgeKind::Unspecified
                }
            },
            Some(other) => {
                self.fail(
                    SchemaRule::EdgeType,
                    format!("edge type must be a string or null, got {}", kind_name(other)),
                );
                ok = false;
                EdgeKind::Unspecified
            }
        };
        self.path.pop();

        self.path.push(SchemaPathElem::Field("noise"));
        let noise = match body.get("noise") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_f64().filter(|x| x.is_finite()) {
                Some(x) => Some(x),
                None => {
                    self.fail(SchemaRule::EdgeNoise, "edge noise must be a finite number");
                    ok = false;
                    None
                }
            },
            Some(other) => {
                self.fail(
                    SchemaRule::EdgeNoise,
                    format!("edge noise must be a number or null, got {}", kind_name(other)),
                );
                ok = false;
                None
            }
        };
        self.path.pop();

        ok.then_some(Edge { kind, noise })
    }

    fn local_transforms(&mut self, value: &Value) {
        let Some(nodes) = self.object(value, "local_transforms") else {
            return;
        };
        for (node_key, neighbors) in nodes {
            self.path.push(SchemaPathElem::Key(node_key.clone()));
            let node = self.index_key::<u32>(node_key, "node").map(NodeId);
            if let Some(node) = node {
                self.declared.local_nodes.insert(node);
            }
            if let Some(neighbors) = self.object(neighbors, "neighbor map") {
                for (nb_key, frames) in neighbors {
                    self.path.push(SchemaPathElem::Key(nb_key.clone()));
                    let nb = self.index_key::<u32>(nb_key, "neighbor").map(NodeId);
                    if let (Some(node), Some(nb)) = (node, nb) {
                        self.declared.local_pairs.insert((node, nb));
                    }
                    if let Some(frames) = self.object(frames, "frame map") {
                        for (frame_key, transform) in frames {
                            self.path.push(SchemaPathElem::Key(frame_key.clone()));
                            let frame = self.index_key::<u64>(frame_key, "frame").map(FrameIndex);
                            let transform = self.transform(transform);
                            if let (Some(node), Some(neighbor), Some(frame), Some(t)) =
                                (node, nb, frame, transform)
                            {
                                self.local.insert(
                                    LocalKey {
                                        node,
                                        neighbor,
                                        frame,
                                    },
                                    t,
                                );
                            }
                            self.path.pop();
                        }
                    }
                    self.path.pop();
                }
            }
            self.path.pop();
        }
    }

    fn world_transforms(&mut self, value: &Value) {
        let Some(nodes) = self.object(value, "world_transforms") else {
            return;
        };
        for (node_key, frames) in nodes {
            self.path.push(SchemaPathElem::Key(node_key.clone()));
            let node = self.index_key::<u32>(node_key, "node").map(NodeId);
            if let Some(node) = node {
                self.declared.world_nodes.insert(node);
            }
            if let Some(frames) = self.object(frames, "frame map") {
                for (frame_key, transform) in frames {
                    self.path.push(SchemaPathElem::Key(frame_key.clone()));
                    let frame = self.index_key::<u64>(frame_key, "frame").map(FrameIndex);
                    let matrix = match self.transform(transform) {
                        Some(Transform::Solved(m)) => Some(m),
                        Some(Transform::Unsolved) => {
                            self.fail(
                                SchemaRule::UnsolvedWorldTransform,
                                "world transforms must be solved (all 16 entries numeric)",
                            );
                            None
                        }
                        None => None,
                    };
                    if let (Some(node), Some(frame), Some(m)) = (node, frame, matrix) {
                        self.world.insert(WorldKey { node, frame }, m);
                    }
                    self.path.pop();
                }
            }
            self.path.pop();
        }
    }

    /// Check shape, then entry types, then homogeneity.
    fn transform(&mut self, value: &Value) -> Option<Transform> {
        let Some(rows) = value.as_array() else {
            self.fail(
                SchemaRule::MatrixShape,
                format!(
                    "transform must be an array of 4 rows, got {}",
                    kind_name(value)
                ),
            );
            return None;
        };
        if rows.len() != 4 {
            self.fail(
                SchemaRule::MatrixShape,
                format!("transform must have exactly 4 rows, got {}", rows.len()),
            );
            return None;
        }

        let mut shape_ok = true;
        for (r, row) in rows.iter().enumerate() {
            let len = row.as_array().map(Vec::len);
            if len != Some(4) {
                self.path.push(SchemaPathElem::Index(r));
                self.fail(
                    SchemaRule::MatrixShape,
                    match len {
                        Some(n) => format!("row must have exactly 4 entries, got {n}"),
                        None => format!("row must be an array, got {}", kind_name(row)),
                    },
                );
                self.path.pop();
                shape_ok = false;
            }
        }
        if !shape_ok {
            return None;
        }

        let mut out = [[0.0; 4]; 4];
        let mut numbers = 0usize;
        let mut nulls = 0usize;
        let mut entries_ok = true;
        for (r, row) in rows.iter().enumerate() {
            let Some(row) = row.as_array() else {
                continue;
            };
            for (c, entry) in row.iter().enumerate() {
                match entry {
                    Value::Null => nulls += 1,
                    Value::Number(n) if n.as_f64().is_some_and(f64::is_finite) => {
                        out[r][c] = n.as_f64().unwrap_or_default();
                        numbers += 1;
                    }
                    other => {
                        self.path.push(SchemaPathElem::Index(r));
                        self.path.push(SchemaPathElem::Index(c));
                        self.fail(
                            SchemaRule::InvalidEntry,
                            format!(
                                "matrix entry must be a finite number or null, got {}",
                                kind_name(other)
                            ),
                        );
                        self.path.pop();
                        self.path.pop();
                        entries_ok = false;
                    }
                }
            }
        }
        if !entries_ok {
            return None;
        }

        match (numbers, nulls) {
            (16, 0) => Some(Transform::Solved(Matrix4::from_rows(out))),
            (0, 16) => Some(Transform::Unsolved),
            _ => {
                self.fail(
                    SchemaRule::MixedTransform,
                    format!(
                        "transform mixes {numbers} numeric and {nulls} null entries; \
                         it must be fully solved or fully unsolved"
                    ),
                );
                None
            }
        }
    }
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/validate.rs"]
mod tests;

//! Solved/unsolved pose representation.

pub(crate) mod matrix;

pub use matrix::Matrix4;

use serde::ser::{Serialize, SerializeSeq, Serializer};

/// A per-frame pose estimate.
///
/// On the wire both variants are a 4×4 nested array: all numbers when solved, all `null`
/// when the edge exists but has not been estimated yet. A partially filled matrix cannot
/// be represented.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transform {
    /// All sixteen entries are known.
    Solved(Matrix4),
    /// Structural edge with no estimate yet.
    Unsolved,
}

impl Transform {
    /// Return the matrix when solved.
    pub fn solved(&self) -> Option<&Matrix4> {
        match self {
            Self::Solved(m) => Some(m),
            Self::Unsolved => None,
        }
    }

    /// Return `true` for [`Transform::Solved`].
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved(_))
    }
}

impl From<Matrix4> for Transform {
    fn from(m: Matrix4) -> Self {
        Self::Solved(m)
    }
}

impl Serialize for Transform {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Solved(m) => m.serialize(serializer),
            Self::Unsolved => {
                let null_row: [Option<f64>; 4] = [None; 4];
                let mut seq = serializer.serialize_seq(Some(4))?;
                for _ in 0..4 {
                    seq.serialize_element(&null_row)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/transform.rs"]
mod tests;

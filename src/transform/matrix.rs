//! Row-major 4×4 matrix as carried on the wire.

use glam::DMat4;

/// A 4×4 matrix stored row-major: `rows[r][c]` is row `r`, column `c`.
///
/// This is the orientation of the snapshot wire format (outer array = rows). Renderers that
/// want column-major data go through [`crate::compose::compose`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Matrix4 {
    /// Matrix rows.
    pub rows: [[f64; 4]; 4],
}

impl Matrix4 {
    /// Identity matrix.
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Build from rows.
    pub const fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self { rows }
    }

    /// Entry at `row`, `col`.
    ///
    /// Panics if either index is `>= 4`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in self.rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                out[c][r] = *v;
            }
        }
        Self { rows: out }
    }

    /// Translation part, assuming the column-vector convention (`M · [x y z 1]ᵀ`).
    pub fn translation(&self) -> [f64; 3] {
        [self.rows[0][3], self.rows[1][3], self.rows[2][3]]
    }

    /// Return `true` when every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.rows.iter().flatten().all(|v| v.is_finite())
    }

    /// Return `true` when every entry is within `eps` of `other`.
    pub fn abs_diff_eq(&self, other: &Self, eps: f64) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(other.rows.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Convert into a `glam` matrix with the same mathematical value.
    pub fn to_dmat4(&self) -> DMat4 {
        // glam takes columns; the columns of `self` are the rows of its transpose.
        DMat4::from_cols_array_2d(&self.transpose().rows)
    }

    /// Convert from a `glam` matrix with the same mathematical value.
    pub fn from_dmat4(m: DMat4) -> Self {
        Self::from_rows(m.to_cols_array_2d()).transpose()
    }

    /// General inverse, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        let m = self.to_dmat4();
        let det = m.determinant();
        if det.abs() <= f64::EPSILON || !det.is_finite() {
            return None;
        }
        Some(Self::from_dmat4(m.inverse()))
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Matrix4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::from_dmat4(self.to_dmat4() * rhs.to_dmat4())
    }
}

impl From<[[f64; 4]; 4]> for Matrix4 {
    fn from(rows: [[f64; 4]; 4]) -> Self {
        Self::from_rows(rows)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/matrix.rs"]
mod tests;

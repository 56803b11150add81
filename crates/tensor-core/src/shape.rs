// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors and dimension utilities.

use std::fmt;

/// Describes the dimensionality of a [`crate::Tensor`].
///
/// A dimension of `-1` is unresolved: the shape is dynamic until a resize
/// fills it in, and no buffer can be allocated for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<i64>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), Some(24));
    /// assert_eq!(Shape::new(vec![-1, 4]).num_elements(), None);
    /// ```
    pub fn new(dims: Vec<i64>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self {
            dims: vec![len as i64],
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<i64> {
        self.dims.get(index).copied()
    }

    /// Returns `true` if any dimension is unresolved.
    pub fn is_dynamic(&self) -> bool {
        self.dims.iter().any(|&d| d < 0)
    }

    /// Total element count, or `None` while the shape is dynamic.
    ///
    /// For a scalar shape (rank 0), returns 1.
    pub fn num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| {
            usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
        })
    }

    /// Memory footprint in bytes for a given [`crate::DType`].
    pub fn size_bytes(&self, dtype: crate::DType) -> Option<usize> {
        self.num_elements()?.checked_mul(dtype.size_bytes())
    }

    /// Row-major (C-order) strides, or `None` while the shape is dynamic.
    pub fn strides(&self) -> Option<Vec<usize>> {
        if self.is_dynamic() {
            return None;
        }
        let rank = self.dims.len();
        let mut strides = vec![1usize; rank];
        for i in (0..rank.saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1] as usize;
        }
        Some(strides)
    }

    /// Applies a dimension permutation: `out[i] = self[perm[i]]`.
    pub fn permute(&self, perm: &[usize]) -> Self {
        Self {
            dims: perm.iter().map(|&p| self.dims[p]).collect(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if *d < 0 {
                write!(f, "?")?;
            } else {
                write!(f, "{d}")?;
            }
        }
        write!(f, "]")
    }
}

/// Convenience: `Shape::from(vec![2, 3])`.
impl From<Vec<i64>> for Shape {
    fn from(dims: Vec<i64>) -> Self {
        Self::new(dims)
    }
}

impl From<&[i64]> for Shape {
    fn from(dims: &[i64]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.iter().map(|&d| d as i64).collect())
    }
}

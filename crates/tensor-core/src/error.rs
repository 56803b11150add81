// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::{DType, Format, Shape, TensorId};

/// Errors that can occur during tensor operations.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer size does not match the size implied by shape and dtype.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// The number of provided values does not match the shape.
    #[error("element count mismatch: shape holds {expected} elements, got {actual}")]
    ElementCount { expected: usize, actual: usize },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// A typed accessor was used with the wrong element type.
    #[error("dtype mismatch in {op}: tensor is {actual}, requested {expected}")]
    DTypeMismatch {
        op: &'static str,
        expected: DType,
        actual: DType,
    },

    /// The layout conversion is not implemented for this rank or pair.
    #[error("cannot convert layout {from} -> {to} for rank-{rank} tensor")]
    UnsupportedFormat { from: Format, to: Format, rank: usize },

    /// The shape still contains an unresolved `-1` dimension.
    #[error("tensor '{name}' has dynamic shape {shape}")]
    DynamicShape { name: String, shape: Shape },

    /// The tensor has no backing buffer.
    #[error("tensor '{name}' has no data")]
    NoData { name: String },

    /// A list operation was applied to a dense tensor.
    #[error("tensor '{name}' is not a tensor list")]
    NotAList { name: String },

    /// In-place mutation was requested on a buffer other tensors still share.
    #[error("tensor '{name}' shares its buffer; in-place mutation refused")]
    SharedBuffer { name: String },

    /// An arena index is out of range.
    #[error("tensor id {id} out of range (arena holds {len})")]
    InvalidId { id: TensorId, len: usize },

    /// The allocator refused the request.
    #[error(transparent)]
    Allocation(#[from] memory_manager::MemoryError),
}

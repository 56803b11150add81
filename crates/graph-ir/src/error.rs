// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph loading and validation.

use tensor_core::TensorId;

/// Errors that can occur when building or loading a kernel graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The manifest or weight file could not be read.
    #[error("failed to read graph file: {0}")]
    ManifestReadError(#[from] std::io::Error),

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    /// A name in the manifest does not resolve.
    #[error("{kind} '{name}' referenced by '{referrer}' is not defined")]
    UnknownReference {
        kind: &'static str,
        name: String,
        referrer: String,
    },

    /// A const tensor's data is absent from the weight file.
    #[error("weight tensor not found: {name}")]
    WeightNotFound { name: String },

    /// The SafeTensors file could not be loaded.
    #[error("failed to load SafeTensors: {0}")]
    SafeTensorsError(String),

    /// A tensor index is outside the graph's tensor table.
    #[error("tensor {id} referenced by '{referrer}' out of range (graph has {len} tensors)")]
    TensorOutOfRange {
        id: TensorId,
        referrer: String,
        len: usize,
    },

    /// A tensor definition is inconsistent.
    #[error("invalid tensor '{tensor}': {detail}")]
    InvalidTensor { tensor: String, detail: String },

    /// A node definition is inconsistent.
    #[error("invalid node '{node}': {detail}")]
    InvalidNode { node: String, detail: String },

    /// The graph as a whole is malformed.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
}

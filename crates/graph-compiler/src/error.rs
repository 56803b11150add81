// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph compilation.

use tensor_core::TensorId;

/// Errors that can occur while compiling a kernel graph into actors.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A tensor index points outside the tensor table.
    #[error("'{referrer}' references tensor {id}, graph has {len} tensors")]
    TensorOutOfRange {
        id: TensorId,
        referrer: String,
        len: usize,
    },

    /// Two nodes (or a node and the graph boundary) write the same tensor.
    #[error("tensor '{tensor}' has two producers: '{first}' and '{second}'")]
    TwoProducers {
        tensor: String,
        first: String,
        second: String,
    },

    /// A consumed tensor is never written.
    #[error("tensor '{tensor}' consumed by '{consumer}' has no producer")]
    NoProducer { tensor: String, consumer: String },

    /// A closure tensor read as data by a kernel.
    #[error("'{consumer}' reads closure '{tensor}' as data")]
    ClosureAsData { tensor: String, consumer: String },

    /// A `Call` whose closure was not produced by a `Partial`.
    #[error("call '{call}' does not consume a partial closure")]
    CallWithoutPartial { call: String },

    #[error("call '{call}' passes {actual} arguments, subgraph '{subgraph}' takes {expected}")]
    ArgumentCountMismatch {
        call: String,
        subgraph: String,
        expected: usize,
        actual: usize,
    },

    #[error("call '{call}' expects {actual} results, subgraph '{subgraph}' returns {expected}")]
    ResultCountMismatch {
        call: String,
        subgraph: String,
        expected: usize,
        actual: usize,
    },

    /// A subgraph calls itself, directly or indirectly.
    #[error("call '{call}' re-enters subgraph '{subgraph}'")]
    RecursiveSubgraph { call: String, subgraph: String },

    #[error("call '{call}' exceeds the maximum call depth of {limit}")]
    CallDepthExceeded { call: String, limit: usize },

    /// Actors depend on each other's outputs in a loop.
    #[error("dataflow cycle through actor '{actor}'")]
    Cycle { actor: String },
}

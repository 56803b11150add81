// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the buffer allocator.

/// Errors raised by allocators and budget parsing.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The allocation would push live bytes past the allocator's capacity.
    #[error("out of memory: requested {requested_bytes} bytes, {available_bytes} available (capacity {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    /// Zero-byte allocations are rejected; empty tensors carry no buffer.
    #[error("cannot allocate zero-sized buffer")]
    ZeroSizedAllocation,

    /// A budget string could not be parsed.
    #[error("invalid memory budget '{input}': {reason}")]
    InvalidBudget { input: String, reason: String },
}

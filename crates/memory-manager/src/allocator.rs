// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The allocator capability consumed by tensors.
//!
//! An allocator hands out [`BufferGuard`]s. Releasing a buffer is dropping
//! its last handle; per-buffer reference counting is therefore the strong
//! count of the shared handle the tensor layer wraps guards in.
//!
//! The [`AllocatorKind`] replaces the two sentinel reference counts of the
//! classic lite runtime (one marking statically planned memory, one marking
//! runtime-managed memory). Generic refcount logic in the tensor layer must
//! never reclaim buffers from a `Static` or `Runtime` allocator.

use crate::{AllocationStats, BufferGuard, MemoryError};
use std::fmt;

/// Who is responsible for reclaiming buffers from an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorKind {
    /// Buffers are reclaimed by tensor reference counting.
    Generic,
    /// Statically planned memory; lives as long as the graph.
    Static,
    /// Managed by the runtime itself; released at run teardown only.
    Runtime,
}

impl AllocatorKind {
    /// Returns `true` if tensor refcounting may free buffers of this kind.
    pub fn is_refcount_managed(self) -> bool {
        matches!(self, Self::Generic)
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generic => "generic",
            Self::Static => "static",
            Self::Runtime => "runtime",
        })
    }
}

/// Buffer allocation capability.
///
/// Implementations must be shareable across actor worker threads.
pub trait Allocator: Send + Sync + fmt::Debug {
    /// Allocates a zeroed buffer of `size_bytes`.
    fn malloc(&self, size_bytes: usize) -> Result<BufferGuard, MemoryError>;

    /// The reclamation policy for buffers from this allocator.
    fn kind(&self) -> AllocatorKind;

    /// Bytes currently handed out and not yet returned.
    fn allocated_bytes(&self) -> usize;

    /// Snapshot of cumulative allocator statistics.
    fn stats(&self) -> AllocationStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount_managed() {
        assert!(AllocatorKind::Generic.is_refcount_managed());
        assert!(!AllocatorKind::Static.is_refcount_managed());
        assert!(!AllocatorKind::Runtime.is_refcount_managed());
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&AllocatorKind::Runtime).unwrap();
        assert_eq!(json, "\"runtime\"");
        let back: AllocatorKind = serde_json::from_str("\"static\"").unwrap();
        assert_eq!(back, AllocatorKind::Static);
    }
}

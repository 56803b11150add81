// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! The allocator capability behind tensor buffers in the actor runtime.
//!
//! - [`Allocator`]: the trait tensors malloc through, plus
//!   [`AllocatorKind`] which says whether refcounting may reclaim a buffer.
//! - [`MemoryPool`]: capacity-enforced pool with a size-class free list.
//! - [`BufferGuard`]: RAII handle; dropping it returns the buffer.
//! - [`MemoryBudget`]: capacity with human-readable parsing (`"64M"`).
//! - [`AllocationStats`]: reuse, peak and leak counters.
//!
//! # Ownership Model
//!
//! ```text
//! MemoryPool::malloc(size) ──► BufferGuard ──(shared by tensors)──► last drop
//!                                                                     │
//!                                   PoolInner::return_buffer ◄────────┘
//! ```
//!
//! ```
//! use memory_manager::{Allocator, MemoryBudget, MemoryPool};
//!
//! let pool = MemoryPool::new(MemoryBudget::from_mb(1));
//! let a = pool.malloc(512).unwrap();
//! let b = pool.malloc(256).unwrap();
//! assert_eq!(pool.allocated_bytes(), 768);
//! drop((a, b));
//! assert_eq!(pool.stats().live_buffers(), 0);
//! ```

mod allocator;
mod budget;
mod error;
mod guard;
pub mod pool;
mod stats;

pub use allocator::{Allocator, AllocatorKind};
pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use guard::BufferGuard;
pub use pool::MemoryPool;
pub use stats::AllocationStats;

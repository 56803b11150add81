// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Capacity-enforced buffer pool.
//!
//! [`MemoryPool`] is the allocator every actor mallocs its output tensors
//! from. It:
//!
//! 1. Reserves bytes against its [`MemoryBudget`] atomically, so concurrent
//!    actors on different worker threads cannot jointly overshoot it.
//! 2. Keeps returned buffers in a free list binned by power-of-two size
//!    class, so steady-state runs reuse buffers instead of hitting the heap.
//! 3. Records [`AllocationStats`] used to prove that repeated runs do not
//!    grow memory.

use crate::{AllocationStats, Allocator, AllocatorKind, BufferGuard, MemoryBudget, MemoryError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Smallest size class handed out from the free list.
const MIN_SIZE_CLASS: usize = 4096;

/// State shared between the pool and its outstanding guards.
pub struct PoolInner {
    budget: MemoryBudget,
    kind: AllocatorKind,
    allocated_bytes: AtomicUsize,
    free_buffers: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    free_list_bytes: AtomicUsize,
    stats: Mutex<AllocationStats>,
}

impl PoolInner {
    /// Takes a buffer back from a dropped [`BufferGuard`].
    pub(crate) fn return_buffer(&self, buffer: Vec<u8>, size_bytes: usize) {
        self.allocated_bytes.fetch_sub(size_bytes, Ordering::AcqRel);

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_deallocation();
        }

        let class = size_class_for(size_bytes);
        self.free_list_bytes.fetch_add(buffer.capacity(), Ordering::AcqRel);
        if let Ok(mut free) = self.free_buffers.lock() {
            free.entry(class).or_default().push(buffer);
        }
    }

    /// Atomically reserves `size_bytes` against the budget.
    fn reserve(&self, size_bytes: usize) -> Result<usize, MemoryError> {
        let capacity = self.budget.as_bytes();
        let mut current = self.allocated_bytes.load(Ordering::Acquire);
        loop {
            if !self.budget.fits(current, size_bytes) {
                return Err(MemoryError::OutOfMemory {
                    requested_bytes: size_bytes,
                    available_bytes: capacity.saturating_sub(current),
                    budget_bytes: capacity,
                });
            }
            match self.allocated_bytes.compare_exchange_weak(
                current,
                current + size_bytes,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(current + size_bytes),
                Err(observed) => current = observed,
            }
        }
    }

    fn take_cached(&self, size_bytes: usize) -> Option<Vec<u8>> {
        let class = size_class_for(size_bytes);
        let mut free = self.free_buffers.lock().ok()?;
        let mut buf = free.get_mut(&class)?.pop()?;
        self.free_list_bytes.fetch_sub(buf.capacity(), Ordering::AcqRel);
        // The class may hold a larger buffer than asked for; hand out exactly
        // `size_bytes`, zeroed.
        buf.clear();
        buf.resize(size_bytes, 0);
        Some(buf)
    }
}

/// The buffer allocator used by tensors.
///
/// ```
/// use memory_manager::{Allocator, MemoryBudget, MemoryPool};
///
/// let pool = MemoryPool::new(MemoryBudget::from_mb(4));
/// let guard = pool.malloc(16).unwrap();
/// assert_eq!(pool.allocated_bytes(), 16);
/// drop(guard);
/// assert_eq!(pool.allocated_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl MemoryPool {
    /// Creates a refcount-managed pool with the given capacity.
    pub fn new(budget: MemoryBudget) -> Self {
        Self::with_kind(budget, AllocatorKind::Generic)
    }

    /// Creates a pool whose buffers follow the given reclamation policy.
    pub fn with_kind(budget: MemoryBudget, kind: AllocatorKind) -> Self {
        tracing::debug!("memory pool created: {budget} ({kind})");
        Self {
            inner: Arc::new(PoolInner {
                budget,
                kind,
                allocated_bytes: AtomicUsize::new(0),
                free_buffers: Mutex::new(HashMap::new()),
                free_list_bytes: AtomicUsize::new(0),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Allocates `size_bytes`, reusing a cached buffer when one fits.
    pub fn allocate(&self, size_bytes: usize) -> Result<BufferGuard, MemoryError> {
        if size_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }

        let live = match self.inner.reserve(size_bytes) {
            Ok(live) => live,
            Err(e) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_oom();
                }
                return Err(e);
            }
        };

        let cached = self.inner.take_cached(size_bytes);
        let hit = cached.is_some();
        let data = cached.unwrap_or_else(|| vec![0u8; size_bytes]);

        if let Ok(mut stats) = self.inner.stats.lock() {
            if hit {
                stats.record_cache_hit(size_bytes);
            } else {
                stats.record_cache_miss(size_bytes);
            }
            stats.update_peak(live);
        }

        Ok(BufferGuard::new(data, Arc::clone(&self.inner), size_bytes))
    }

    /// Bytes left before the budget is exhausted.
    pub fn available_bytes(&self) -> usize {
        self.inner
            .budget
            .as_bytes()
            .saturating_sub(self.allocated_bytes())
    }

    /// The pool's capacity.
    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    /// Drops every cached free buffer. Live buffers are unaffected.
    pub fn shrink(&self) {
        if let Ok(mut free) = self.inner.free_buffers.lock() {
            free.clear();
            self.inner.free_list_bytes.store(0, Ordering::Release);
        }
    }

    /// Bytes held in the free list.
    pub fn free_list_bytes(&self) -> usize {
        self.inner.free_list_bytes.load(Ordering::Acquire)
    }
}

impl Allocator for MemoryPool {
    fn malloc(&self, size_bytes: usize) -> Result<BufferGuard, MemoryError> {
        self.allocate(size_bytes)
    }

    fn kind(&self) -> AllocatorKind {
        self.inner.kind
    }

    fn allocated_bytes(&self) -> usize {
        self.inner.allocated_bytes.load(Ordering::Acquire)
    }

    fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

/// Smallest power of two that is `>= size` and `>= MIN_SIZE_CLASS`.
fn size_class_for(size: usize) -> usize {
    size.max(MIN_SIZE_CLASS).next_power_of_two()
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("budget", &self.inner.budget)
            .field("kind", &self.inner.kind)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("free_list_bytes", &self.free_list_bytes())
            .finish()
    }
}

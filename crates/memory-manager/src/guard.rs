// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII handle for a pooled buffer.
//!
//! Dropping a [`BufferGuard`] is the only way memory goes back to its pool,
//! so a buffer is returned exactly once: the guard is moved, never copied.

use crate::pool::PoolInner;
use std::sync::Arc;

/// A buffer on loan from a [`MemoryPool`](crate::MemoryPool).
pub struct BufferGuard {
    // `Option` so `drop` can move the buffer out.
    data: Option<Vec<u8>>,
    pool: Arc<PoolInner>,
    size_bytes: usize,
}

impl BufferGuard {
    pub(crate) fn new(data: Vec<u8>, pool: Arc<PoolInner>, size_bytes: usize) -> Self {
        Self {
            data: Some(data),
            pool,
            size_bytes,
        }
    }

    /// Read access to the bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Write access to the bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }

    /// Size accounted against the pool.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        if let Some(buffer) = self.data.take() {
            self.pool.return_buffer(buffer, self.size_bytes);
        }
    }
}

impl std::fmt::Debug for BufferGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferGuard")
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cumulative allocator statistics.
//!
//! The runtime's leak checks rely on these counters: after a run and after
//! the caller drops its outputs, `live_buffers()` must be back to zero.

/// Counters describing how a pool has been used.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Allocation requests, including failed ones.
    pub total_allocations: u64,
    /// Requests served from the free list.
    pub cache_hits: u64,
    /// Requests that needed fresh heap memory.
    pub cache_misses: u64,
    /// Requests rejected because of the capacity ceiling.
    pub oom_count: u64,
    /// High-water mark of live bytes.
    pub peak_allocated_bytes: usize,
    /// Sum of all successfully allocated sizes.
    pub cumulative_allocated_bytes: u64,
    /// Buffers returned to the pool.
    pub total_deallocations: u64,
}

impl AllocationStats {
    /// Fraction of successful allocations served from the free list.
    pub fn cache_hit_ratio(&self) -> f64 {
        let served = self.cache_hits + self.cache_misses;
        if served == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / served as f64
    }

    /// Buffers handed out and not yet returned.
    pub fn live_buffers(&self) -> u64 {
        (self.cache_hits + self.cache_misses).saturating_sub(self.total_deallocations)
    }

    pub(crate) fn record_cache_hit(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cache_hits += 1;
        self.cumulative_allocated_bytes += size as u64;
    }

    pub(crate) fn record_cache_miss(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cache_misses += 1;
        self.cumulative_allocated_bytes += size as u64;
    }

    pub(crate) fn record_oom(&mut self) {
        self.total_allocations += 1;
        self.oom_count += 1;
    }

    pub(crate) fn record_deallocation(&mut self) {
        self.total_deallocations += 1;
    }

    pub(crate) fn update_peak(&mut self, live_bytes: usize) {
        self.peak_allocated_bytes = self.peak_allocated_bytes.max(live_bytes);
    }

    /// One-line description for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{} allocations ({} reused, {:.0}% hit rate), {} returned, {} live, {} OOM, peak {} bytes",
            self.total_allocations,
            self.cache_hits,
            self.cache_hit_ratio() * 100.0,
            self.total_deallocations,
            self.live_buffers(),
            self.oom_count,
            self.peak_allocated_bytes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let mut s = AllocationStats::default();
        assert_eq!(s.cache_hit_ratio(), 0.0);
        s.record_cache_miss(10);
        s.record_cache_hit(10);
        s.record_cache_hit(10);
        assert!((s.cache_hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.cumulative_allocated_bytes, 30);
    }

    #[test]
    fn test_live_buffers_ignores_oom() {
        let mut s = AllocationStats::default();
        s.record_cache_miss(10);
        s.record_oom();
        assert_eq!(s.live_buffers(), 1);
        s.record_deallocation();
        assert_eq!(s.live_buffers(), 0);
    }

    #[test]
    fn test_summary() {
        let mut s = AllocationStats::default();
        s.record_cache_miss(64);
        s.update_peak(64);
        let text = s.summary();
        assert!(text.contains("1 allocations"));
        assert!(text.contains("1 live"));
        assert!(text.contains("peak 64 bytes"));
    }
}

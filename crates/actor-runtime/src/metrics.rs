// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Run profiling metrics.
//!
//! [`RunMetrics`] collects per-actor kernel timings and aggregate run data.
//! Actors report in completion order, which differs between runs whenever
//! independent actors execute in parallel.

use std::time::Duration;

/// One kernel execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActorMetrics {
    pub actor: String,
    pub op: String,
    /// Input binding, kernel and output routing.
    pub duration: Duration,
}

/// Aggregate metrics for one run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunMetrics {
    pub run_id: u64,
    /// Wall-clock time from dispatch to quiescence.
    pub total_duration: Duration,
    /// Actors in the compiled graph.
    pub num_actors: usize,
    /// Actors that executed in this run.
    pub actors_executed: usize,
    /// Pool high-water mark in bytes, across the engine's lifetime.
    pub peak_pool_bytes: usize,
    /// Per-actor timings; empty when profiling is disabled.
    pub actor_metrics: Vec<ActorMetrics>,
}

impl RunMetrics {
    pub fn new(run_id: u64, num_actors: usize) -> Self {
        Self {
            run_id,
            total_duration: Duration::ZERO,
            num_actors,
            actors_executed: 0,
            peak_pool_bytes: 0,
            actor_metrics: Vec::new(),
        }
    }

    pub fn record_actor(&mut self, actor: String, op: String, duration: Duration) {
        self.actor_metrics.push(ActorMetrics {
            actor,
            op,
            duration,
        });
    }

    /// Finalises metrics with the total wall-clock time and the pool peak.
    pub fn finalise(&mut self, total: Duration, actors_executed: usize, peak_pool_bytes: usize) {
        self.total_duration = total;
        self.actors_executed = actors_executed;
        self.peak_pool_bytes = peak_pool_bytes;
    }

    /// Sum of per-actor durations. Exceeds the total when actors overlap.
    pub fn total_actor_duration(&self) -> Duration {
        self.actor_metrics.iter().map(|m| m.duration).sum()
    }

    pub fn slowest_actor(&self) -> Option<&ActorMetrics> {
        self.actor_metrics.iter().max_by_key(|m| m.duration)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_pool_bytes as f64 / 1024.0;
        let slowest = self
            .slowest_actor()
            .map(|m| format!(", slowest '{}' {:.3}ms", m.actor, m.duration.as_secs_f64() * 1000.0))
            .unwrap_or_default();
        format!(
            "Run {}: {:.3}ms total, {}/{} actors executed, {:.3}ms in kernels, peak pool {:.1} KB{}",
            self.run_id,
            self.total_duration.as_secs_f64() * 1000.0,
            self.actors_executed,
            self.num_actors,
            self.total_actor_duration().as_secs_f64() * 1000.0,
            peak_kb,
            slowest,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let m = RunMetrics::new(1, 3);
        assert_eq!(m.total_actor_duration(), Duration::ZERO);
        assert!(m.slowest_actor().is_none());
        assert_eq!(m.num_actors, 3);
    }

    #[test]
    fn test_record_and_finalise() {
        let mut m = RunMetrics::new(7, 2);
        m.record_actor("a".into(), "identity".into(), Duration::from_millis(5));
        m.record_actor("b".into(), "add".into(), Duration::from_millis(8));
        m.finalise(Duration::from_millis(20), 2, 4096);

        assert_eq!(m.total_actor_duration(), Duration::from_millis(13));
        assert_eq!(m.slowest_actor().unwrap().actor, "b");
        assert_eq!(m.actors_executed, 2);
        assert_eq!(m.peak_pool_bytes, 4096);
    }

    #[test]
    fn test_summary_format() {
        let mut m = RunMetrics::new(3, 1);
        m.record_actor("only".into(), "scale".into(), Duration::from_millis(1));
        m.finalise(Duration::from_millis(2), 1, 2048);
        let s = m.summary();
        assert!(s.starts_with("Run 3:"));
        assert!(s.contains("1/1 actors executed"));
        assert!(s.contains("slowest 'only'"));
        assert!(s.contains("2.0 KB"));
    }

    #[test]
    fn test_serialises() {
        let m = RunMetrics::new(1, 0);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"run_id\":1"));
    }
}

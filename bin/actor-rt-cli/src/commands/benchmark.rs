// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `actor-rt benchmark` command: sweep across worker thread counts.
//!
//! Runs the graph repeatedly for each configuration and prints a comparison
//! table of latency percentiles and pool reuse.

use actor_runtime::{Engine, KernelRegistry, RuntimeConfig};
use graph_compiler::CompiledGraph;
use std::time::Duration;
use tensor_core::Tensor;

pub async fn execute(
    config: RuntimeConfig,
    iterations: usize,
    sweep_threads: String,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            actor-rt · Benchmark Suite               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let thread_counts: Vec<usize> = sweep_threads
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("invalid thread count '{}': {e}", s.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let iterations = iterations.max(1);

    println!("  Graph:      {}", config.graph_path.display());
    println!("  Threads:    {thread_counts:?}");
    println!("  Iterations: {iterations}");
    println!();

    // ── Results Table ──────────────────────────────────────────
    println!(
        "  {:<8} {:>10} {:>10} {:>10} {:>10} {:>8} {:>10}",
        "Threads", "Mean", "p50", "p99", "Max", "Misses", "Hit rate",
    );
    println!("  {}", "-".repeat(74));

    let mut results: Vec<BenchResult> = Vec::new();
    for &threads in &thread_counts {
        let config = RuntimeConfig {
            num_threads: Some(threads),
            ..config.clone()
        };
        match run_single(config, iterations).await {
            Ok(r) => {
                println!(
                    "  {:<8} {:>8.3}ms {:>8.3}ms {:>8.3}ms {:>8.3}ms {:>8} {:>9.1}%",
                    threads, r.mean_ms, r.p50_ms, r.p99_ms, r.max_ms, r.cache_misses, r.hit_rate * 100.0,
                );
                results.push(r);
            }
            Err(e) => println!("  {threads:<8}     FAILED: {e}"),
        }
    }
    println!();

    // ── Summary ────────────────────────────────────────────────
    let Some(fastest) = results
        .iter()
        .min_by(|a, b| a.mean_ms.total_cmp(&b.mean_ms))
    else {
        println!("  No successful benchmark runs.");
        return Ok(());
    };
    println!("  Summary:");
    println!(
        "   Fastest: {} threads ({:.3}ms mean)",
        fastest.threads, fastest.mean_ms
    );
    println!();

    Ok(())
}

#[derive(Debug)]
struct BenchResult {
    threads: usize,
    mean_ms: f64,
    p50_ms: f64,
    p99_ms: f64,
    max_ms: f64,
    cache_misses: u64,
    hit_rate: f64,
}

/// Runs one configuration: a warm-up run, then `iterations` timed runs.
async fn run_single(config: RuntimeConfig, iterations: usize) -> anyhow::Result<BenchResult> {
    let threads = config.resolve_threads();
    let engine = Engine::new(config)
        .load()?
        .prepare(&KernelRegistry::with_builtins())?;
    let inputs = || ramp_inputs(engine.compiled());

    // Warm up: run once to populate free lists.
    drop(engine.run(inputs()?).await?);

    let mut latencies: Vec<Duration> = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let output = engine.run(inputs()?).await?;
        latencies.push(output.metrics.total_duration);
    }
    latencies.sort_unstable();

    let ms = |d: Duration| d.as_secs_f64() * 1000.0;
    let pick = |q: f64| {
        let index = ((latencies.len() - 1) as f64 * q).round() as usize;
        ms(latencies[index])
    };
    let mean_ms = latencies.iter().map(|d| ms(*d)).sum::<f64>() / latencies.len() as f64;
    let stats = engine.terminate();

    Ok(BenchResult {
        threads,
        mean_ms,
        p50_ms: pick(0.5),
        p99_ms: pick(0.99),
        max_ms: pick(1.0),
        cache_misses: stats.cache_misses,
        hit_rate: stats.cache_hit_ratio(),
    })
}

/// One tensor per graph input, filled with 0, 1, 2, ...
fn ramp_inputs(compiled: &CompiledGraph) -> anyhow::Result<Vec<Tensor>> {
    (0..compiled.inputs.len())
        .map(|position| {
            let len = super::default_len(compiled, position);
            let values: Vec<f64> = (0..len).map(|i| i as f64).collect();
            super::make_input(compiled, position, &values)
        })
        .collect()
}

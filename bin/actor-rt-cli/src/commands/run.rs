// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `actor-rt run` command: execute a graph once.
//!
//! Demonstrates the full type-state pipeline:
//! ```text
//! Engine<Idle> → load → <Compiled> → prepare → <Ready> → run
//! ```

use actor_runtime::{Engine, KernelRegistry, RunOutput, RuntimeConfig};
use std::collections::HashMap;

pub async fn execute(config: RuntimeConfig, inputs: Vec<String>) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              actor-rt · Graph Runner                ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    println!("  Config:");
    println!("   Graph:    {}", config.graph_path.display());
    println!("   Budget:   {}", config.memory_budget);
    println!("   Threads:  {}", config.resolve_threads());
    println!("   Dispatch: {}", config.dispatch);
    println!();

    let mut provided: HashMap<String, Vec<f64>> = HashMap::new();
    for arg in &inputs {
        let (name, values) = super::parse_input(arg)?;
        provided.insert(name, values);
    }

    // Step 1: Idle → Compiled (load + compile into actors and arrows).
    println!("  [1/3] Loading and compiling graph...");
    let compiled = Engine::new(config).load().map_err(|e| anyhow::anyhow!("{e} (status {})", e.status()))?;
    println!("        {}", compiled.compiled().summary());
    println!();

    // Step 2: Compiled → Ready (kernels, pool, actors).
    println!("  [2/3] Starting actors...");
    let ready = compiled.prepare(&KernelRegistry::with_builtins())?;
    println!("        Actors ready.");
    println!();

    // Step 3: Ready → Run.
    println!("  [3/3] Running...");
    let graph = ready.compiled();
    let mut tensors = Vec::with_capacity(graph.inputs.len());
    for (position, spec) in graph.inputs.iter().enumerate() {
        let name = graph
            .tensor(spec.tensor)
            .map(|def| def.name.clone())
            .unwrap_or_default();
        let values = match provided.remove(&name) {
            Some(values) => values,
            None => {
                let len = super::default_len(graph, position);
                tracing::warn!("no values for input '{name}', using {len} ones");
                vec![1.0; len]
            }
        };
        tensors.push(super::make_input(graph, position, &values)?);
    }
    for name in provided.keys() {
        tracing::warn!("graph has no input named '{name}'");
    }

    let output = match ready.run(tensors).await {
        Ok(output) => output,
        Err(e) => anyhow::bail!("run failed with status {}: {e}", e.status()),
    };
    println!();
    print_results(&output)?;

    let stats = ready.terminate();
    println!("  Pool Stats:");
    println!("   {}", stats.summary());
    Ok(())
}

fn print_results(output: &RunOutput) -> anyhow::Result<()> {
    println!("  Outputs:");
    for tensor in &output.outputs {
        let values = tensor.to_f64_vec()?;
        let shown: Vec<String> = values.iter().take(8).map(|v| format!("{v}")).collect();
        println!(
            "   {:<16} {} {} [{}{}]",
            super::truncate(tensor.name(), 16),
            tensor.dtype(),
            tensor.shape(),
            shown.join(", "),
            if values.len() > 8 { ", ..." } else { "" },
        );
    }
    println!();
    println!("  Metrics:");
    println!("   {}", output.metrics.summary());
    for m in &output.metrics.actor_metrics {
        println!(
            "     {:<24} {:<12} {:>8.3} ms",
            super::truncate(&m.actor, 24),
            m.op,
            m.duration.as_secs_f64() * 1000.0
        );
    }
    println!();
    Ok(())
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `actor-rt inspect` command: display the compiled actor graph.
//!
//! Loads and compiles the manifest without starting any actor, then prints
//! every actor with its input sources and arrows, the graph outputs, and
//! the tensors private to each call site.

use actor_runtime::RuntimeConfig;
use graph_compiler::{GraphCompiler, OutputSource, SlotSource};
use graph_ir::GraphLoader;

pub async fn execute(config: RuntimeConfig, json: bool) -> anyhow::Result<()> {
    let graph = GraphLoader::load(&config.graph_path).map_err(|e| {
        anyhow::anyhow!("failed to load graph from '{}': {e}", config.graph_path.display())
    })?;
    let compiled = GraphCompiler::new(config.max_call_depth).compile(&graph)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║             actor-rt · Graph Inspector              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Summary ────────────────────────────────────────────────
    println!("  {}", graph.summary());
    println!("  {}", compiled.summary());
    println!();

    // ── Actors ─────────────────────────────────────────────────
    println!(
        "  {:<4} {:<28} {:<12} {:>6} {:>7} {:>6}",
        "Id", "Name", "Op", "Waits", "Arrows", "Start",
    );
    println!("  {}", "-".repeat(68));
    for actor in &compiled.actors {
        println!(
            "  {:<4} {:<28} {:<12} {:>6} {:>7} {:>6}",
            actor.id.to_string(),
            super::truncate(&actor.name, 28),
            actor.op,
            actor.required_inputs(),
            actor.arrows.len(),
            if actor.is_initial() { "yes" } else { "" },
        );
        for (slot, input) in actor.inputs.iter().enumerate() {
            let source = match input.source {
                SlotSource::Actor { actor, tensor } => format!("{tensor} from {actor}"),
                SlotSource::GraphInput { position, tensor } => {
                    format!("{tensor} graph input {position}")
                }
                SlotSource::Const { tensor } => format!("{tensor} const"),
            };
            println!(
                "         in[{slot}] {source}{}",
                if input.isolated { " (isolated)" } else { "" }
            );
        }
        for arrow in &actor.arrows {
            println!("         {arrow}");
        }
    }
    println!();

    // ── Outputs ────────────────────────────────────────────────
    println!("  Outputs:");
    for (source, name) in compiled.outputs.iter().zip(&compiled.output_names) {
        let from = match source {
            OutputSource::Actor { actor, output_slot, .. } => format!("{actor} out[{output_slot}]"),
            OutputSource::GraphInput { position, .. } => format!("graph input {position}"),
            OutputSource::Const { tensor } => format!("const {tensor}"),
        };
        println!("   {name:<16} ← {from}");
    }
    println!();

    // ── Isolation ──────────────────────────────────────────────
    if !compiled.isolation.is_empty() {
        println!("  Call-site tensors:");
        for (private, origin) in &compiled.isolation {
            let name = compiled.tensor(*private).map(|d| d.name.as_str()).unwrap_or("?");
            println!("   {private:<5} {name:<28} copy of {origin}");
        }
        println!();
    }

    Ok(())
}

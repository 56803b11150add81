// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # actor-rt
//!
//! Command-line interface for the actor dataflow runtime.
//!
//! ## Usage
//! ```bash
//! # Run a graph once
//! actor-rt run --graph ./graphs/call.json --input x=1,2 --input y=10,20
//!
//! # Repeated runs with latency statistics
//! actor-rt benchmark --graph ./graphs/chain.json --iterations 500
//!
//! # Show the compiled actors and arrows
//! actor-rt inspect --graph ./graphs/call.json
//! ```

mod commands;

use actor_runtime::DispatchPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "actor-rt",
    about = "Actor-based dataflow scheduler for kernel graphs",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (CLI arguments override it).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a graph once and print its outputs.
    Run {
        /// Path to the graph manifest.
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Graph input values, e.g. `x=1,2,3`. Repeat per input.
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Memory budget (e.g., "64M", "1G").
        #[arg(short = 'b', long)]
        memory_budget: Option<String>,

        /// Worker threads for the actor pool.
        #[arg(short, long)]
        threads: Option<usize>,

        /// Output routing: inline or queued.
        #[arg(short, long)]
        dispatch: Option<DispatchPolicy>,
    },

    /// Run a graph repeatedly and report latency and pool reuse.
    Benchmark {
        /// Path to the graph manifest.
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Number of timed runs.
        #[arg(short = 'n', long, default_value_t = 100)]
        iterations: usize,

        /// Worker thread counts to sweep (comma-separated).
        #[arg(long, default_value = "1,2,4")]
        sweep_threads: String,
    },

    /// Compile a graph and print its actors, arrows and isolated tensors.
    Inspect {
        /// Path to the graph manifest.
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Print the compiled graph as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            graph,
            inputs,
            memory_budget,
            threads,
            dispatch,
        } => {
            let mut config = commands::load_config(cli.config.as_deref(), graph)?;
            if let Some(budget) = memory_budget {
                config.memory_budget = budget;
            }
            if threads.is_some() {
                config.num_threads = threads;
            }
            if let Some(dispatch) = dispatch {
                config.dispatch = dispatch;
            }
            commands::run::execute(config, inputs).await
        }
        Commands::Benchmark {
            graph,
            iterations,
            sweep_threads,
        } => {
            let config = commands::load_config(cli.config.as_deref(), graph)?;
            commands::benchmark::execute(config, iterations, sweep_threads).await
        }
        Commands::Inspect { graph, json } => {
            let config = commands::load_config(cli.config.as_deref(), graph)?;
            commands::inspect::execute(config, json).await
        }
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared helpers.

pub mod benchmark;
pub mod inspect;
pub mod run;

use actor_runtime::RuntimeConfig;
use graph_compiler::CompiledGraph;
use std::path::{Path, PathBuf};
use tensor_core::{Category, Shape, Tensor};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads the configuration file if given, then applies `--graph`.
pub fn load_config(path: Option<&Path>, graph: Option<PathBuf>) -> anyhow::Result<RuntimeConfig> {
    let mut config = match path {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(graph) = graph {
        config.graph_path = graph;
    }
    Ok(config)
}

/// Builds graph input `position` from a list of values.
///
/// A fully static declared shape is kept when the value count matches;
/// otherwise the values form a vector.
pub fn make_input(compiled: &CompiledGraph, position: usize, values: &[f64]) -> anyhow::Result<Tensor> {
    let spec = compiled
        .inputs
        .get(position)
        .ok_or_else(|| anyhow::anyhow!("graph has no input {position}"))?;
    let def = compiled
        .tensor(spec.tensor)
        .ok_or_else(|| anyhow::anyhow!("input {position} has no tensor"))?;

    let shape = match def.shape.num_elements() {
        Some(n) if n == values.len() => def.shape.clone(),
        _ => Shape::vector(values.len()),
    };
    let mut tensor = Tensor::new(def.name.clone(), def.dtype, shape, Category::GraphInput)
        .with_format(def.format);
    tensor.malloc_data(None)?;
    tensor.write_f64(values)?;
    Ok(tensor)
}

/// Element count of graph input `position`, with dynamic dimensions as 1.
pub fn default_len(compiled: &CompiledGraph, position: usize) -> usize {
    compiled
        .inputs
        .get(position)
        .and_then(|spec| compiled.tensor(spec.tensor))
        .map(|def| def.shape.dims().iter().map(|&d| d.max(1) as usize).product())
        .unwrap_or(1)
}

/// Parses `name=v1,v2,...`.
pub fn parse_input(arg: &str) -> anyhow::Result<(String, Vec<f64>)> {
    let (name, values) = arg
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected NAME=V1,V2,..., got '{arg}'"))?;
    let values = values
        .split(',')
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("bad value '{v}' for '{name}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((name.trim().to_string(), values))
}

/// Truncates a string with ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        let (name, values) = parse_input("x=1, 2.5,-3").unwrap();
        assert_eq!(name, "x");
        assert_eq!(values, vec![1.0, 2.5, -3.0]);
        assert!(parse_input("novalues").is_err());
        assert!(parse_input("x=1,abc").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-name", 8), "a-ver...");
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! graph_path = "./graphs/chain.json"
//! memory_budget = "64M"
//! num_threads = 4
//! dispatch = "inline"
//! enable_profiling = true
//! max_call_depth = 16
//! ```

use crate::RuntimeError;
use memory_manager::MemoryBudget;
use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::IntoDeserializer;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How an actor routes its outputs once its kernel has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Messages are sent from the producing actor's task.
    #[default]
    Inline,
    /// Messages are handed to a separate task (asynchronous output).
    #[serde(alias = "async")]
    Queued,
}

/// Accepts the same names as the TOML field, so CLI flags and config files
/// agree.
impl FromStr for DispatchPolicy {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let de: StrDeserializer<'_, ValueError> = s.into_deserializer();
        Self::deserialize(de)
            .map_err(|e| RuntimeError::ConfigError(format!("invalid dispatch policy: {e}")))
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => f.write_str("inline"),
            Self::Queued => f.write_str("queued"),
        }
    }
}

/// Configuration for the actor runtime.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Path to the JSON graph manifest.
    pub graph_path: PathBuf,
    /// Memory budget for run-time buffers (human-readable, e.g., `"64M"`).
    pub memory_budget: String,
    /// Number of worker threads (defaults to number of online CPU cores).
    pub num_threads: Option<usize>,
    /// Output routing policy: `"inline"` or `"queued"` (alias `"async"`).
    #[serde(default)]
    pub dispatch: DispatchPolicy,
    /// Whether to record per-actor execution times.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
    /// Limit on nested `Call`s.
    #[serde(default = "default_call_depth")]
    pub max_call_depth: usize,
}

fn default_true() -> bool {
    true
}

fn default_call_depth() -> usize {
    graph_compiler::DEFAULT_MAX_CALL_DEPTH
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Parses the memory budget string into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, RuntimeError> {
        MemoryBudget::parse(&self.memory_budget)
            .map_err(|e| RuntimeError::ConfigError(format!("invalid budget: {e}")))
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            graph_path: PathBuf::from("./graphs/chain.json"),
            memory_budget: "64M".to_string(),
            num_threads: None,
            dispatch: DispatchPolicy::default(),
            enable_profiling: true,
            max_call_depth: default_call_depth(),
        }
    }
}

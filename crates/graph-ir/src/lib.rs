// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! The static kernel graph the actor runtime executes.
//!
//! - [`TensorDef`]: one tensor of the graph: type, shape, layout, category
//!   and, for constants, its data.
//! - [`NodeDef`]: one kernel node with its input/output tensor bindings and
//!   a [`NodeKind`] tag (plain, `Partial` or `Call`).
//! - [`SubGraphDef`]: an ordered node list with declared inputs and outputs.
//!   Subgraph 0 is the main graph; the rest are reached through
//!   `Partial`/`Call` pairs.
//! - [`KernelGraph`]: the whole graph, with a **type-state pattern**
//!   (`Loaded` → `Validated`).
//! - [`GraphBuilder`]: programmatic construction.
//! - [`GraphLoader`]: loads a JSON manifest, optionally with const data in
//!   a SafeTensors file.
//!
//! # Example
//! ```no_run
//! use graph_ir::GraphLoader;
//! use std::path::Path;
//!
//! let graph = GraphLoader::load(Path::new("./graphs/chain.json")).unwrap();
//! println!("{}", graph.summary());
//! ```

mod builder;
mod error;
pub mod graph;
mod loader;
pub mod manifest;
mod node;
mod tensor_def;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use graph::{KernelGraph, Loaded, Validated};
pub use loader::GraphLoader;
pub use manifest::GraphManifest;
pub use node::{NodeDef, NodeKind, SubGraphDef};
pub use tensor_def::TensorDef;

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-compiler
//!
//! Turns a validated `KernelGraph` into the static wiring the actor
//! runtime executes.
//!
//! | Output | Meaning |
//! |---|---|
//! | [`ActorSpec`] | One kernel instance, with per-slot input sources |
//! | [`Arrow`] | Route from a producer output slot to a consumer input slot |
//! | [`GraphInputSpec`] | Actor slots fed by each graph input |
//! | [`OutputSource`] | Where each graph output comes from |
//! | isolation table | Private tensor copy → tensor it was copied from |
//!
//! `Partial`/`Call` pairs are resolved here: each call site gets its own
//! actors and private tensors, wired to the caller by forward edges (see
//! [`compiler`]). The runtime never sees a subgraph.
//!
//! # Example
//! ```no_run
//! use graph_compiler::GraphCompiler;
//! use graph_ir::GraphLoader;
//! use std::path::Path;
//!
//! let graph = GraphLoader::load(Path::new("./graphs/call.json")).unwrap();
//! let compiled = GraphCompiler::new(8).compile(&graph).unwrap();
//! for actor in compiled.initial_actors() {
//!     println!("{}", actor.summary());
//! }
//! ```

pub mod arrow;
mod compiled;
pub mod compiler;
mod error;

pub use arrow::{ActorId, Arrow, ArrowCompiler};
pub use compiled::{
    ActorSpec, CompiledGraph, GraphInputSpec, InputSlot, OutputSource, ResultIndex, SlotSource,
};
pub use compiler::{GraphCompiler, DEFAULT_MAX_CALL_DEPTH};
pub use error::CompileError;

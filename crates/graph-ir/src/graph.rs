// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel graph: tensors plus the subgraphs that read and write them.
//!
//! # Type-State Pattern
//!
//! ```text
//! KernelGraph<Loaded>      parsed or built, not yet checked.
//!       │  .validate()
//!       ▼
//! KernelGraph<Validated>   structurally sound, ready for compilation.
//! ```
//!
//! Validation covers what can be checked per declaration: tensor indices
//! in range, unique node names, well-formed `Partial`/`Call` nodes and
//! constant data sizes. Dataflow checks (producers, call arity, recursion)
//! belong to the graph compiler.

use crate::{GraphError, NodeKind, SubGraphDef, TensorDef};
use std::collections::HashSet;
use std::fmt;
use tensor_core::TensorId;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been loaded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and is ready for compilation.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── KernelGraph ────────────────────────────────────────────────────

/// A static kernel graph. Subgraph 0 is the main graph.
#[derive(Debug, Clone)]
pub struct KernelGraph<S: GraphState = Loaded> {
    pub name: String,
    /// Every tensor of every subgraph, indexed by [`TensorId`].
    pub tensors: Vec<TensorDef>,
    pub subgraphs: Vec<SubGraphDef>,
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl KernelGraph<Loaded> {
    pub fn new(name: String, tensors: Vec<TensorDef>, subgraphs: Vec<SubGraphDef>) -> Self {
        Self {
            name,
            tensors,
            subgraphs,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - There is a main subgraph.
    /// - Every tensor index is in range.
    /// - Node names are unique within a subgraph.
    /// - A `Partial` targets an existing subgraph other than the main one
    ///   and produces exactly one closure tensor.
    /// - A `Call` has a closure input.
    /// - Plain nodes name an operator.
    /// - Constants carry data matching their shape; non-constants carry none.
    pub fn validate(self) -> Result<KernelGraph<Validated>, GraphError> {
        if self.subgraphs.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "graph '{}' has no main subgraph",
                self.name
            )));
        }

        for def in &self.tensors {
            self.check_tensor(def)?;
        }

        for sg in &self.subgraphs {
            for &id in sg.inputs.iter().chain(&sg.outputs) {
                self.check_id(id, &sg.name)?;
            }

            let mut names = HashSet::new();
            for node in &sg.nodes {
                if !names.insert(node.name.as_str()) {
                    return Err(GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!("duplicate name in subgraph '{}'", sg.name),
                    });
                }
                for &id in node.inputs.iter().chain(&node.outputs) {
                    self.check_id(id, &node.name)?;
                }
                self.check_node_kind(node)?;
            }
        }

        tracing::debug!(
            "graph '{}' validated: {} tensors, {} subgraphs",
            self.name,
            self.tensors.len(),
            self.subgraphs.len()
        );

        Ok(KernelGraph {
            name: self.name,
            tensors: self.tensors,
            subgraphs: self.subgraphs,
            _state: std::marker::PhantomData,
        })
    }

    fn check_id(&self, id: TensorId, referrer: &str) -> Result<(), GraphError> {
        if id.0 >= self.tensors.len() {
            return Err(GraphError::TensorOutOfRange {
                id,
                referrer: referrer.to_string(),
                len: self.tensors.len(),
            });
        }
        Ok(())
    }

    fn check_tensor(&self, def: &TensorDef) -> Result<(), GraphError> {
        match (&def.data, def.is_const()) {
            (Some(bytes), true) => {
                let expected = def.shape.size_bytes(def.dtype).ok_or_else(|| {
                    GraphError::InvalidTensor {
                        tensor: def.name.clone(),
                        detail: format!("constant with dynamic shape {}", def.shape),
                    }
                })?;
                if bytes.len() != expected {
                    return Err(GraphError::InvalidTensor {
                        tensor: def.name.clone(),
                        detail: format!("expected {expected} data bytes, got {}", bytes.len()),
                    });
                }
                Ok(())
            }
            (None, true) => Err(GraphError::InvalidTensor {
                tensor: def.name.clone(),
                detail: "constant without data".into(),
            }),
            (Some(_), false) => Err(GraphError::InvalidTensor {
                tensor: def.name.clone(),
                detail: format!("{:?} tensor must not carry data", def.category),
            }),
            (None, false) => Ok(()),
        }
    }

    fn check_node_kind(&self, node: &crate::NodeDef) -> Result<(), GraphError> {
        let invalid = |detail: String| GraphError::InvalidNode {
            node: node.name.clone(),
            detail,
        };
        match node.kind {
            NodeKind::Plain if node.op.is_empty() => Err(invalid("no operator".into())),
            NodeKind::Plain => Ok(()),
            NodeKind::Partial { subgraph } => {
                if subgraph == 0 || subgraph >= self.subgraphs.len() {
                    return Err(invalid(format!(
                        "partial targets subgraph {subgraph}, graph has {}",
                        self.subgraphs.len()
                    )));
                }
                if node.outputs.len() != 1 {
                    return Err(invalid(format!(
                        "partial must produce one closure, found {} outputs",
                        node.outputs.len()
                    )));
                }
                Ok(())
            }
            NodeKind::Call if node.inputs.is_empty() => {
                Err(invalid("call without closure input".into()))
            }
            NodeKind::Call => Ok(()),
        }
    }
}

// ── Validated state ────────────────────────────────────────────────

impl KernelGraph<Validated> {
    /// The main subgraph.
    pub fn main(&self) -> &SubGraphDef {
        &self.subgraphs[0]
    }

    pub fn subgraph(&self, index: usize) -> Option<&SubGraphDef> {
        self.subgraphs.get(index)
    }

    pub fn tensor(&self, id: TensorId) -> Option<&TensorDef> {
        self.tensors.get(id.0)
    }

    /// Looks a tensor up by name.
    pub fn tensor_id(&self, name: &str) -> Option<TensorId> {
        self.tensors.iter().position(|t| t.name == name).map(TensorId)
    }

    pub fn inputs(&self) -> &[TensorId] {
        &self.main().inputs
    }

    pub fn outputs(&self) -> &[TensorId] {
        &self.main().outputs
    }

    /// Node count across all subgraphs.
    pub fn num_nodes(&self) -> usize {
        self.subgraphs.iter().map(|s| s.nodes.len()).sum()
    }

    /// Bytes of constant data held by the graph.
    pub fn const_bytes(&self) -> usize {
        self.tensors
            .iter()
            .filter_map(|t| t.data.as_ref().map(Vec::len))
            .sum()
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        format!(
            "Graph '{}': {} nodes in {} subgraphs, {} tensors, {} inputs, {} outputs, {} const bytes",
            self.name,
            self.num_nodes(),
            self.subgraphs.len(),
            self.tensors.len(),
            self.inputs().len(),
            self.outputs().len(),
            self.const_bytes(),
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for KernelGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KernelGraph '{}':", self.name)?;
        for (i, sg) in self.subgraphs.iter().enumerate() {
            writeln!(f, "  subgraph {i} '{}' ({} nodes):", sg.name, sg.nodes.len())?;
            for node in &sg.nodes {
                writeln!(f, "    {}", node.summary())?;
            }
        }
        Ok(())
    }
}

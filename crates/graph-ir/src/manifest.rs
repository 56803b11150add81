// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON graph manifest parsing.
//!
//! The manifest names tensors and subgraphs instead of indexing them; the
//! conversion to a [`KernelGraph`] resolves every name.
//!
//! # Format
//! ```json
//! {
//!   "name": "scaled-add",
//!   "weights_file": "weights.safetensors",
//!   "tensors": [
//!     { "name": "x", "dtype": "f32", "shape": [2], "category": "graph_input" },
//!     { "name": "w", "dtype": "f32", "shape": [2], "category": "const", "data": [1, 2] },
//!     { "name": "y", "dtype": "f32", "shape": [2], "category": "graph_output" }
//!   ],
//!   "subgraphs": [
//!     {
//!       "name": "main", "inputs": ["x"], "outputs": ["y"],
//!       "nodes": [
//!         { "name": "add", "op": "add", "inputs": ["x", "w"], "outputs": ["y"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Nodes default to `"kind": "plain"`. A `"partial"` node names its target
//! with `"subgraph"` (name or index); a `"call"` node's first input is the
//! closure. Constants either carry inline `data` or are read from
//! `weights_file` by tensor name.

use crate::{GraphError, KernelGraph, Loaded, NodeDef, NodeKind, SubGraphDef, TensorDef};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tensor_core::{Category, DType, Format, QuantParam, Shape, TensorId};

/// Top-level graph manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphManifest {
    pub name: String,
    /// SafeTensors file holding constant data, relative to the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_file: Option<String>,
    pub tensors: Vec<ManifestTensor>,
    pub subgraphs: Vec<ManifestSubGraph>,
}

/// A tensor entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestTensor {
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<i64>,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub category: Category,
    /// The tensor is a list of `dtype` × `shape` elements.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
    /// Inline constant values, converted to `dtype`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quant_params: Vec<QuantParam>,
}

/// A subgraph entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestSubGraph {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    pub nodes: Vec<ManifestNode>,
}

/// Node kind as spelled in the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestNodeKind {
    #[default]
    Plain,
    Partial,
    Call,
}

/// A subgraph named either by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum SubGraphRef {
    Index(usize),
    Name(String),
}

/// A node entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestNode {
    pub name: String,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub kind: ManifestNodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<SubGraphRef>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl GraphManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Checks name uniqueness and that a main subgraph exists.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.subgraphs.is_empty() {
            return Err(GraphError::InvalidGraph(
                "manifest contains no subgraphs".into(),
            ));
        }

        let mut seen = HashSet::new();
        for t in &self.tensors {
            if !seen.insert(t.name.as_str()) {
                return Err(GraphError::InvalidTensor {
                    tensor: t.name.clone(),
                    detail: "duplicate tensor name".into(),
                });
            }
        }

        let mut seen = HashSet::new();
        for sg in &self.subgraphs {
            if !seen.insert(sg.name.as_str()) {
                return Err(GraphError::InvalidGraph(format!(
                    "duplicate subgraph name '{}'",
                    sg.name
                )));
            }
        }
        Ok(())
    }

    /// Resolves names and builds the graph.
    ///
    /// Constants without inline data are left empty for the loader to fill
    /// from the weight file.
    pub fn into_graph(self) -> Result<KernelGraph<Loaded>, GraphError> {
        self.validate()?;

        let tensor_ids: HashMap<&str, TensorId> = self
            .tensors
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), TensorId(i)))
            .collect();
        let subgraph_ids: HashMap<&str, usize> = self
            .subgraphs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let resolve = |names: &[String], referrer: &str| -> Result<Vec<TensorId>, GraphError> {
            names
                .iter()
                .map(|n| {
                    tensor_ids
                        .get(n.as_str())
                        .copied()
                        .ok_or_else(|| GraphError::UnknownReference {
                            kind: "tensor",
                            name: n.clone(),
                            referrer: referrer.to_string(),
                        })
                })
                .collect()
        };

        let mut subgraphs = Vec::with_capacity(self.subgraphs.len());
        for sg in &self.subgraphs {
            let mut def = SubGraphDef::new(&sg.name);
            def.inputs = resolve(&sg.inputs, &sg.name)?;
            def.outputs = resolve(&sg.outputs, &sg.name)?;
            for node in &sg.nodes {
                let kind = match node.kind {
                    ManifestNodeKind::Plain => NodeKind::Plain,
                    ManifestNodeKind::Call => NodeKind::Call,
                    ManifestNodeKind::Partial => {
                        let subgraph = match &node.subgraph {
                            Some(SubGraphRef::Index(i)) => *i,
                            Some(SubGraphRef::Name(name)) => *subgraph_ids
                                .get(name.as_str())
                                .ok_or_else(|| GraphError::UnknownReference {
                                    kind: "subgraph",
                                    name: name.clone(),
                                    referrer: node.name.clone(),
                                })?,
                            None => {
                                return Err(GraphError::InvalidNode {
                                    node: node.name.clone(),
                                    detail: "partial without 'subgraph'".into(),
                                })
                            }
                        };
                        NodeKind::Partial { subgraph }
                    }
                };
                def.nodes.push(NodeDef {
                    name: node.name.clone(),
                    op: node.op.clone(),
                    kind,
                    inputs: resolve(&node.inputs, &node.name)?,
                    outputs: resolve(&node.outputs, &node.name)?,
                    attrs: node.attrs.clone(),
                });
            }
            subgraphs.push(def);
        }

        let tensors = self.tensors.iter().map(convert_tensor).collect();

        Ok(KernelGraph::new(self.name, tensors, subgraphs))
    }
}

fn convert_tensor(t: &ManifestTensor) -> TensorDef {
    let shape = Shape::new(t.shape.clone());
    let mut def = TensorDef::new(&t.name, t.dtype, shape, t.category).with_format(t.format);
    def.list = t.list;
    def.quant_params = t.quant_params.clone();
    if let Some(values) = &t.data {
        def.data = Some(encode_values(t.dtype, values));
    }
    def
}

/// Encodes `values` as little-endian `dtype` elements.
pub(crate) fn encode_values(dtype: DType, values: &[f64]) -> Vec<u8> {
    let width = dtype.size_bytes();
    let mut bytes = vec![0u8; values.len() * width];
    for (chunk, &v) in bytes.chunks_exact_mut(width).zip(values) {
        dtype.write_f64(v, chunk);
    }
    bytes
}

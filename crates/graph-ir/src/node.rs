// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel nodes and subgraphs.
//!
//! A [`NodeDef`] only names its operator; the runtime's kernel registry
//! turns `op` into an executable kernel when the graph is prepared.
//!
//! # Partial / Call
//! A `Partial` node binds a subgraph to argument tensors and produces a
//! single closure tensor. A `Call` node consumes that closure (its first
//! input), may pass further arguments, and its outputs correspond
//! positionally to the subgraph's outputs.

use std::collections::BTreeMap;
use std::fmt;
use tensor_core::TensorId;

/// What a node does at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NodeKind {
    /// An ordinary kernel.
    Plain,
    /// Binds subgraph `subgraph` to this node's inputs.
    Partial { subgraph: usize },
    /// Invokes the closure produced by a `Partial`.
    Call,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Partial { .. } => "partial",
            Self::Call => "call",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial { subgraph } => write!(f, "partial(subgraph {subgraph})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One node of a kernel graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeDef {
    /// Unique name within its subgraph.
    pub name: String,
    /// Operator name, looked up in the kernel registry. Empty for
    /// `Partial`/`Call`.
    pub op: String,
    pub kind: NodeKind,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
    /// Operator attributes, e.g. `{"to": "f32"}` for a cast.
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl NodeDef {
    /// A plain kernel node.
    pub fn new(
        name: impl Into<String>,
        op: impl Into<String>,
        inputs: Vec<TensorId>,
        outputs: Vec<TensorId>,
    ) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            kind: NodeKind::Plain,
            inputs,
            outputs,
            attrs: BTreeMap::new(),
        }
    }

    /// A `Partial` binding `subgraph` to `args`, producing `closure`.
    pub fn partial(
        name: impl Into<String>,
        subgraph: usize,
        args: Vec<TensorId>,
        closure: TensorId,
    ) -> Self {
        Self {
            name: name.into(),
            op: String::new(),
            kind: NodeKind::Partial { subgraph },
            inputs: args,
            outputs: vec![closure],
            attrs: BTreeMap::new(),
        }
    }

    /// A `Call` of `closure` with extra `args`, producing `outputs`.
    pub fn call(
        name: impl Into<String>,
        closure: TensorId,
        args: Vec<TensorId>,
        outputs: Vec<TensorId>,
    ) -> Self {
        let mut inputs = Vec::with_capacity(args.len() + 1);
        inputs.push(closure);
        inputs.extend(args);
        Self {
            name: name.into(),
            op: String::new(),
            kind: NodeKind::Call,
            inputs,
            outputs,
            attrs: BTreeMap::new(),
        }
    }

    /// Builder: sets an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attrs.get(key).and_then(serde_json::Value::as_f64)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns a one-line summary of this node.
    pub fn summary(&self) -> String {
        let label = if self.op.is_empty() {
            self.kind.to_string()
        } else {
            self.op.clone()
        };
        format!(
            "{} [{}] in={:?} out={:?}",
            self.name,
            label,
            self.inputs.iter().map(|t| t.0).collect::<Vec<_>>(),
            self.outputs.iter().map(|t| t.0).collect::<Vec<_>>(),
        )
    }
}

/// An ordered node list with declared boundary tensors.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SubGraphDef {
    pub name: String,
    pub nodes: Vec<NodeDef>,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
}

impl SubGraphDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_puts_closure_first() {
        let node = NodeDef::call("c", TensorId(4), vec![TensorId(1)], vec![TensorId(5)]);
        assert_eq!(node.inputs, vec![TensorId(4), TensorId(1)]);
        assert_eq!(node.kind, NodeKind::Call);
    }

    #[test]
    fn test_attrs() {
        let node = NodeDef::new("s", "scale", vec![], vec![])
            .with_attr("factor", 2.5)
            .with_attr("to", "f32");
        assert_eq!(node.attr_f64("factor"), Some(2.5));
        assert_eq!(node.attr_str("to"), Some("f32"));
        assert_eq!(node.attr_f64("missing"), None);
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&NodeKind::Partial { subgraph: 2 }).unwrap();
        assert_eq!(json, r#"{"kind":"partial","subgraph":2}"#);
        let back: NodeKind = serde_json::from_str(r#"{"kind":"call"}"#).unwrap();
        assert_eq!(back, NodeKind::Call);
    }

    #[test]
    fn test_summary() {
        let node = NodeDef::partial("p", 1, vec![TensorId(0)], TensorId(3));
        let s = node.summary();
        assert!(s.contains("partial(subgraph 1)"));
        assert!(s.contains("out=[3]"));
    }
}

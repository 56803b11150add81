// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Programmatic graph construction.

use crate::{KernelGraph, Loaded, NodeDef, SubGraphDef, TensorDef};
use tensor_core::{Category, DType, Element, Shape, TensorId};

/// Builds a [`KernelGraph`] tensor by tensor and node by node.
///
/// ```
/// use graph_ir::GraphBuilder;
/// use tensor_core::DType;
///
/// let mut b = GraphBuilder::new("double");
/// let x = b.input("x", DType::F32, &[4]);
/// let y = b.var("y", DType::F32, &[4]);
/// b.op("scale", "scale", vec![x], vec![y]);
/// b.output(y);
/// let graph = b.build().validate().unwrap();
/// assert_eq!(graph.num_nodes(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    name: String,
    tensors: Vec<TensorDef>,
    subgraphs: Vec<SubGraphDef>,
}

impl GraphBuilder {
    /// Starts a graph with an empty main subgraph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tensors: Vec::new(),
            subgraphs: vec![SubGraphDef::new("main")],
        }
    }

    pub fn add_tensor(&mut self, def: TensorDef) -> TensorId {
        self.tensors.push(def);
        TensorId(self.tensors.len() - 1)
    }

    /// Declares a graph input of the main subgraph.
    pub fn input(&mut self, name: impl Into<String>, dtype: DType, dims: &[i64]) -> TensorId {
        let id = self.add_tensor(TensorDef::new(
            name,
            dtype,
            Shape::from(dims),
            Category::GraphInput,
        ));
        self.subgraphs[0].inputs.push(id);
        id
    }

    /// Declares an intermediate tensor.
    pub fn var(&mut self, name: impl Into<String>, dtype: DType, dims: &[i64]) -> TensorId {
        self.add_tensor(TensorDef::new(name, dtype, Shape::from(dims), Category::Var))
    }

    /// Declares a constant.
    pub fn constant<T: Element>(
        &mut self,
        name: impl Into<String>,
        dims: &[i64],
        values: &[T],
    ) -> TensorId {
        self.add_tensor(TensorDef::constant(name, Shape::from(dims), values))
    }

    /// Declares `id` an output of the main subgraph.
    ///
    /// Intermediate tensors become `GraphOutput`; inputs and constants keep
    /// their category.
    pub fn output(&mut self, id: TensorId) {
        if let Some(def) = self.tensors.get_mut(id.0) {
            if def.category == Category::Var {
                def.category = Category::GraphOutput;
            }
        }
        self.subgraphs[0].outputs.push(id);
    }

    /// Appends a plain node to the main subgraph.
    pub fn op(
        &mut self,
        name: impl Into<String>,
        op: impl Into<String>,
        inputs: Vec<TensorId>,
        outputs: Vec<TensorId>,
    ) {
        self.subgraphs[0]
            .nodes
            .push(NodeDef::new(name, op, inputs, outputs));
    }

    /// Appends any node to subgraph `subgraph`.
    pub fn node(&mut self, subgraph: usize, node: NodeDef) {
        if let Some(sg) = self.subgraphs.get_mut(subgraph) {
            sg.nodes.push(node);
        }
    }

    /// Adds an empty subgraph, returning its index.
    pub fn subgraph(&mut self, name: impl Into<String>) -> usize {
        self.subgraphs.push(SubGraphDef::new(name));
        self.subgraphs.len() - 1
    }

    /// Declares the boundary tensors of subgraph `subgraph`.
    pub fn bind_subgraph(&mut self, subgraph: usize, inputs: Vec<TensorId>, outputs: Vec<TensorId>) {
        if let Some(sg) = self.subgraphs.get_mut(subgraph) {
            sg.inputs = inputs;
            sg.outputs = outputs;
        }
    }

    /// Finishes construction; call `.validate()` on the result.
    pub fn build(self) -> KernelGraph<Loaded> {
        KernelGraph::new(self.name, self.tensors, self.subgraphs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_marks_category() {
        let mut b = GraphBuilder::new("g");
        let x = b.input("x", DType::I32, &[1]);
        let y = b.var("y", DType::I32, &[1]);
        b.op("n", "identity", vec![x], vec![y]);
        b.output(y);
        b.output(x);
        let g = b.build();
        assert_eq!(g.tensors[1].category, Category::GraphOutput);
        assert_eq!(g.tensors[0].category, Category::GraphInput);
        assert_eq!(g.subgraphs[0].outputs, vec![y, x]);
    }

    #[test]
    fn test_subgraph_wiring() {
        let mut b = GraphBuilder::new("g");
        let sg = b.subgraph("body");
        let a = b.var("a", DType::F32, &[2]);
        let r = b.var("r", DType::F32, &[2]);
        b.node(sg, NodeDef::new("inner", "identity", vec![a], vec![r]));
        b.bind_subgraph(sg, vec![a], vec![r]);
        let g = b.build().validate().unwrap();
        assert_eq!(g.subgraph(1).unwrap().nodes.len(), 1);
        assert_eq!(g.subgraph(1).unwrap().inputs, vec![a]);
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph compilation: kernel nodes → actors, dataflow → arrows.
//!
//! # Call sites
//! Every `Call` instantiates its target subgraph afresh. Non-constant
//! tensors of the subgraph get private copies (recorded in the isolation
//! table) and node names get the call path as a prefix, so two call sites
//! of the same subgraph never share buffers. Constants stay shared.
//!
//! Two forward edges connect an instance to its caller:
//!
//! ```text
//! partial/call argument ──▶ private subgraph input
//! private subgraph output ──▶ call output
//! ```
//!
//! Arrows follow these edges, so actors inside an instance talk directly to
//! actors outside it; `Partial` and `Call` nodes leave no actor behind.

use crate::arrow::{ArrowCompiler, ForwardMap, ReceiversMap};
use crate::compiled::{
    ActorSpec, CompiledGraph, GraphInputSpec, InputSlot, OutputSource, ResultIndex, SlotSource,
};
use crate::{ActorId, CompileError};
use graph_ir::{KernelGraph, NodeDef, NodeKind, SubGraphDef, TensorDef, Validated};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tensor_core::{Category, TensorId};

/// Default limit on nested calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;

/// Compiles validated kernel graphs.
///
/// # Example
/// ```no_run
/// use graph_compiler::GraphCompiler;
/// use graph_ir::GraphLoader;
/// use std::path::Path;
///
/// let graph = GraphLoader::load(Path::new("./graphs/call.json")).unwrap();
/// let compiled = GraphCompiler::default().compile(&graph).unwrap();
/// println!("{compiled}");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GraphCompiler {
    max_call_depth: usize,
}

impl Default for GraphCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALL_DEPTH)
    }
}

impl GraphCompiler {
    pub fn new(max_call_depth: usize) -> Self {
        Self { max_call_depth }
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Compiles `graph` into actors and arrows.
    ///
    /// # Errors
    /// Dataflow problems the per-declaration validation cannot see: a tensor
    /// with two producers, a consumed tensor with no producer, malformed
    /// calls, recursion, excessive nesting and cycles.
    pub fn compile(&self, graph: &KernelGraph<Validated>) -> Result<CompiledGraph, CompileError> {
        let mut c = Compilation::new(graph, self.max_call_depth);
        for (position, &input) in graph.inputs().iter().enumerate() {
            c.check(input, "graph inputs")?;
            c.define(input, "graph input", Origin::GraphInput(position))?;
        }

        let mut stack = vec![0];
        c.instantiate(graph.main(), &Scope::main(), &mut stack)?;

        let compiled = c.finish()?;
        tracing::debug!("{}", compiled.summary());
        Ok(compiled)
    }
}

// ── Compilation state ──────────────────────────────────────────────

/// What wrote a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Actor(ActorId, usize),
    GraphInput(usize),
    Const,
    Closure,
    /// Aliases the tensor recorded in `backward`.
    Forwarded,
}

#[derive(Debug)]
struct Writer {
    name: String,
    origin: Origin,
}

#[derive(Debug, Clone)]
struct Closure {
    subgraph: usize,
    args: Vec<TensorId>,
}

#[derive(Debug)]
struct PendingActor {
    name: String,
    op: String,
    attrs: BTreeMap<String, serde_json::Value>,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
}

/// Name prefix and tensor remapping of one subgraph instance.
#[derive(Debug, Default)]
struct Scope {
    prefix: String,
    locals: HashMap<TensorId, TensorId>,
}

impl Scope {
    fn main() -> Self {
        Self::default()
    }

    fn map(&self, id: TensorId) -> TensorId {
        self.locals.get(&id).copied().unwrap_or(id)
    }

    fn map_all(&self, ids: &[TensorId]) -> Vec<TensorId> {
        ids.iter().map(|&t| self.map(t)).collect()
    }
}

struct Compilation<'g> {
    graph: &'g KernelGraph<Validated>,
    max_call_depth: usize,
    tensors: Vec<TensorDef>,
    isolation: BTreeMap<TensorId, TensorId>,
    actors: Vec<PendingActor>,
    writers: HashMap<TensorId, Writer>,
    closures: HashMap<TensorId, Closure>,
    receivers: ReceiversMap,
    forwards: ForwardMap,
    backward: HashMap<TensorId, TensorId>,
}

impl<'g> Compilation<'g> {
    fn new(graph: &'g KernelGraph<Validated>, max_call_depth: usize) -> Self {
        Self {
            graph,
            max_call_depth,
            tensors: graph.tensors.clone(),
            isolation: BTreeMap::new(),
            actors: Vec::new(),
            writers: HashMap::new(),
            closures: HashMap::new(),
            receivers: ReceiversMap::new(),
            forwards: ForwardMap::new(),
            backward: HashMap::new(),
        }
    }

    fn check(&self, id: TensorId, referrer: &str) -> Result<(), CompileError> {
        if id.0 >= self.graph.tensors.len() {
            return Err(CompileError::TensorOutOfRange {
                id,
                referrer: referrer.to_string(),
                len: self.graph.tensors.len(),
            });
        }
        Ok(())
    }

    fn name_of(&self, id: TensorId) -> String {
        self.tensors
            .get(id.0)
            .map_or_else(|| id.to_string(), |t| t.name.clone())
    }

    fn is_const(&self, id: TensorId) -> bool {
        self.tensors.get(id.0).is_some_and(TensorDef::is_const)
    }

    /// Records `writer` as the single producer of `id`.
    fn define(&mut self, id: TensorId, writer: &str, origin: Origin) -> Result<(), CompileError> {
        let first = match self.writers.get(&id) {
            Some(existing) => Some(existing.name.clone()),
            None if self.is_const(id) => Some("constant".to_string()),
            None => None,
        };
        if let Some(first) = first {
            return Err(CompileError::TwoProducers {
                tensor: self.name_of(id),
                first,
                second: writer.to_string(),
            });
        }
        self.writers.insert(
            id,
            Writer {
                name: writer.to_string(),
                origin,
            },
        );
        Ok(())
    }

    fn forward(&mut self, from: TensorId, to: TensorId) {
        self.forwards.entry(from).or_default().push(to);
        self.backward.insert(to, from);
    }

    /// Adds the actors of `subgraph` under `scope`.
    ///
    /// Calls are handled after every other node so a closure is known
    /// regardless of node order.
    fn instantiate(
        &mut self,
        subgraph: &'g SubGraphDef,
        scope: &Scope,
        stack: &mut Vec<usize>,
    ) -> Result<(), CompileError> {
        for node in subgraph.nodes.iter().filter(|n| n.kind != NodeKind::Call) {
            self.add_node(node, scope)?;
        }
        for node in subgraph.nodes.iter().filter(|n| n.kind == NodeKind::Call) {
            self.add_call(node, scope, stack)?;
        }
        Ok(())
    }

    fn add_node(&mut self, node: &NodeDef, scope: &Scope) -> Result<(), CompileError> {
        for &id in node.inputs.iter().chain(&node.outputs) {
            self.check(id, &node.name)?;
        }
        let name = format!("{}{}", scope.prefix, node.name);
        let inputs = scope.map_all(&node.inputs);
        let outputs = scope.map_all(&node.outputs);

        if let NodeKind::Partial { subgraph } = node.kind {
            for &out in &outputs {
                self.define(out, &name, Origin::Closure)?;
                self.closures.insert(
                    out,
                    Closure {
                        subgraph,
                        args: inputs.clone(),
                    },
                );
            }
            return Ok(());
        }

        let id = ActorId(self.actors.len());
        for (k, &out) in outputs.iter().enumerate() {
            self.define(out, &name, Origin::Actor(id, k))?;
        }
        for (slot, &input) in inputs.iter().enumerate() {
            self.receivers.entry(input).or_default().push((id, slot));
        }
        self.actors.push(PendingActor {
            name,
            op: node.op.clone(),
            attrs: node.attrs.clone(),
            inputs,
            outputs,
        });
        Ok(())
    }

    fn add_call(
        &mut self,
        node: &NodeDef,
        scope: &Scope,
        stack: &mut Vec<usize>,
    ) -> Result<(), CompileError> {
        for &id in node.inputs.iter().chain(&node.outputs) {
            self.check(id, &node.name)?;
        }
        let name = format!("{}{}", scope.prefix, node.name);
        let without_partial = || CompileError::CallWithoutPartial { call: name.clone() };

        let (&closure_id, extra_args) = node.inputs.split_first().ok_or_else(without_partial)?;
        let closure = self
            .closures
            .get(&scope.map(closure_id))
            .cloned()
            .ok_or_else(without_partial)?;
        let graph = self.graph;
        let target = graph.subgraph(closure.subgraph).ok_or_else(without_partial)?;

        if stack.contains(&closure.subgraph) {
            return Err(CompileError::RecursiveSubgraph {
                call: name,
                subgraph: target.name.clone(),
            });
        }
        if stack.len() > self.max_call_depth {
            return Err(CompileError::CallDepthExceeded {
                call: name,
                limit: self.max_call_depth,
            });
        }

        let mut args = closure.args;
        args.extend(scope.map_all(extra_args));
        if args.len() != target.inputs.len() {
            return Err(CompileError::ArgumentCountMismatch {
                call: name,
                subgraph: target.name.clone(),
                expected: target.inputs.len(),
                actual: args.len(),
            });
        }
        if node.outputs.len() != target.outputs.len() {
            return Err(CompileError::ResultCountMismatch {
                call: name,
                subgraph: target.name.clone(),
                expected: target.outputs.len(),
                actual: node.outputs.len(),
            });
        }

        let inner = self.isolate(target, format!("{name}/"))?;
        tracing::debug!(
            "call '{name}': instantiating '{}' with {} private tensors",
            target.name,
            inner.locals.len()
        );

        for (&arg, input) in args.iter().zip(inner.map_all(&target.inputs)) {
            self.define(input, &name, Origin::Forwarded)?;
            self.forward(arg, input);
        }

        stack.push(closure.subgraph);
        let result = self.instantiate(target, &inner, stack);
        stack.pop();
        result?;

        for (inner_out, out) in inner
            .map_all(&target.outputs)
            .into_iter()
            .zip(scope.map_all(&node.outputs))
        {
            self.define(out, &name, Origin::Forwarded)?;
            self.forward(inner_out, out);
        }
        Ok(())
    }

    /// Creates private copies of the non-constant tensors of `subgraph`.
    fn isolate(&mut self, subgraph: &SubGraphDef, prefix: String) -> Result<Scope, CompileError> {
        let referenced: Vec<TensorId> = subgraph
            .inputs
            .iter()
            .chain(&subgraph.outputs)
            .chain(subgraph.nodes.iter().flat_map(|n| n.inputs.iter().chain(&n.outputs)))
            .copied()
            .collect();

        let mut locals = HashMap::new();
        for origin in referenced {
            self.check(origin, &subgraph.name)?;
            if locals.contains_key(&origin) || self.is_const(origin) {
                continue;
            }
            let Some(def) = self.graph.tensor(origin) else {
                continue;
            };
            let mut def = def.clone();
            def.name = format!("{prefix}{}", def.name);
            if matches!(def.category, Category::GraphInput | Category::GraphOutput) {
                def.category = Category::Var;
            }
            let private = TensorId(self.tensors.len());
            self.tensors.push(def);
            self.isolation.insert(private, origin);
            locals.insert(origin, private);
        }
        Ok(Scope { prefix, locals })
    }

    /// Follows forward edges back to the tensor that is actually written.
    fn resolve(&self, mut id: TensorId) -> Option<(TensorId, Origin)> {
        for _ in 0..=self.tensors.len() {
            match self.writers.get(&id).map(|w| w.origin) {
                Some(Origin::Forwarded) => id = *self.backward.get(&id)?,
                Some(origin) => return Some((id, origin)),
                None => return self.is_const(id).then_some((id, Origin::Const)),
            }
        }
        None
    }

    fn finish(self) -> Result<CompiledGraph, CompileError> {
        let mut arrows = ArrowCompiler::new();
        let mut init_ref_counts = vec![0usize; self.tensors.len()];
        let mut actors = Vec::with_capacity(self.actors.len());

        for (index, pending) in self.actors.iter().enumerate() {
            let mut inputs = Vec::with_capacity(pending.inputs.len());
            for &tensor in &pending.inputs {
                let source = self.slot_source(tensor, &pending.name)?;
                if let SlotSource::Const { tensor: src } = source {
                    init_ref_counts[src.0] += 1;
                }
                inputs.push(InputSlot {
                    tensor,
                    source,
                    isolated: self.isolation.contains_key(&tensor),
                });
            }

            let compiled = arrows.compile_arrows(&pending.outputs, &self.receivers, &self.forwards);
            for arrow in &compiled {
                if let Some(out) = pending.outputs.get(arrow.from_output) {
                    init_ref_counts[out.0] += 1;
                }
            }

            actors.push(ActorSpec {
                id: ActorId(index),
                name: pending.name.clone(),
                op: pending.op.clone(),
                attrs: pending.attrs.clone(),
                inputs,
                outputs: pending.outputs.clone(),
                arrows: compiled,
                result_indices: Vec::new(),
            });
        }

        let mut inputs = Vec::with_capacity(self.graph.inputs().len());
        for &tensor in self.graph.inputs() {
            let routed = arrows.compile_arrows(&[tensor], &self.receivers, &self.forwards);
            init_ref_counts[tensor.0] += routed.len();
            inputs.push(GraphInputSpec {
                tensor,
                receivers: routed.iter().map(|a| (a.to, a.to_input)).collect(),
            });
        }

        let mut outputs = Vec::with_capacity(self.graph.outputs().len());
        let mut output_names = Vec::with_capacity(self.graph.outputs().len());
        for (position, &tensor) in self.graph.outputs().iter().enumerate() {
            self.check(tensor, "graph outputs")?;
            let source = match self.slot_source(tensor, "graph outputs")? {
                SlotSource::Actor { actor, tensor: src } => {
                    let output_slot = self.output_slot(actor, src);
                    if let Some(spec) = actors.get_mut(actor.0) {
                        spec.result_indices.push(ResultIndex {
                            output_slot,
                            position,
                        });
                    }
                    OutputSource::Actor {
                        actor,
                        output_slot,
                        tensor: src,
                    }
                }
                SlotSource::GraphInput { position, tensor } => {
                    OutputSource::GraphInput { position, tensor }
                }
                SlotSource::Const { tensor } => OutputSource::Const { tensor },
            };
            outputs.push(source);
            output_names.push(self.name_of(tensor));
        }

        check_acyclic(&actors)?;

        Ok(CompiledGraph {
            name: self.graph.name.clone(),
            tensors: self.tensors,
            init_ref_counts,
            actors,
            inputs,
            outputs,
            output_names,
            isolation: self.isolation,
        })
    }

    fn slot_source(&self, tensor: TensorId, consumer: &str) -> Result<SlotSource, CompileError> {
        let (src, origin) = self.resolve(tensor).ok_or_else(|| CompileError::NoProducer {
            tensor: self.name_of(tensor),
            consumer: consumer.to_string(),
        })?;
        match origin {
            Origin::Actor(actor, _) => Ok(SlotSource::Actor { actor, tensor: src }),
            Origin::GraphInput(position) => Ok(SlotSource::GraphInput {
                position,
                tensor: src,
            }),
            Origin::Const => Ok(SlotSource::Const { tensor: src }),
            Origin::Closure | Origin::Forwarded => Err(CompileError::ClosureAsData {
                tensor: self.name_of(tensor),
                consumer: consumer.to_string(),
            }),
        }
    }

    fn output_slot(&self, actor: ActorId, tensor: TensorId) -> usize {
        match self.writers.get(&tensor).map(|w| w.origin) {
            Some(Origin::Actor(a, k)) if a == actor => k,
            _ => 0,
        }
    }
}

/// Rejects actor graphs in which some actor can never receive all inputs
/// because it (transitively) waits on itself.
fn check_acyclic(actors: &[ActorSpec]) -> Result<(), CompileError> {
    let mut waiting: Vec<usize> = actors
        .iter()
        .map(|a| {
            a.inputs
                .iter()
                .filter(|s| matches!(s.source, SlotSource::Actor { .. }))
                .count()
        })
        .collect();
    let mut ready: VecDeque<usize> = (0..actors.len()).filter(|&i| waiting[i] == 0).collect();

    let mut visited = 0;
    while let Some(i) = ready.pop_front() {
        visited += 1;
        for arrow in &actors[i].arrows {
            let count = &mut waiting[arrow.to.0];
            *count = count.saturating_sub(1);
            if *count == 0 {
                ready.push_back(arrow.to.0);
            }
        }
    }

    if visited < actors.len() {
        if let Some(i) = (0..actors.len()).find(|&i| waiting[i] > 0) {
            return Err(CompileError::Cycle {
                actor: actors[i].name.clone(),
            });
        }
    }
    Ok(())
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arrows: compiled routes from a producer's output to a consumer's input.
//!
//! Routing is resolved once, at compile time. For every produced tensor the
//! [`ArrowCompiler`] collects its direct consumers and, through the forward
//! table, the consumers of every tensor it aliases (a `Partial` argument
//! feeds the instantiated subgraph's input; a subgraph output feeds the
//! `Call` output). Each destination `(actor, input slot)` is fed by at most
//! one arrow; compiling the same route twice is a no-op.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tensor_core::TensorId;

/// Stable index of an actor in a compiled graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub usize);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// `(producer output slot) → (consumer actor, consumer input slot)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Arrow {
    pub from_output: usize,
    pub to: ActorId,
    pub to_input: usize,
}

impl fmt::Display for Arrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "out{} -> {}[{}]", self.from_output, self.to, self.to_input)
    }
}

/// Direct consumers of each tensor: `(actor, input slot)` pairs.
pub type ReceiversMap = HashMap<TensorId, Vec<(ActorId, usize)>>;

/// Compile-time alias edges: data arriving in the key tensor continues to
/// every tensor in the value list.
pub type ForwardMap = BTreeMap<TensorId, Vec<TensorId>>;

/// Builds deduplicated arrows.
#[derive(Debug, Default)]
pub struct ArrowCompiler {
    receiver_index_set: HashMap<ActorId, HashSet<usize>>,
}

impl ArrowCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if some arrow already feeds `to[to_input]`.
    pub fn arrow_has_compiled(&self, to: ActorId, to_input: usize) -> bool {
        self.receiver_index_set
            .get(&to)
            .is_some_and(|slots| slots.contains(&to_input))
    }

    /// Records that `to[to_input]` is fed.
    pub fn mark_arrow_as_compiled(&mut self, to: ActorId, to_input: usize) {
        self.receiver_index_set.entry(to).or_default().insert(to_input);
    }

    /// Number of distinct destination slots fed so far.
    pub fn compiled_count(&self) -> usize {
        self.receiver_index_set.values().map(HashSet::len).sum()
    }

    /// Compiles arrows for each output tensor of one producer.
    ///
    /// `outputs[k]` is the tensor in output slot `k`. Forward edges are
    /// followed transitively. Destinations that are already fed are
    /// skipped, so repeated calls add nothing.
    pub fn compile_arrows(
        &mut self,
        outputs: &[TensorId],
        receivers_map: &ReceiversMap,
        forwards: &ForwardMap,
    ) -> Vec<Arrow> {
        let mut arrows = Vec::new();
        for (k, &tensor) in outputs.iter().enumerate() {
            for (to, to_input) in Self::destinations(tensor, receivers_map, forwards) {
                if self.arrow_has_compiled(to, to_input) {
                    continue;
                }
                self.mark_arrow_as_compiled(to, to_input);
                arrows.push(Arrow {
                    from_output: k,
                    to,
                    to_input,
                });
            }
        }
        arrows
    }

    /// All `(actor, slot)` pairs reached from `tensor`, following forwards.
    fn destinations(
        tensor: TensorId,
        receivers_map: &ReceiversMap,
        forwards: &ForwardMap,
    ) -> Vec<(ActorId, usize)> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![tensor];
        while let Some(t) = stack.pop() {
            if !visited.insert(t) {
                continue;
            }
            if let Some(receivers) = receivers_map.get(&t) {
                out.extend(receivers.iter().copied());
            }
            if let Some(next) = forwards.get(&t) {
                // Reverse so forwards are visited in declaration order.
                stack.extend(next.iter().rev().copied());
            }
        }
        out
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compiled form of a kernel graph.
//!
//! Everything the runtime needs to wire actors is precomputed here: the
//! tensor table (including private copies made for each call site), one
//! [`ActorSpec`] per kernel instance with its outgoing [`Arrow`]s, where
//! each input slot is fed from, and where each graph output comes from.

use crate::{ActorId, Arrow};
use graph_ir::TensorDef;
use std::collections::BTreeMap;
use std::fmt;
use tensor_core::TensorId;

/// Where an actor's input slot receives its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "from")]
pub enum SlotSource {
    /// A message from an upstream actor that stores into `tensor`.
    Actor { actor: ActorId, tensor: TensorId },
    /// A message from the engine carrying graph input `position`.
    GraphInput { position: usize, tensor: TensorId },
    /// Bound directly from a constant when a run starts.
    Const { tensor: TensorId },
}

impl SlotSource {
    /// Tensor the data is read from.
    pub fn tensor(&self) -> TensorId {
        match *self {
            Self::Actor { tensor, .. } | Self::GraphInput { tensor, .. } | Self::Const { tensor } => {
                tensor
            }
        }
    }

    /// Whether the slot waits for a message.
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Self::Const { .. })
    }
}

/// One input slot of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct InputSlot {
    /// Declared tensor: the dtype, format and shape the kernel expects.
    pub tensor: TensorId,
    pub source: SlotSource,
    /// The declared tensor is a private copy inside a call instance.
    pub isolated: bool,
}

/// Output slot `output_slot` is graph output `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ResultIndex {
    pub output_slot: usize,
    pub position: usize,
}

/// One kernel instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ActorSpec {
    pub id: ActorId,
    /// Node name, prefixed with the call path for call instances.
    pub name: String,
    pub op: String,
    pub attrs: BTreeMap<String, serde_json::Value>,
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<TensorId>,
    pub arrows: Vec<Arrow>,
    pub result_indices: Vec<ResultIndex>,
}

impl ActorSpec {
    /// Number of messages the actor waits for before it may execute.
    pub fn required_inputs(&self) -> usize {
        self.inputs.iter().filter(|s| s.source.is_delivered()).count()
    }

    /// Scheduled when a run starts: nothing to wait for.
    pub fn is_initial(&self) -> bool {
        self.required_inputs() == 0
    }

    /// Produces at least one graph output.
    pub fn is_terminal(&self) -> bool {
        !self.result_indices.is_empty()
    }

    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attrs.get(key).and_then(serde_json::Value::as_f64)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns a one-line summary of this actor.
    pub fn summary(&self) -> String {
        format!(
            "{} {} [{}] in={:?} out={:?} arrows={}{}",
            self.id,
            self.name,
            self.op,
            self.inputs.iter().map(|s| s.tensor.0).collect::<Vec<_>>(),
            self.outputs.iter().map(|t| t.0).collect::<Vec<_>>(),
            self.arrows.len(),
            if self.is_terminal() { " (terminal)" } else { "" },
        )
    }
}

/// A graph input and the actor slots it is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GraphInputSpec {
    pub tensor: TensorId,
    pub receivers: Vec<(ActorId, usize)>,
}

/// Where graph output `position` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "from")]
pub enum OutputSource {
    Actor {
        actor: ActorId,
        output_slot: usize,
        tensor: TensorId,
    },
    /// A graph input returned unchanged.
    GraphInput { position: usize, tensor: TensorId },
    Const { tensor: TensorId },
}

impl OutputSource {
    /// Whether the value is only known once an actor runs.
    pub fn is_produced(&self) -> bool {
        matches!(self, Self::Actor { .. })
    }
}

/// A kernel graph compiled into actors and arrows.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompiledGraph {
    pub name: String,
    /// Tensor table. Graph tensors keep their ids; private copies follow.
    pub tensors: Vec<TensorDef>,
    /// Deliveries expected per tensor in one run.
    pub init_ref_counts: Vec<usize>,
    pub actors: Vec<ActorSpec>,
    pub inputs: Vec<GraphInputSpec>,
    pub outputs: Vec<OutputSource>,
    /// Declared name of each graph output.
    pub output_names: Vec<String>,
    /// Private copy → tensor it was copied from.
    pub isolation: BTreeMap<TensorId, TensorId>,
}

impl CompiledGraph {
    pub fn actor(&self, id: ActorId) -> Option<&ActorSpec> {
        self.actors.get(id.0)
    }

    pub fn tensor(&self, id: TensorId) -> Option<&TensorDef> {
        self.tensors.get(id.0)
    }

    pub fn actor_by_name(&self, name: &str) -> Option<&ActorSpec> {
        self.actors.iter().find(|a| a.name == name)
    }

    pub fn initial_actors(&self) -> impl Iterator<Item = &ActorSpec> {
        self.actors.iter().filter(|a| a.is_initial())
    }

    pub fn terminal_actors(&self) -> impl Iterator<Item = &ActorSpec> {
        self.actors.iter().filter(|a| a.is_terminal())
    }

    pub fn is_isolated(&self, id: TensorId) -> bool {
        self.isolation.contains_key(&id)
    }

    pub fn num_arrows(&self) -> usize {
        self.actors.iter().map(|a| a.arrows.len()).sum()
    }

    /// Graph outputs that are only known once an actor runs.
    pub fn num_produced_outputs(&self) -> usize {
        self.outputs.iter().filter(|o| o.is_produced()).count()
    }

    /// Returns a summary string describing the compiled graph.
    pub fn summary(&self) -> String {
        format!(
            "Compiled '{}': {} actors ({} initial, {} terminal), {} arrows, {} tensors ({} isolated)",
            self.name,
            self.actors.len(),
            self.initial_actors().count(),
            self.terminal_actors().count(),
            self.num_arrows(),
            self.tensors.len(),
            self.isolation.len(),
        )
    }
}

impl fmt::Display for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for actor in &self.actors {
            writeln!(f, "  {}", actor.summary())?;
            for arrow in &actor.arrows {
                writeln!(f, "    {arrow}")?;
            }
        }
        for (private, origin) in &self.isolation {
            writeln!(f, "  isolated {private} <- {origin}")?;
        }
        Ok(())
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Op actors: one per kernel instance.
//!
//! # Lifecycle of one run
//! ```text
//! Idle ──Data×N──▶ Ready ──▶ Running ──▶ Emitting ──▶ Idle
//!   │                          │
//!   └──Start (no inputs)───────┘
//! ```
//!
//! 1. Every `Data` message fills one input slot. The actor executes when the
//!    last required slot is filled; a second delivery to a filled slot is a
//!    scheduler bug and aborts the run.
//! 2. Inputs are bound: the buffer is moved from the producer when this is
//!    its last reader, shared otherwise, deep-copied when the slot is
//!    isolated from caller-owned memory, and converted when dtype or layout
//!    differ from what the kernel expects. Tensor lists follow the same
//!    rules; copies and conversions apply to each element.
//! 3. If input shapes changed since the last run the kernel is resized.
//! 4. Outputs are allocated from the pool and the kernel runs.
//! 5. Inputs are released, outputs are published in the arena and every
//!    arrow sends one `Data` message.

use crate::config::DispatchPolicy;
use crate::context::RunContext;
use crate::kernel::{CallbackInfo, Kernel, KernelHooks};
use crate::mindrt::{Mailboxes, Message, OpData};
use crate::{KernelError, RuntimeError, StatusCode};
use graph_compiler::{ActorId, ActorSpec, CompiledGraph, InputSlot, ResultIndex, SlotSource};
use memory_manager::Allocator;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tensor_core::{
    cast_tensor, copy_tensor, need_cast_data, Shape, Tensor, TensorArena, TensorError, TensorId,
};
use tokio::sync::mpsc;

/// Where an actor is within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Idle,
    Ready,
    Running,
    Emitting,
}

/// Handles shared by every actor of an engine.
#[derive(Clone)]
pub struct ActorEnv {
    pub arena: Arc<TensorArena>,
    pub allocator: Arc<dyn Allocator>,
    pub mailboxes: Mailboxes,
    pub dispatch: DispatchPolicy,
}

/// A kernel wrapped with its input bookkeeping and outgoing arrows.
pub struct OpActor {
    spec: ActorSpec,
    kernel: Box<dyn Kernel>,
    env: ActorEnv,
    info: CallbackInfo,
    /// Tensors as the kernel expects them on each input slot.
    input_decls: Vec<Tensor>,
    /// Output descriptions, resized with the kernel.
    output_decls: Vec<Tensor>,
    /// Input shapes the kernel was last sized for.
    input_shapes: Vec<Shape>,
    /// Output slots somebody reads: an arrow or a graph output.
    output_used: Vec<bool>,
    routes: Arc<[(ActorId, OpData)]>,
    result_indices: Vec<ResultIndex>,
    required: usize,
    state: ActorState,
    run_id: Option<u64>,
    filled: Vec<Option<TensorId>>,
    received: usize,
}

impl OpActor {
    pub fn new(
        spec: ActorSpec,
        kernel: Box<dyn Kernel>,
        env: ActorEnv,
        compiled: &CompiledGraph,
    ) -> Result<Self, RuntimeError> {
        let decl = |id: TensorId| -> Result<Tensor, RuntimeError> {
            let def = compiled.tensor(id).ok_or(TensorError::InvalidId {
                id,
                len: compiled.tensors.len(),
            })?;
            let mut tensor =
                Tensor::new(def.name.clone(), def.dtype, def.shape.clone(), def.category)
                    .with_format(def.format);
            tensor.set_list(def.list);
            Ok(tensor)
        };
        let input_decls = spec
            .inputs
            .iter()
            .map(|slot| decl(slot.tensor))
            .collect::<Result<Vec<_>, _>>()?;
        let output_decls = spec
            .outputs
            .iter()
            .map(|&id| decl(id))
            .collect::<Result<Vec<_>, _>>()?;
        let input_shapes = input_decls.iter().map(|t| t.shape().clone()).collect();

        let routes: Arc<[(ActorId, OpData)]> = spec
            .arrows
            .iter()
            .filter_map(|arrow| {
                let from = *spec.outputs.get(arrow.from_output)?;
                Some((
                    arrow.to,
                    OpData {
                        from,
                        to_input: arrow.to_input,
                    },
                ))
            })
            .collect();

        let mut output_used = vec![false; spec.outputs.len()];
        for arrow in &spec.arrows {
            if let Some(used) = output_used.get_mut(arrow.from_output) {
                *used = true;
            }
        }

        let info = CallbackInfo {
            node_name: spec.name.clone(),
            op: spec.op.clone(),
        };
        let required = spec.required_inputs();
        let num_inputs = spec.inputs.len();
        let result_indices = spec.result_indices.clone();

        let mut actor = Self {
            spec,
            kernel,
            env,
            info,
            input_decls,
            output_decls,
            input_shapes,
            output_used,
            routes,
            result_indices: Vec::new(),
            required,
            state: ActorState::Idle,
            run_id: None,
            filled: vec![None; num_inputs],
            received: 0,
        };
        for index in result_indices {
            actor.add_result_index(index);
        }
        Ok(actor)
    }

    pub fn id(&self) -> ActorId {
        self.spec.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Marks output slot `index.output_slot` as graph output `index.position`.
    pub fn add_result_index(&mut self, index: ResultIndex) {
        if let Some(used) = self.output_used.get_mut(index.output_slot) {
            *used = true;
        }
        if !self.result_indices.contains(&index) {
            self.result_indices.push(index);
        }
    }

    /// Message loop. Returns on `Stop` or when every sender is gone.
    pub(crate) async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Message>) {
        tracing::trace!("actor '{}' ({}) started", self.spec.name, self.spec.id);
        while let Some(message) = mailbox.recv().await {
            match message {
                Message::Data { ctx, data } => {
                    self.run_op_data(data, &ctx);
                    ctx.exit();
                }
                Message::Start { ctx } => {
                    self.start(&ctx);
                    ctx.exit();
                }
                Message::Stop => break,
            }
        }
        tracing::trace!("actor '{}' stopped", self.spec.name);
    }

    // ── Message handling ───────────────────────────────────────────────

    /// Records one delivered input; executes once all have arrived.
    pub fn run_op_data(&mut self, data: OpData, ctx: &Arc<RunContext>) {
        if ctx.is_aborted() {
            tracing::trace!("'{}': input for aborted run {} dropped", self.spec.name, ctx.run_id());
            return;
        }
        self.begin_run(ctx.run_id());

        let len = self.filled.len();
        let Some(slot) = self.filled.get_mut(data.to_input) else {
            ctx.fail(RuntimeError::SlotOutOfRange {
                actor: self.spec.name.clone(),
                slot: data.to_input,
                len,
            });
            return;
        };
        if slot.is_some() {
            ctx.fail(RuntimeError::DuplicateDelivery {
                actor: self.spec.name.clone(),
                slot: data.to_input,
            });
            return;
        }
        *slot = Some(data.from);
        self.received += 1;

        if self.received == self.required {
            self.state = ActorState::Ready;
            self.execute(ctx);
        }
    }

    /// Executes an actor that waits for no input.
    pub fn start(&mut self, ctx: &Arc<RunContext>) {
        if ctx.is_aborted() {
            return;
        }
        self.begin_run(ctx.run_id());
        if self.required == 0 {
            self.state = ActorState::Ready;
            self.execute(ctx);
        }
    }

    fn begin_run(&mut self, run_id: u64) {
        if self.run_id != Some(run_id) {
            self.run_id = Some(run_id);
            self.filled.fill(None);
            self.received = 0;
            self.state = ActorState::Idle;
        }
    }

    /// Runs the kernel and routes its outputs.
    ///
    /// A panic in the kernel or a hook is caught and fails the run like any
    /// other kernel error, so the in-flight count still drains and the actor
    /// keeps serving later runs.
    fn execute(&mut self, ctx: &Arc<RunContext>) {
        let started = Instant::now();
        self.state = ActorState::Running;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_execute(ctx)))
            .unwrap_or_else(|payload| {
                Err(RuntimeError::Kernel {
                    actor: self.spec.name.clone(),
                    source: KernelError::new(
                        StatusCode::OpExecuteFailure,
                        format!("kernel panicked: {}", panic_message(&*payload)),
                    ),
                })
            });
        match outcome {
            Ok(()) => ctx.record_execution(&self.spec.name, &self.spec.op, started.elapsed()),
            Err(err) => {
                tracing::error!("actor '{}' [{}] failed: {err}", self.spec.name, self.spec.op);
                ctx.fail(err);
            }
        }
        self.state = ActorState::Idle;
    }

    fn try_execute(&mut self, ctx: &Arc<RunContext>) -> Result<(), RuntimeError> {
        let inputs = self.init_input_data()?;
        self.set_input_shape(&inputs)?;
        let mut outputs = self.prepare_output_data()?;
        self.run_kernel(&inputs, &mut outputs, ctx.hooks())?;
        drop(inputs);
        self.state = ActorState::Emitting;
        self.set_output_data(outputs, ctx)
    }

    // ── Input binding ──────────────────────────────────────────────────

    /// Binds every input slot to a tensor the kernel can read.
    pub fn init_input_data(&mut self) -> Result<Vec<Tensor>, RuntimeError> {
        let mut inputs = Vec::with_capacity(self.spec.inputs.len());
        for (index, slot) in self.spec.inputs.iter().enumerate() {
            let src = self
                .filled
                .get(index)
                .copied()
                .flatten()
                .unwrap_or_else(|| slot.source.tensor());
            let tensor = self
                .bind_input(index, slot, src)
                .map_err(|source| RuntimeError::DataMovement {
                    actor: self.spec.name.clone(),
                    slot: index,
                    source,
                })?;
            inputs.push(tensor);
        }
        Ok(inputs)
    }

    fn bind_input(&self, index: usize, slot: &InputSlot, src: TensorId) -> Result<Tensor, TensorError> {
        let arena = &self.env.arena;
        let declared = &self.input_decls[index];
        let needs_cast = arena.with(src, |t| need_cast_data(t, declared))?;
        let deep_copy = slot.isolated
            && matches!(slot.source, SlotSource::GraphInput { .. } | SlotSource::Const { .. });

        let bound = match slot.source {
            SlotSource::Const { .. } => {
                let mut t = arena.snapshot(src)?;
                t.set_own_data(false);
                t
            }
            _ => {
                let acquired = arena.acquire(src, !needs_cast && !deep_copy)?;
                tracing::trace!(
                    "'{}' input {index}: {} {}",
                    self.spec.name,
                    if acquired.moved { "moved" } else { "shared" },
                    src
                );
                acquired.tensor
            }
        };

        let allocator = Some(Arc::clone(&self.env.allocator));
        if needs_cast {
            tracing::debug!(
                "'{}' input {index}: casting {} {:?} to {} {:?}",
                self.spec.name,
                bound.dtype(),
                bound.format(),
                declared.dtype(),
                declared.format()
            );
            cast_tensor(&bound, declared.dtype(), declared.format(), allocator)
        } else if deep_copy {
            copy_tensor(&bound, true, allocator)
        } else {
            Ok(bound)
        }
    }

    /// Resizes the kernel if any input shape differs from the last run.
    pub fn set_input_shape(&mut self, inputs: &[Tensor]) -> Result<(), RuntimeError> {
        let changed = inputs.len() != self.input_shapes.len()
            || inputs
                .iter()
                .zip(&self.input_shapes)
                .any(|(t, shape)| t.shape() != shape);
        if !changed {
            return Ok(());
        }
        tracing::debug!("'{}': input shapes changed, resizing", self.spec.name);
        self.kernel
            .resize(inputs, &mut self.output_decls)
            .map_err(|source| RuntimeError::Kernel {
                actor: self.spec.name.clone(),
                source,
            })?;
        self.input_shapes = inputs.iter().map(|t| t.shape().clone()).collect();
        Ok(())
    }

    /// Fresh output tensors with pool-backed buffers.
    pub fn prepare_output_data(&self) -> Result<Vec<Tensor>, RuntimeError> {
        self.output_decls
            .iter()
            .enumerate()
            .map(|(slot, decl)| {
                let mut out = decl.clone();
                out.malloc_data(Some(Arc::clone(&self.env.allocator)))
                    .map_err(|source| RuntimeError::Output {
                        actor: self.spec.name.clone(),
                        slot,
                        source,
                    })?;
                Ok(out)
            })
            .collect()
    }

    /// Runs the kernel between the run's hooks.
    pub fn run_kernel(
        &mut self,
        inputs: &[Tensor],
        outputs: &mut [Tensor],
        hooks: &KernelHooks,
    ) -> Result<(), RuntimeError> {
        hooks.run_before(&self.info, inputs);
        self.kernel
            .execute(inputs, outputs)
            .map_err(|source| RuntimeError::Kernel {
                actor: self.spec.name.clone(),
                source,
            })?;
        hooks.run_after(&self.info, outputs);
        Ok(())
    }

    // ── Output routing ─────────────────────────────────────────────────

    /// Publishes outputs and notifies every consumer.
    pub fn set_output_data(
        &mut self,
        outputs: Vec<Tensor>,
        ctx: &Arc<RunContext>,
    ) -> Result<(), RuntimeError> {
        for index in &self.result_indices {
            if let Some(tensor) = outputs.get(index.output_slot) {
                ctx.collect(index.position, tensor.clone());
            }
        }

        for (slot, tensor) in outputs.into_iter().enumerate() {
            if !self.output_used[slot] {
                continue;
            }
            let id = self.spec.outputs[slot];
            let previous = self
                .env
                .arena
                .store(id, tensor)
                .map_err(|source| RuntimeError::Output {
                    actor: self.spec.name.clone(),
                    slot,
                    source,
                })?;
            if previous.is_some() {
                tracing::warn!("'{}': output {id} still held data from an earlier run", self.spec.name);
            }
        }

        match self.env.dispatch {
            DispatchPolicy::Inline => send_all(&self.env.mailboxes, &self.routes, ctx),
            DispatchPolicy::Queued => {
                self.async_output(ctx);
                Ok(())
            }
        }
    }

    /// Hands output routing to a separate task.
    ///
    /// The task holds an in-flight token so the run cannot complete before
    /// its messages are posted.
    pub fn async_output(&self, ctx: &Arc<RunContext>) {
        if self.routes.is_empty() {
            return;
        }
        let mailboxes = self.env.mailboxes.clone();
        let routes = Arc::clone(&self.routes);
        let ctx = Arc::clone(ctx);
        ctx.enter();
        tokio::spawn(async move {
            if let Err(err) = send_all(&mailboxes, &routes, &ctx) {
                ctx.fail(err);
            }
            ctx.exit();
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("opaque panic payload")
}

fn send_all(
    mailboxes: &Mailboxes,
    routes: &[(ActorId, OpData)],
    ctx: &Arc<RunContext>,
) -> Result<(), RuntimeError> {
    for &(to, data) in routes {
        mailboxes.send(
            to,
            Message::Data {
                ctx: Arc::clone(ctx),
                data,
            },
        )?;
    }
    Ok(())
}

impl fmt::Debug for OpActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpActor")
            .field("id", &self.spec.id)
            .field("name", &self.spec.name)
            .field("op", &self.spec.op)
            .field("state", &self.state)
            .field("received", &self.received)
            .field("required", &self.required)
            .finish()
    }
}

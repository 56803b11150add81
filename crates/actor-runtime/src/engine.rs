// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The engine with a type-state enforced pipeline.
//!
//! ```text
//! Engine<Idle>
//!     │  .load() / .compile(&graph)
//!     ▼
//! Engine<Compiled>
//!     │  .prepare(&registry)
//!     ▼
//! Engine<Ready>
//!     │  .run(inputs).await   (repeatable)
//!     ▼
//!   RunOutput
//! ```
//!
//! Each state transition consumes the old value and returns a new one,
//! making invalid state sequences a compile error.

use crate::actor::{ActorEnv, OpActor};
use crate::context::RunContext;
use crate::kernel::{KernelHooks, KernelRegistry};
use crate::mindrt::{ActorSystem, Message, OpData};
use crate::{RunMetrics, RuntimeConfig, RuntimeError};
use graph_compiler::{CompiledGraph, GraphCompiler, OutputSource};
use graph_ir::{GraphLoader, KernelGraph, Validated};
use memory_manager::{AllocationStats, Allocator, MemoryPool};
use std::sync::Arc;
use std::time::Instant;
use tensor_core::{Category, Shape, Tensor, TensorArena};

// ── Engine states ──────────────────────────────────────────────

/// Engine is created but no graph is compiled.
#[derive(Debug)]
pub struct Idle;

/// A graph has been compiled into actors and arrows.
#[derive(Debug)]
pub struct Compiled {
    compiled: Arc<CompiledGraph>,
}

/// Actors are running and waiting for inputs.
#[derive(Debug)]
pub struct Ready {
    compiled: Arc<CompiledGraph>,
    pool: MemoryPool,
    arena: Arc<TensorArena>,
    system: ActorSystem,
    input_shapes: Vec<Shape>,
    /// Serializes runs; holds the last run id.
    runs: tokio::sync::Mutex<u64>,
}

/// Sealed trait for engine states.
pub trait EngineState: std::fmt::Debug {}
impl EngineState for Idle {}
impl EngineState for Compiled {}
impl EngineState for Ready {}

// ── Run output ─────────────────────────────────────────────────

/// The result of one run.
#[derive(Debug)]
pub struct RunOutput {
    /// Graph outputs in declaration order.
    pub outputs: Vec<Tensor>,
    pub metrics: RunMetrics,
}

impl RunOutput {
    /// Looks an output up by its graph name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.outputs.iter().find(|t| t.name() == name)
    }
}

// ── Engine ─────────────────────────────────────────────────────

/// The actor-graph engine.
///
/// # Example
/// ```no_run
/// use actor_runtime::{Engine, KernelRegistry, RuntimeConfig};
/// use tensor_core::{Shape, Tensor};
///
/// # async fn example() -> Result<(), actor_runtime::RuntimeError> {
/// let engine = Engine::new(RuntimeConfig::default())
///     .load()?
///     .prepare(&KernelRegistry::with_builtins())?;
/// let x = Tensor::from_values("x", Shape::vector(2), &[1.0f32, 2.0])?;
/// let output = engine.run(vec![x]).await?;
/// println!("{}", output.metrics.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine<S: EngineState = Idle> {
    config: RuntimeConfig,
    state: S,
}

impl<S: EngineState> Engine<S> {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

// ── Idle → Compiled ────────────────────────────────────────────

impl Engine<Idle> {
    pub fn new(config: RuntimeConfig) -> Self {
        tracing::info!("engine created for '{}'", config.graph_path.display());
        Self { config, state: Idle }
    }

    /// Loads the graph named by the configuration and compiles it.
    pub fn load(self) -> Result<Engine<Compiled>, RuntimeError> {
        let graph = GraphLoader::load(&self.config.graph_path)?;
        self.compile(&graph)
    }

    /// Compiles `graph` into actors and arrows.
    pub fn compile(self, graph: &KernelGraph<Validated>) -> Result<Engine<Compiled>, RuntimeError> {
        let compiled = GraphCompiler::new(self.config.max_call_depth).compile(graph)?;
        tracing::info!("{}", compiled.summary());
        Ok(Engine {
            config: self.config,
            state: Compiled {
                compiled: Arc::new(compiled),
            },
        })
    }
}

// ── Compiled → Ready ───────────────────────────────────────────

impl Engine<Compiled> {
    pub fn compiled(&self) -> &CompiledGraph {
        &self.state.compiled
    }

    /// Instantiates kernels and starts one actor per kernel.
    ///
    /// Steps:
    /// 1. Create the memory pool from the budget.
    /// 2. Populate the tensor arena with initial reference counts.
    /// 3. Start the worker pool.
    /// 4. Create and prepare every kernel, then spawn its actor.
    pub fn prepare(self, registry: &KernelRegistry) -> Result<Engine<Ready>, RuntimeError> {
        let budget = self.config.parse_budget()?;
        let dispatch = self.config.dispatch;
        let compiled = self.state.compiled;

        let pool = MemoryPool::new(budget);
        let allocator: Arc<dyn Allocator> = Arc::new(pool.clone());
        tracing::info!("memory pool created: {budget} available");

        let mut arena = TensorArena::new();
        for (index, def) in compiled.tensors.iter().enumerate() {
            let mut tensor = def.to_tensor()?;
            tensor.set_init_ref_count(compiled.init_ref_counts.get(index).copied().unwrap_or(0));
            tensor.reset_ref_count();
            if !tensor.is_const() {
                tensor.set_allocator(Some(Arc::clone(&allocator)));
            }
            arena.push(tensor);
        }
        let arena = Arc::new(arena);

        let threads = self.config.resolve_threads();
        let mut system = ActorSystem::new(threads, compiled.actors.len())?;
        let env = ActorEnv {
            arena: Arc::clone(&arena),
            allocator,
            mailboxes: system.mailboxes(),
            dispatch,
        };
        for spec in &compiled.actors {
            let mut kernel = registry.create(spec)?;
            kernel.prepare().map_err(|source| RuntimeError::Kernel {
                actor: spec.name.clone(),
                source,
            })?;
            let actor = OpActor::new(spec.clone(), kernel, env.clone(), &compiled)?;
            system.spawn(actor)?;
        }

        let input_shapes = compiled
            .inputs
            .iter()
            .map(|input| {
                compiled
                    .tensor(input.tensor)
                    .map(|def| def.shape.clone())
                    .unwrap_or_default()
            })
            .collect();

        tracing::info!(
            "engine ready: {} actors on {threads} workers, {dispatch} dispatch",
            compiled.actors.len()
        );
        Ok(Engine {
            config: self.config,
            state: Ready {
                compiled,
                pool,
                arena,
                system,
                input_shapes,
                runs: tokio::sync::Mutex::new(0),
            },
        })
    }
}

// ── Ready: running ─────────────────────────────────────────────

impl Engine<Ready> {
    pub fn compiled(&self) -> &CompiledGraph {
        &self.state.compiled
    }

    /// Current accepted shape of each graph input.
    pub fn input_shapes(&self) -> &[Shape] {
        &self.state.input_shapes
    }

    /// Runs the graph once.
    pub async fn run(&self, inputs: Vec<Tensor>) -> Result<RunOutput, RuntimeError> {
        self.run_with_hooks(inputs, KernelHooks::default()).await
    }

    /// Runs the graph once, calling `hooks` around every kernel.
    ///
    /// Concurrent calls are serialized. A failed run yields the first
    /// error raised by any actor and no outputs.
    pub async fn run_with_hooks(
        &self,
        inputs: Vec<Tensor>,
        hooks: KernelHooks,
    ) -> Result<RunOutput, RuntimeError> {
        let mut last_run = self.state.runs.lock().await;
        *last_run += 1;
        let run_id = *last_run;

        self.check_inputs(&inputs)?;
        let compiled = &self.state.compiled;
        let started = Instant::now();
        tracing::debug!("run {run_id} started");

        let (ctx, done) = RunContext::new(
            run_id,
            compiled.outputs.len(),
            hooks,
            self.config.enable_profiling,
        );
        let ctx = Arc::new(ctx);
        if let Err(err) = self.dispatch(&ctx, inputs) {
            ctx.fail(err);
        }
        ctx.exit();
        if done.await.is_err() {
            ctx.fail(RuntimeError::ActorSystem("run ended without completion signal".into()));
        }
        self.teardown();

        let mut outputs = ctx.take_outcome()?;
        for (tensor, name) in outputs.iter_mut().zip(&compiled.output_names) {
            tensor.set_name(name.clone());
            tensor.set_category(Category::GraphOutput);
        }

        let mut metrics = RunMetrics::new(run_id, compiled.actors.len());
        for m in ctx.take_timings() {
            metrics.record_actor(m.actor, m.op, m.duration);
        }
        metrics.finalise(
            started.elapsed(),
            ctx.actors_executed(),
            self.state.pool.stats().peak_allocated_bytes,
        );
        tracing::info!("{}", metrics.summary());

        Ok(RunOutput { outputs, metrics })
    }

    /// Rejects inputs whose count, dtype or static dimensions do not match.
    fn check_inputs(&self, inputs: &[Tensor]) -> Result<(), RuntimeError> {
        let compiled = &self.state.compiled;
        if inputs.len() != compiled.inputs.len() {
            return Err(RuntimeError::InvalidInput(format!(
                "graph takes {} inputs, got {}",
                compiled.inputs.len(),
                inputs.len()
            )));
        }
        for ((tensor, spec), shape) in inputs
            .iter()
            .zip(&compiled.inputs)
            .zip(&self.state.input_shapes)
        {
            let Some(def) = compiled.tensor(spec.tensor) else {
                return Err(RuntimeError::InvalidInput(format!("unknown input {}", spec.tensor)));
            };
            if !tensor.has_data() {
                return Err(RuntimeError::InvalidInput(format!(
                    "input '{}' has no data",
                    def.name
                )));
            }
            if tensor.dtype() != def.dtype {
                return Err(RuntimeError::InvalidInput(format!(
                    "input '{}' expects {}, got {}",
                    def.name,
                    def.dtype,
                    tensor.dtype()
                )));
            }
            if !shape_accepts(shape, tensor.shape()) {
                return Err(RuntimeError::InvalidInput(format!(
                    "input '{}' expects shape {shape}, got {}",
                    def.name,
                    tensor.shape()
                )));
            }
        }
        Ok(())
    }

    /// Publishes the inputs and posts the first messages of a run.
    fn dispatch(&self, ctx: &Arc<RunContext>, inputs: Vec<Tensor>) -> Result<(), RuntimeError> {
        let compiled = &self.state.compiled;
        let arena = &self.state.arena;
        let system = &self.state.system;

        for (spec, tensor) in compiled.inputs.iter().zip(inputs) {
            // Teardown empties input slots, so a returned buffer means a leak.
            if let Some(previous) = arena.store(spec.tensor, tensor)? {
                tracing::warn!("input {} still held data from an earlier run", spec.tensor);
                drop(previous);
            }
        }

        // Outputs that are graph inputs or constants need no actor.
        for (position, source) in compiled.outputs.iter().enumerate() {
            match *source {
                OutputSource::GraphInput { tensor, .. } | OutputSource::Const { tensor } => {
                    ctx.collect(position, arena.snapshot(tensor)?);
                }
                OutputSource::Actor { .. } => {}
            }
        }

        for input in &compiled.inputs {
            for &(actor, slot) in &input.receivers {
                system.send(
                    actor,
                    Message::Data {
                        ctx: Arc::clone(ctx),
                        data: OpData {
                            from: input.tensor,
                            to_input: slot,
                        },
                    },
                )?;
            }
        }
        for actor in compiled.initial_actors() {
            system.schedule(actor.id, Arc::clone(ctx))?;
        }
        Ok(())
    }

    /// Drops every run-time buffer still held by the arena.
    fn teardown(&self) {
        for id in self.state.arena.ids() {
            if let Err(err) = self.state.arena.clear(id) {
                tracing::warn!("teardown of {id} failed: {err}");
            }
        }
    }

    /// Changes the accepted shapes of the graph inputs.
    ///
    /// Ranks must stay the same. Actors resize their kernels on the next
    /// run that delivers a differently shaped tensor.
    pub fn resize_inputs(&mut self, shapes: &[Shape]) -> Result<(), RuntimeError> {
        let current = &self.state.input_shapes;
        if shapes.len() != current.len() {
            return Err(RuntimeError::InvalidInput(format!(
                "graph has {} inputs, got {} shapes",
                current.len(),
                shapes.len()
            )));
        }
        for (old, new) in current.iter().zip(shapes) {
            if old.rank() != new.rank() {
                return Err(RuntimeError::InvalidInput(format!(
                    "cannot resize {old} to {new}: rank differs"
                )));
            }
        }
        tracing::debug!("graph inputs resized");
        self.state.input_shapes = shapes.to_vec();
        Ok(())
    }

    /// Pool statistics accumulated over every run so far.
    pub fn memory_stats(&self) -> AllocationStats {
        self.state.pool.stats()
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.state.pool
    }

    /// Stops every actor and returns final pool statistics.
    pub fn terminate(self) -> AllocationStats {
        let Engine { state, .. } = self;
        let Ready {
            pool, mut system, ..
        } = state;
        system.shutdown();
        let stats = pool.stats();
        tracing::info!("engine terminated: {}", stats.summary());
        stats
    }
}

/// A `-1` dimension accepts any extent.
fn shape_accepts(expected: &Shape, actual: &Shape) -> bool {
    expected.rank() == actual.rank()
        && expected
            .dims()
            .iter()
            .zip(actual.dims())
            .all(|(&e, &a)| e < 0 || e == a)
}

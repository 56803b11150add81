// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # actor-runtime
//!
//! Dataflow execution of compiled kernel graphs on an actor substrate.
//!
//! The runtime takes:
//! - A validated `KernelGraph` from `graph-ir`.
//! - A `CompiledGraph` (actors and arrows) from `graph-compiler`.
//! - A `MemoryPool` from `memory-manager`.
//!
//! Every kernel instance becomes an [`OpActor`] with its own mailbox. An
//! actor executes as soon as all of its inputs have been delivered, then
//! publishes its outputs and notifies its consumers along precomputed
//! arrows. Independent actors run in parallel on the worker pool; there is
//! no global schedule.
//!
//! # Type-State Pipeline
//! ```text
//! Engine<Idle> → Engine<Compiled> → Engine<Ready>
//! ```
//! Transitions are compile-time checked.
//!
//! # Async Execution
//! Actors run on a dedicated multi-threaded `tokio` runtime sized by
//! [`RuntimeConfig::num_threads`]. [`Engine::run`] is async and resolves
//! once no message of the run is in flight.

mod actor;
mod config;
mod context;
mod engine;
mod error;
pub mod kernel;
mod metrics;
mod mindrt;

pub use actor::{ActorEnv, ActorState, OpActor};
pub use config::{DispatchPolicy, RuntimeConfig};
pub use context::RunContext;
pub use engine::{Compiled, Engine, EngineState, Idle, Ready, RunOutput};
pub use error::{KernelError, RuntimeError, StatusCode};
pub use kernel::{CallbackInfo, Kernel, KernelHooks, KernelRegistry};
pub use metrics::{ActorMetrics, RunMetrics};
pub use mindrt::{ActorSystem, Mailboxes, Message, OpData};

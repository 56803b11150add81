// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Actor substrate: mailboxes, messages and the worker pool.
//!
//! Each actor is a long-lived task on a dedicated multi-threaded tokio
//! runtime, draining its own unbounded mailbox in FIFO order. One task per
//! actor serializes the actor's message handling, so actor state needs no
//! locking while different actors run in parallel on the worker threads.
//!
//! ```text
//!   engine ──Data/Start──▶ [mailbox a0] ──▶ a0 ──Data──▶ [mailbox a1] ──▶ a1
//!                                                  └──▶ [mailbox a2] ──▶ a2
//! ```

use crate::actor::OpActor;
use crate::context::RunContext;
use crate::RuntimeError;
use graph_compiler::ActorId;
use std::sync::Arc;
use tensor_core::TensorId;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Notification that the tensor `from` is ready for input slot `to_input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpData {
    pub from: TensorId,
    pub to_input: usize,
}

/// What an actor's mailbox carries.
#[derive(Debug)]
pub enum Message {
    /// One input became available.
    Data { ctx: Arc<RunContext>, data: OpData },
    /// Run an actor that has no inputs to wait for.
    Start { ctx: Arc<RunContext> },
    /// Leave the message loop.
    Stop,
}

impl Message {
    pub fn context(&self) -> Option<&Arc<RunContext>> {
        match self {
            Self::Data { ctx, .. } | Self::Start { ctx } => Some(ctx),
            Self::Stop => None,
        }
    }
}

// ── Mailboxes ──────────────────────────────────────────────────────

/// Sending side of every actor's mailbox, indexed by [`ActorId`].
#[derive(Debug, Clone)]
pub struct Mailboxes {
    senders: Arc<Vec<mpsc::UnboundedSender<Message>>>,
}

impl Mailboxes {
    /// Posts `message` to actor `to`.
    ///
    /// A run message counts as in flight from here until the receiving
    /// actor has handled it.
    pub fn send(&self, to: ActorId, message: Message) -> Result<(), RuntimeError> {
        let sender = self
            .senders
            .get(to.0)
            .ok_or(RuntimeError::UnknownActor(to))?;
        if let Some(ctx) = message.context() {
            ctx.enter();
        }
        sender.send(message).map_err(|returned| {
            if let Some(ctx) = returned.0.context() {
                ctx.exit();
            }
            RuntimeError::ActorSystem(format!("mailbox of {to} is closed"))
        })
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

// ── ActorSystem ────────────────────────────────────────────────────

/// Owns the worker threads and the actor tasks running on them.
pub struct ActorSystem {
    runtime: Option<Runtime>,
    mailboxes: Mailboxes,
    receivers: Vec<Option<mpsc::UnboundedReceiver<Message>>>,
    num_threads: usize,
}

impl ActorSystem {
    /// Starts `num_threads` workers and opens one mailbox per actor.
    pub fn new(num_threads: usize, num_actors: usize) -> Result<Self, RuntimeError> {
        let num_threads = num_threads.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(num_threads)
            .thread_name("actor-rt-worker")
            .enable_all()
            .build()
            .map_err(|e| RuntimeError::ActorSystem(format!("cannot start worker pool: {e}")))?;

        let (senders, receivers): (Vec<_>, Vec<_>) = (0..num_actors)
            .map(|_| {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, Some(rx))
            })
            .unzip();

        tracing::debug!("actor system started: {num_threads} workers, {num_actors} mailboxes");
        Ok(Self {
            runtime: Some(runtime),
            mailboxes: Mailboxes {
                senders: Arc::new(senders),
            },
            receivers,
            num_threads,
        })
    }

    /// A handle actors use to message each other.
    pub fn mailboxes(&self) -> Mailboxes {
        self.mailboxes.clone()
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn num_actors(&self) -> usize {
        self.mailboxes.len()
    }

    /// Starts `actor`'s message loop on the worker pool.
    pub fn spawn(&mut self, actor: OpActor) -> Result<(), RuntimeError> {
        let id = actor.id();
        let receiver = self
            .receivers
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(RuntimeError::UnknownActor(id))?;
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| RuntimeError::ActorSystem("actor system is shut down".into()))?;
        runtime.spawn(actor.run(receiver));
        Ok(())
    }

    pub fn send(&self, to: ActorId, message: Message) -> Result<(), RuntimeError> {
        self.mailboxes.send(to, message)
    }

    /// Asks actor `to` to execute for the run behind `ctx`.
    pub fn schedule(&self, to: ActorId, ctx: Arc<RunContext>) -> Result<(), RuntimeError> {
        self.mailboxes.send(to, Message::Start { ctx })
    }

    /// Stops every actor and releases the worker threads.
    ///
    /// Does not block, so it is safe to call from within async code.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        for index in 0..self.mailboxes.len() {
            let _ = self.mailboxes.send(ActorId(index), Message::Stop);
        }
        runtime.shutdown_background();
        tracing::debug!("actor system shut down");
    }
}

impl Drop for ActorSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("num_threads", &self.num_threads)
            .field("num_actors", &self.num_actors())
            .field("running", &self.runtime.is_some())
            .finish()
    }
}

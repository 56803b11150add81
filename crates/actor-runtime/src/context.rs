// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-run shared state.
//!
//! Every message of a run carries an `Arc<RunContext>`. The context tracks
//! how many messages are still in flight; when the count drops to zero no
//! actor can execute again for this run and the waiting engine is woken.
//! The engine itself holds one token while it dispatches, so the count
//! cannot reach zero before the first messages are queued.

use crate::kernel::KernelHooks;
use crate::metrics::ActorMetrics;
use crate::RuntimeError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tensor_core::Tensor;
use tokio::sync::oneshot;

/// State shared by every actor taking part in one run.
pub struct RunContext {
    run_id: u64,
    hooks: KernelHooks,
    profiling: bool,
    inflight: AtomicUsize,
    done: Mutex<Option<oneshot::Sender<()>>>,
    aborted: AtomicBool,
    failure: Mutex<Option<RuntimeError>>,
    results: Mutex<Vec<Option<Tensor>>>,
    executed: AtomicUsize,
    timings: Mutex<Vec<ActorMetrics>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunContext {
    /// Creates the context for run `run_id` with `num_outputs` result
    /// positions. The receiver fires once the run is quiescent.
    pub(crate) fn new(
        run_id: u64,
        num_outputs: usize,
        hooks: KernelHooks,
        profiling: bool,
    ) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let ctx = Self {
            run_id,
            hooks,
            profiling,
            inflight: AtomicUsize::new(1),
            done: Mutex::new(Some(tx)),
            aborted: AtomicBool::new(false),
            failure: Mutex::new(None),
            results: Mutex::new((0..num_outputs).map(|_| None).collect()),
            executed: AtomicUsize::new(0),
            timings: Mutex::new(Vec::new()),
        };
        (ctx, rx)
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn hooks(&self) -> &KernelHooks {
        &self.hooks
    }

    // ── Quiescence ─────────────────────────────────────────────────────

    /// Registers one more message (or pending task) for this run.
    pub(crate) fn enter(&self) {
        self.inflight.fetch_add(1, Ordering::AcqRel);
    }

    /// Retires one message. The last one wakes the engine.
    pub(crate) fn exit(&self) {
        if self.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(tx) = lock(&self.done).take() {
                let _ = tx.send(());
            }
        }
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    // ── Failure ────────────────────────────────────────────────────────

    /// Aborts the run. Only the first failure is reported to the caller.
    pub(crate) fn fail(&self, err: RuntimeError) {
        if self.aborted.swap(true, Ordering::AcqRel) {
            tracing::debug!("run {}: further failure ignored: {err}", self.run_id);
            return;
        }
        tracing::error!("run {} aborted: {err}", self.run_id);
        *lock(&self.failure) = Some(err);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    // ── Results ────────────────────────────────────────────────────────

    /// Stores the tensor for graph output `position`.
    pub(crate) fn collect(&self, position: usize, tensor: Tensor) {
        let mut results = lock(&self.results);
        if let Some(slot) = results.get_mut(position) {
            *slot = Some(tensor);
        }
    }

    pub(crate) fn record_execution(&self, actor: &str, op: &str, duration: Duration) {
        self.executed.fetch_add(1, Ordering::AcqRel);
        if self.profiling {
            lock(&self.timings).push(ActorMetrics {
                actor: actor.to_string(),
                op: op.to_string(),
                duration,
            });
        }
    }

    pub fn actors_executed(&self) -> usize {
        self.executed.load(Ordering::Acquire)
    }

    pub(crate) fn take_timings(&self) -> Vec<ActorMetrics> {
        std::mem::take(&mut *lock(&self.timings))
    }

    /// The run's outputs, or the first failure.
    ///
    /// A clean run that left an output position empty is reported as
    /// [`RuntimeError::IncompleteRun`].
    pub(crate) fn take_outcome(&self) -> Result<Vec<Tensor>, RuntimeError> {
        if let Some(err) = lock(&self.failure).take() {
            return Err(err);
        }
        let results = std::mem::take(&mut *lock(&self.results));
        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            return Err(RuntimeError::IncompleteRun(missing));
        }
        Ok(results.into_iter().flatten().collect())
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("inflight", &self.inflight())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KernelError, StatusCode};
    use tensor_core::Shape;

    fn ctx(outputs: usize) -> (RunContext, oneshot::Receiver<()>) {
        RunContext::new(1, outputs, KernelHooks::new(), true)
    }

    #[test]
    fn test_quiescence_after_last_exit() {
        let (ctx, mut rx) = ctx(0);
        ctx.enter();
        ctx.exit();
        assert!(rx.try_recv().is_err());
        ctx.exit();
        assert!(rx.try_recv().is_ok());
        assert_eq!(ctx.inflight(), 0);
    }

    #[test]
    fn test_first_failure_wins() {
        let (ctx, _rx) = ctx(1);
        ctx.fail(RuntimeError::Kernel {
            actor: "a".into(),
            source: KernelError::new(StatusCode::OpExecuteFailure, "first"),
        });
        ctx.fail(RuntimeError::InvalidInput("second".into()));
        assert!(ctx.is_aborted());
        let err = ctx.take_outcome().unwrap_err();
        assert_eq!(err.status(), StatusCode::OpExecuteFailure);
    }

    #[test]
    fn test_missing_output_is_incomplete() {
        let (ctx, _rx) = ctx(2);
        let t = Tensor::from_values("y", Shape::vector(1), &[1.0f32]).unwrap();
        ctx.collect(1, t);
        match ctx.take_outcome() {
            Err(RuntimeError::IncompleteRun(missing)) => assert_eq!(missing, vec![0]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_outputs_in_position_order() {
        let (ctx, _rx) = ctx(2);
        ctx.collect(1, Tensor::from_values("b", Shape::vector(1), &[2.0f32]).unwrap());
        ctx.collect(0, Tensor::from_values("a", Shape::vector(1), &[1.0f32]).unwrap());
        let out = ctx.take_outcome().unwrap();
        assert_eq!(out[0].name(), "a");
        assert_eq!(out[1].name(), "b");
    }

    #[test]
    fn test_timings_only_when_profiling() {
        let (off, _rx) = RunContext::new(1, 0, KernelHooks::new(), false);
        off.record_execution("a", "identity", Duration::from_millis(1));
        assert_eq!(off.actors_executed(), 1);
        assert!(off.take_timings().is_empty());

        let (on, _rx) = ctx(0);
        on.record_execution("a", "identity", Duration::from_millis(1));
        assert_eq!(on.take_timings().len(), 1);
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel capability and registry.
//!
//! Kernels are opaque to the scheduler: an actor hands a kernel its bound
//! input tensors and freshly allocated outputs and only looks at the
//! returned status. Which implementation backs an operator is decided once,
//! when the engine is prepared, by looking the node's `op` up in a
//! [`KernelRegistry`].
//!
//! # Extensibility
//! ```ignore
//! #[derive(Debug)]
//! struct Negate;
//! impl Kernel for Negate {
//!     fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
//!         let values: Vec<f64> = inputs[0].to_f64_vec()?.iter().map(|v| -v).collect();
//!         outputs[0].write_f64(&values)?;
//!         Ok(())
//!     }
//! }
//! registry.register("negate", |_spec| Ok(Box::new(Negate)));
//! ```

pub mod builtin;

use crate::{KernelError, RuntimeError};
use graph_compiler::ActorSpec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tensor_core::Tensor;

/// An executable operator.
pub trait Kernel: Send + fmt::Debug {
    /// One-time setup, called when the engine is prepared.
    fn prepare(&mut self) -> Result<(), KernelError> {
        Ok(())
    }

    /// Recomputes output shapes after an input shape changed.
    ///
    /// The default gives every output the first input's shape.
    fn resize(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        if let Some(first) = inputs.first() {
            for out in outputs.iter_mut() {
                out.set_shape(first.shape().clone());
            }
        }
        Ok(())
    }

    /// Computes `outputs` from `inputs`. Outputs arrive allocated.
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError>;
}

/// What a hook is told about the kernel being run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackInfo {
    pub node_name: String,
    pub op: String,
}

/// A hook receives the kernel's inputs (before) or outputs (after).
/// Returning `false` is logged; execution continues.
pub type KernelCallback = Arc<dyn Fn(&CallbackInfo, &[Tensor]) -> bool + Send + Sync>;

/// Callbacks run around every kernel execution of one run.
#[derive(Clone, Default)]
pub struct KernelHooks {
    pub before: Option<KernelCallback>,
    pub after: Option<KernelCallback>,
}

impl KernelHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before(
        mut self,
        f: impl Fn(&CallbackInfo, &[Tensor]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.before = Some(Arc::new(f));
        self
    }

    pub fn with_after(
        mut self,
        f: impl Fn(&CallbackInfo, &[Tensor]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(Arc::new(f));
        self
    }

    pub(crate) fn run_before(&self, info: &CallbackInfo, inputs: &[Tensor]) {
        if let Some(before) = &self.before {
            if !before(info, inputs) {
                tracing::warn!("before-hook rejected '{}' [{}]", info.node_name, info.op);
            }
        }
    }

    pub(crate) fn run_after(&self, info: &CallbackInfo, outputs: &[Tensor]) {
        if let Some(after) = &self.after {
            if !after(info, outputs) {
                tracing::warn!("after-hook rejected '{}' [{}]", info.node_name, info.op);
            }
        }
    }
}

impl fmt::Debug for KernelHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelHooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Builds a kernel for one actor.
pub type KernelFactory =
    Arc<dyn Fn(&ActorSpec) -> Result<Box<dyn Kernel>, KernelError> + Send + Sync>;

/// Maps operator names to kernel factories.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    factories: HashMap<String, KernelFactory>,
}

impl KernelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the reference kernels in [`builtin`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Registers (or replaces) the factory for `op`.
    pub fn register(
        &mut self,
        op: impl Into<String>,
        factory: impl Fn(&ActorSpec) -> Result<Box<dyn Kernel>, KernelError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.factories.insert(op.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, op: &str) -> bool {
        self.factories.contains_key(op)
    }

    /// Registered operator names, sorted.
    pub fn ops(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }

    /// Instantiates the kernel for `spec`.
    pub fn create(&self, spec: &ActorSpec) -> Result<Box<dyn Kernel>, RuntimeError> {
        let factory = self
            .factories
            .get(&spec.op)
            .ok_or_else(|| RuntimeError::KernelNotFound {
                op: spec.op.clone(),
                node: spec.name.clone(),
            })?;
        factory(spec).map_err(|source| RuntimeError::Kernel {
            actor: spec.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("ops", &self.ops())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;
    use graph_compiler::ActorId;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tensor_core::Shape;

    fn spec(op: &str) -> ActorSpec {
        ActorSpec {
            id: ActorId(0),
            name: "n".into(),
            op: op.into(),
            attrs: BTreeMap::new(),
            inputs: vec![],
            outputs: vec![],
            arrows: vec![],
            result_indices: vec![],
        }
    }

    #[test]
    fn test_builtins_registered() {
        let r = KernelRegistry::with_builtins();
        for op in ["identity", "cast", "add", "add_scalar", "scale"] {
            assert!(r.contains(op), "missing {op}");
        }
        assert!(r.create(&spec("identity")).is_ok());
    }

    #[test]
    fn test_unknown_op() {
        let r = KernelRegistry::new();
        let err = r.create(&spec("conv")).unwrap_err();
        assert_eq!(err.status(), StatusCode::NotFindOp);
    }

    #[test]
    fn test_factory_error_keeps_code() {
        let mut r = KernelRegistry::new();
        r.register("bad", |_| Err(KernelError::new(StatusCode::InvalidOpAttr, "no")));
        let err = r.create(&spec("bad")).unwrap_err();
        assert_eq!(err.status(), StatusCode::InvalidOpAttr);
    }

    #[test]
    fn test_hooks_called() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let hooks = KernelHooks::new()
            .with_before(move |_, inputs| {
                seen.fetch_add(inputs.len(), Ordering::SeqCst);
                false
            });
        let info = CallbackInfo {
            node_name: "n".into(),
            op: "identity".into(),
        };
        let t = Tensor::from_values("x", Shape::vector(1), &[1.0f32]).unwrap();
        hooks.run_before(&info, &[t.clone(), t]);
        hooks.run_after(&info, &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

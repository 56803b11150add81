// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference kernels.
//!
//! | Op | Inputs | Attributes | Output |
//! |---|---|---|---|
//! | `identity` | 1 | | copy of the input |
//! | `cast` | 1 | `to` (dtype name, optional) | input converted to the output dtype |
//! | `add` | 2 | | elementwise sum |
//! | `add_scalar` | 1 | `value` | input + value |
//! | `scale` | 1 | `factor` | input × factor |
//! | `list_pack` | 1+ | | list holding a copy of every input |
//! | `list_sum` | 1 (list) | | elementwise sum of the list's elements |
//!
//! Arithmetic goes through `f64`, which is exact for every supported
//! element type except `i64` beyond 2^53.

use super::{Kernel, KernelRegistry};
use crate::{KernelError, StatusCode};
use graph_compiler::ActorSpec;
use tensor_core::{copy_tensor, DType, Tensor, TensorError};

/// Registers every reference kernel.
pub fn register_all(registry: &mut KernelRegistry) {
    registry
        .register("identity", |_| Ok(Box::new(Identity)))
        .register("cast", |spec| Ok(Box::new(Cast::from_spec(spec)?)))
        .register("add", |_| Ok(Box::new(Add)))
        .register("add_scalar", |spec| {
            Ok(Box::new(AddScalar {
                value: required_f64(spec, "value")?,
            }))
        })
        .register("scale", |spec| {
            Ok(Box::new(Scale {
                factor: required_f64(spec, "factor")?,
            }))
        })
        .register("list_pack", |_| Ok(Box::new(ListPack)))
        .register("list_sum", |_| Ok(Box::new(ListSum)));
}

fn required_f64(spec: &ActorSpec, key: &str) -> Result<f64, KernelError> {
    spec.attr_f64(key).ok_or_else(|| {
        KernelError::new(
            StatusCode::InvalidOpAttr,
            format!("'{}' [{}] needs numeric attribute '{key}'", spec.name, spec.op),
        )
    })
}

fn arity(inputs: &[Tensor], outputs: &[Tensor], n_in: usize) -> Result<(), KernelError> {
    if inputs.len() != n_in || outputs.len() != 1 {
        return Err(KernelError::new(
            StatusCode::InputTensorError,
            format!(
                "expected {n_in} inputs and 1 output, got {} and {}",
                inputs.len(),
                outputs.len()
            ),
        ));
    }
    Ok(())
}

/// Writes `f(x)` for every element of `input` into `output`.
fn map_values(
    input: &Tensor,
    output: &mut Tensor,
    f: impl Fn(f64) -> f64,
) -> Result<(), KernelError> {
    let values: Vec<f64> = input.to_f64_vec()?.into_iter().map(f).collect();
    output.write_f64(&values)?;
    Ok(())
}

#[derive(Debug)]
pub struct Identity;

impl Kernel for Identity {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        arity(inputs, outputs, 1)?;
        let (input, output) = (&inputs[0], &mut outputs[0]);
        if input.dtype() != output.dtype() {
            return Err(TensorError::DTypeMismatch {
                op: "identity",
                expected: output.dtype(),
                actual: input.dtype(),
            }
            .into());
        }
        let src = input.bytes()?;
        let dst = output.bytes_mut()?;
        if src.len() != dst.len() {
            return Err(TensorError::BufferSizeMismatch {
                expected: dst.len(),
                actual: src.len(),
            }
            .into());
        }
        dst.copy_from_slice(src);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Cast {
    to: Option<DType>,
}

impl Cast {
    fn from_spec(spec: &ActorSpec) -> Result<Self, KernelError> {
        let to = match spec.attrs.get("to") {
            None => None,
            Some(value) => Some(serde_json::from_value(value.clone()).map_err(|e| {
                KernelError::new(
                    StatusCode::InvalidOpAttr,
                    format!("'{}': bad target dtype {value}: {e}", spec.name),
                )
            })?),
        };
        Ok(Self { to })
    }
}

impl Kernel for Cast {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        arity(inputs, outputs, 1)?;
        if let Some(to) = self.to {
            if outputs[0].dtype() != to {
                return Err(KernelError::new(
                    StatusCode::InvalidOpAttr,
                    format!("cast to {to} but output is {}", outputs[0].dtype()),
                ));
            }
        }
        map_values(&inputs[0], &mut outputs[0], |v| v)
    }
}

#[derive(Debug)]
pub struct Add;

impl Kernel for Add {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        arity(inputs, outputs, 2)?;
        let (lhs, rhs) = (&inputs[0], &inputs[1]);
        if lhs.num_elements() != rhs.num_elements() {
            return Err(TensorError::ShapeMismatch {
                op: "add",
                lhs: lhs.shape().clone(),
                rhs: rhs.shape().clone(),
            }
            .into());
        }
        let sums: Vec<f64> = lhs
            .to_f64_vec()?
            .into_iter()
            .zip(rhs.to_f64_vec()?)
            .map(|(a, b)| a + b)
            .collect();
        outputs[0].write_f64(&sums)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct AddScalar {
    value: f64,
}

impl Kernel for AddScalar {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        arity(inputs, outputs, 1)?;
        let value = self.value;
        map_values(&inputs[0], &mut outputs[0], |v| v + value)
    }
}

#[derive(Debug)]
pub struct Scale {
    factor: f64,
}

impl Kernel for Scale {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        arity(inputs, outputs, 1)?;
        let factor = self.factor;
        map_values(&inputs[0], &mut outputs[0], |v| v * factor)
    }
}

#[derive(Debug)]
pub struct ListPack;

impl Kernel for ListPack {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        if inputs.is_empty() || outputs.len() != 1 {
            return Err(KernelError::new(
                StatusCode::InputTensorError,
                "list_pack takes at least one input and one output",
            ));
        }
        let list = &mut outputs[0];
        if !list.is_list() {
            return Err(TensorError::NotAList {
                name: list.name().to_string(),
            }
            .into());
        }
        let allocator = list.allocator().cloned();
        for input in inputs {
            list.push_element(copy_tensor(input, true, allocator.clone())?)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ListSum;

impl Kernel for ListSum {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), KernelError> {
        arity(inputs, outputs, 1)?;
        let len = outputs[0].num_elements().unwrap_or(0);
        let mut sums = vec![0.0; len];
        for element in inputs[0].elements()? {
            if element.num_elements() != Some(len) {
                return Err(TensorError::ShapeMismatch {
                    op: "list_sum",
                    lhs: outputs[0].shape().clone(),
                    rhs: element.shape().clone(),
                }
                .into());
            }
            for (sum, v) in sums.iter_mut().zip(element.to_f64_vec()?) {
                *sum += v;
            }
        }
        outputs[0].write_f64(&sums)?;
        Ok(())
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types and status codes for the actor runtime.

use graph_compiler::ActorId;
use std::fmt;

/// Status codes shared with kernels.
///
/// Numeric values follow the lite runtime's code table so codes reported by
/// kernels survive unchanged through a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    Error = -1,
    NullPtr = -2,
    ParamInvalid = -3,
    NoChange = -4,
    SuccessExit = -5,
    MemoryFailed = -6,
    NotSupport = -7,
    ThreadPoolError = -8,
    OutOfTensorRange = -100,
    InputTensorError = -101,
    ReentrantError = -102,
    GraphFileError = -200,
    NotFindOp = -300,
    InvalidOpName = -301,
    InvalidOpAttr = -302,
    OpExecuteFailure = -303,
    FormatError = -400,
    InferError = -500,
    InferInvalid = -501,
    InputParamInvalid = -600,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} ({})", self.code())
    }
}

/// Failure reported by a kernel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct KernelError {
    pub code: StatusCode,
    pub message: String,
}

impl KernelError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<tensor_core::TensorError> for KernelError {
    fn from(e: tensor_core::TensorError) -> Self {
        Self::new(tensor_status(&e), e.to_string())
    }
}

/// Errors that can occur while compiling, preparing or running a graph.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A kernel returned a non-OK status.
    #[error("kernel '{actor}' failed: {source}")]
    Kernel {
        actor: String,
        #[source]
        source: KernelError,
    },

    /// Moving, sharing or casting an input failed.
    #[error("input {slot} of '{actor}': {source}")]
    DataMovement {
        actor: String,
        slot: usize,
        #[source]
        source: tensor_core::TensorError,
    },

    /// Allocating or storing an output failed.
    #[error("output {slot} of '{actor}': {source}")]
    Output {
        actor: String,
        slot: usize,
        #[source]
        source: tensor_core::TensorError,
    },

    /// Two deliveries reached the same input slot within one run.
    #[error("actor '{actor}' received input {slot} twice in one run")]
    DuplicateDelivery { actor: String, slot: usize },

    /// A delivery addressed an input slot the actor does not have.
    #[error("actor '{actor}' has {len} inputs, delivery targets slot {slot}")]
    SlotOutOfRange {
        actor: String,
        slot: usize,
        len: usize,
    },

    #[error("message for unknown actor {0}")]
    UnknownActor(ActorId),

    /// No kernel is registered for an operator.
    #[error("no kernel registered for op '{op}' (node '{node}')")]
    KernelNotFound { op: String, node: String },

    /// Caller-supplied inputs do not match the graph.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The run quiesced without producing every graph output.
    #[error("run finished without graph outputs {0:?}")]
    IncompleteRun(Vec<usize>),

    /// The worker pool could not be created or a mailbox was closed.
    #[error("actor system error: {0}")]
    ActorSystem(String),

    #[error("graph error: {0}")]
    Graph(#[from] graph_ir::GraphError),

    #[error("compile error: {0}")]
    Compile(#[from] graph_compiler::CompileError),

    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    #[error("memory error: {0}")]
    Memory(#[from] memory_manager::MemoryError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl RuntimeError {
    /// Status code callers compare against; kernel codes pass through.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Kernel { source, .. } => source.code,
            Self::DataMovement { source, .. } | Self::Output { source, .. } | Self::Tensor(source) => {
                tensor_status(source)
            }
            Self::DuplicateDelivery { .. } => StatusCode::ReentrantError,
            Self::SlotOutOfRange { .. } => StatusCode::OutOfTensorRange,
            Self::UnknownActor(_) => StatusCode::NullPtr,
            Self::KernelNotFound { .. } => StatusCode::NotFindOp,
            Self::InvalidInput(_) => StatusCode::InputParamInvalid,
            Self::IncompleteRun(_) => StatusCode::InferInvalid,
            Self::ActorSystem(_) => StatusCode::ThreadPoolError,
            Self::Graph(_) | Self::Compile(_) => StatusCode::GraphFileError,
            Self::Memory(_) => StatusCode::MemoryFailed,
            Self::ConfigError(_) => StatusCode::ParamInvalid,
        }
    }
}

fn tensor_status(e: &tensor_core::TensorError) -> StatusCode {
    use tensor_core::TensorError as E;
    match e {
        E::Allocation(_) => StatusCode::MemoryFailed,
        E::UnsupportedFormat { .. } => StatusCode::FormatError,
        E::DynamicShape { .. } => StatusCode::InferInvalid,
        E::InvalidId { .. } => StatusCode::OutOfTensorRange,
        _ => StatusCode::InputTensorError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_manager::MemoryError;
    use tensor_core::{Format, TensorError};

    #[test]
    fn test_numeric_codes() {
        assert_eq!(StatusCode::Ok.code(), 0);
        assert_eq!(StatusCode::OpExecuteFailure.code(), -303);
        assert_eq!(StatusCode::InputParamInvalid.code(), -600);
        assert!(StatusCode::Ok.is_ok());
        assert_eq!(StatusCode::FormatError.to_string(), "FormatError (-400)");
    }

    #[test]
    fn test_kernel_code_preserved() {
        let e = RuntimeError::Kernel {
            actor: "n2".into(),
            source: KernelError::new(StatusCode::InferError, "boom"),
        };
        assert_eq!(e.status(), StatusCode::InferError);
        assert!(e.to_string().contains("boom"));
    }

    #[test]
    fn test_tensor_error_mapping() {
        let oom = TensorError::Allocation(MemoryError::ZeroSizedAllocation);
        assert_eq!(KernelError::from(oom).code, StatusCode::MemoryFailed);

        let layout = RuntimeError::DataMovement {
            actor: "a".into(),
            slot: 0,
            source: TensorError::UnsupportedFormat {
                from: Format::Kchw,
                to: Format::Nhwc,
                rank: 4,
            },
        };
        assert_eq!(layout.status(), StatusCode::FormatError);
    }
}

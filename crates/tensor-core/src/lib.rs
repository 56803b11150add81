// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor types shared by the graph compiler and the actor runtime.
//!
//! This crate provides:
//! - [`Tensor`]: a reference-counted, shape/type/format/category-tagged
//!   buffer that owns or borrows its backing memory.
//! - [`Shape`]: dimensions with `-1` marking an unresolved dynamic axis.
//! - [`DType`] and the [`Element`] trait linking it to Rust types.
//! - [`cast_tensor`]: dtype casting and `NHWC ↔ NCHW` layout conversion,
//!   applied per element for tensor lists.
//! - [`TensorArena`]: tensor storage keyed by stable [`TensorId`]s with an
//!   explicit per-slot [`Ownership`] tag.
//!
//! # Lifetime Rules
//! - A buffer is shared through an `Arc`; memory returns to its pool when the
//!   last handle is dropped, so release happens exactly once.
//! - `dec_ref_count` only drops a tensor's handle when it owns the data, is
//!   neither const nor a graph output, and its allocator is refcount managed.

mod arena;
mod cast;
mod category;
mod dtype;
mod error;
mod format;
mod list;
mod quant;
mod shape;
mod tensor;

pub use arena::{Acquired, Ownership, TensorArena, TensorId};
pub use cast::{cast_tensor, need_cast_data};
pub use category::Category;
pub use dtype::{DType, Element};
pub use error::TensorError;
pub use format::Format;
pub use list::cast_tensor_list;
pub use quant::QuantParam;
pub use shape::Shape;
pub use tensor::{copy_tensor, copy_tensor_data, create_tensor, Buffer, Tensor};

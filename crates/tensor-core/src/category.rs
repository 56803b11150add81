// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor categories.

/// The role a tensor plays in the graph.
///
/// Category drives lifetime: consts and graph outputs are never reclaimed
/// by reference counting, graph inputs hold caller-provided memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Weight or other constant with data fixed at load time.
    Const,
    /// A constant holding exactly one element.
    ConstScalar,
    /// Intermediate activation produced by a kernel.
    #[default]
    Var,
    /// Fed by the caller at the start of every run.
    GraphInput,
    /// Returned to the caller at the end of every run.
    GraphOutput,
}

impl Category {
    pub fn is_const(self) -> bool {
        matches!(self, Category::Const | Category::ConstScalar)
    }
}

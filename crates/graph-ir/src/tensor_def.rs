// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor declarations.

use tensor_core::{create_tensor, Category, DType, Element, Format, QuantParam, Shape, Tensor};

/// A tensor as declared in the graph.
///
/// Only constants carry data; every other tensor is filled at run time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorDef {
    pub name: String,
    pub dtype: DType,
    pub shape: Shape,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub category: Category,
    /// A tensor list whose elements have `dtype` and `shape`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
    /// Little-endian element bytes for constants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quant_params: Vec<QuantParam>,
}

impl TensorDef {
    pub fn new(name: impl Into<String>, dtype: DType, shape: Shape, category: Category) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
            format: Format::default(),
            category,
            list: false,
            data: None,
            quant_params: Vec::new(),
        }
    }

    /// A constant holding `values`; single-element constants are scalars.
    pub fn constant<T: Element>(name: impl Into<String>, shape: Shape, values: &[T]) -> Self {
        let width = T::DTYPE.size_bytes();
        let mut bytes = vec![0u8; values.len() * width];
        for (chunk, v) in bytes.chunks_exact_mut(width).zip(values) {
            v.write_le(chunk);
        }
        let category = if values.len() == 1 {
            Category::ConstScalar
        } else {
            Category::Const
        };
        Self {
            data: Some(bytes),
            ..Self::new(name, T::DTYPE, shape, category)
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Marks the tensor as a list of `dtype` × `shape` elements.
    pub fn with_list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn is_const(&self) -> bool {
        self.category.is_const()
    }

    /// Materialises the declaration as a runtime tensor.
    ///
    /// Constants get their data attached; everything else starts empty.
    pub fn to_tensor(&self) -> Result<Tensor, tensor_core::TensorError> {
        let tensor = match &self.data {
            Some(bytes) => create_tensor(&self.name, self.dtype, self.shape.clone(), bytes)?,
            None => Tensor::new(&self.name, self.dtype, self.shape.clone(), self.category),
        };
        let mut tensor = tensor.with_category(self.category).with_format(self.format);
        tensor.set_list(self.list);
        tensor.set_quant_params(self.quant_params.clone());
        Ok(tensor)
    }

    /// Returns a one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} {}{} {} {} ({:?})",
            self.name,
            if self.list { "list of " } else { "" },
            self.dtype,
            self.shape,
            self.format,
            self.category
        )
    }
}

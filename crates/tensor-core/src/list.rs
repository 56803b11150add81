// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise copy and conversion of tensor lists.
//!
//! Moving or sharing a list between actors needs nothing special: the
//! element vector sits behind the list's buffer handle like dense bytes do.
//! Copies and casts, on the other hand, are applied to every element.

use crate::{cast_tensor, copy_tensor, DType, Format, Tensor, TensorError};
use memory_manager::Allocator;
use std::sync::Arc;

/// Private copies of every element of `src`.
pub(crate) fn copy_elements(
    src: &Tensor,
    allocator: Option<Arc<dyn Allocator>>,
) -> Result<Vec<Tensor>, TensorError> {
    src.elements()?
        .iter()
        .map(|element| copy_tensor(element, true, allocator.clone()))
        .collect()
}

/// Converts every element of the list `src` to `dtype` and `format`.
///
/// The result is a fresh list owning its elements; `src` is untouched.
pub fn cast_tensor_list(
    src: &Tensor,
    dtype: DType,
    format: Format,
    allocator: Option<Arc<dyn Allocator>>,
) -> Result<Tensor, TensorError> {
    let allocator = allocator.or_else(|| src.allocator().cloned());
    let elements = src
        .elements()?
        .iter()
        .map(|element| cast_tensor(element, dtype, format, allocator.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    // Elements may have been relaid out; the list describes what it holds.
    let shape = elements
        .first()
        .map_or_else(|| src.shape().clone(), |e| e.shape().clone());
    let format = if src.shape().rank() == 4 { format } else { src.format() };
    let mut dst = Tensor::from_elements(src.name(), dtype, shape, elements)?
        .with_category(src.category())
        .with_format(format);
    dst.set_quant_params(src.quant_params().to_vec());
    dst.set_allocator(allocator);
    tracing::trace!(
        "cast list '{}' of {} elements: {} -> {}",
        src.name(),
        dst.elements()?.len(),
        src.dtype(),
        dtype
    );
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{need_cast_data, Category, Shape};
    use memory_manager::{MemoryBudget, MemoryPool};

    fn ints(values: &[[i32; 2]]) -> Tensor {
        let elements = values
            .iter()
            .enumerate()
            .map(|(i, v)| Tensor::from_values(format!("e{i}"), Shape::vector(2), v).unwrap())
            .collect();
        Tensor::from_elements("l", DType::I32, Shape::vector(2), elements).unwrap()
    }

    #[test]
    fn test_from_elements_checks_dtype() {
        let stray = Tensor::from_values("f", Shape::vector(1), &[1.0f32]).unwrap();
        assert!(matches!(
            Tensor::from_elements("l", DType::I32, Shape::vector(1), vec![stray]),
            Err(TensorError::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_push_element() {
        let mut list = Tensor::new_list("l", DType::F32, Shape::vector(1), Category::Var);
        assert!(list.is_list());
        assert!(matches!(list.elements(), Err(TensorError::NoData { .. })));
        list.malloc_data(None).unwrap();
        assert!(list.elements().unwrap().is_empty());

        list.push_element(Tensor::from_values("a", Shape::vector(1), &[1.0f32]).unwrap())
            .unwrap();
        let wrong = Tensor::from_values("b", Shape::vector(1), &[1u8]).unwrap();
        assert!(list.push_element(wrong).is_err());

        let _share = list.clone();
        let more = Tensor::from_values("c", Shape::vector(1), &[2.0f32]).unwrap();
        assert!(matches!(list.push_element(more), Err(TensorError::SharedBuffer { .. })));
        assert_eq!(list.elements().unwrap().len(), 1);
    }

    #[test]
    fn test_dense_tensor_is_not_a_list() {
        let dense = Tensor::from_values("d", Shape::vector(1), &[1i32]).unwrap();
        assert!(!dense.is_list());
        assert!(matches!(dense.elements(), Err(TensorError::NotAList { .. })));
    }

    #[test]
    fn test_cast_every_element() {
        let src = ints(&[[1, -2], [3, 4]]);
        let declared = Tensor::new_list("k", DType::F32, Shape::vector(2), Category::Var);
        assert!(need_cast_data(&src, &declared));

        let dst = cast_tensor(&src, DType::F32, Format::Nhwc, None).unwrap();
        assert!(dst.is_list());
        assert_eq!(dst.dtype(), DType::F32);
        let values: Vec<Vec<f32>> = dst
            .elements()
            .unwrap()
            .iter()
            .map(|e| e.to_vec::<f32>().unwrap())
            .collect();
        assert_eq!(values, vec![vec![1.0, -2.0], vec![3.0, 4.0]]);
        // The source list is untouched.
        assert_eq!(src.elements().unwrap()[0].to_vec::<i32>().unwrap(), vec![1, -2]);
    }

    #[test]
    fn test_cast_relayouts_elements() {
        let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let image = Tensor::from_values("img", Shape::new(vec![1, 1, 2, 3]), &values).unwrap();
        let shape = Shape::new(vec![1, 1, 2, 3]);
        let src = Tensor::from_elements("l", DType::F32, shape, vec![image]).unwrap();
        let dst = cast_tensor(&src, DType::F32, Format::Nchw, None).unwrap();
        assert_eq!(dst.shape(), &Shape::new(vec![1, 3, 1, 2]));
        assert_eq!(dst.format(), Format::Nchw);
        assert_eq!(
            dst.elements().unwrap()[0].to_vec::<f32>().unwrap(),
            vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]
        );
    }

    #[test]
    fn test_deep_copy_uses_pool() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(4));
        let alloc: Arc<dyn Allocator> = Arc::new(pool.clone());
        let src = ints(&[[5, 6], [7, 8], [9, 10]]);

        let copy = copy_tensor(&src, true, Some(alloc)).unwrap();
        assert!(copy.is_list());
        assert_eq!(copy.elements().unwrap().len(), 3);
        assert_eq!(pool.allocated_bytes(), 24);
        for (a, b) in src.elements().unwrap().iter().zip(copy.elements().unwrap()) {
            assert!(!Arc::ptr_eq(a.data().unwrap(), b.data().unwrap()));
            assert_eq!(a.to_vec::<i32>().unwrap(), b.to_vec::<i32>().unwrap());
        }
        drop(copy);
        assert_eq!(pool.allocated_bytes(), 0);
    }
}

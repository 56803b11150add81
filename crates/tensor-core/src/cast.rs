// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Data-type casting and layout conversion between producer and consumer.

use crate::{cast_tensor_list, Format, Tensor, TensorError};
use memory_manager::Allocator;
use std::sync::Arc;

/// Returns `true` when data moving from `src` into a slot described by `dst`
/// must go through [`cast_tensor`].
///
/// Layout only matters for rank-4 tensors.
pub fn need_cast_data(src: &Tensor, dst: &Tensor) -> bool {
    if src.dtype() != dst.dtype() {
        return true;
    }
    src.format() != dst.format() && src.shape().rank() == 4
}

/// Produces a new tensor holding `src` converted to `dtype` and `format`.
///
/// The result owns a freshly allocated buffer (from `allocator` when given)
/// and keeps `src`'s name, category and quantisation parameters.
/// Layout conversion is applied first, then the element cast. Lists are
/// converted element by element.
pub fn cast_tensor(
    src: &Tensor,
    dtype: crate::DType,
    format: Format,
    allocator: Option<Arc<dyn Allocator>>,
) -> Result<Tensor, TensorError> {
    if src.is_list() {
        return cast_tensor_list(src, dtype, format, allocator);
    }
    let src_bytes = src.bytes()?;
    let src_width = src.dtype().size_bytes();
    let rank = src.shape().rank();

    let relayout = src.format() != format && rank == 4;
    let (shape, order) = if relayout {
        let perm = src
            .format()
            .permutation_to(format)
            .ok_or(TensorError::UnsupportedFormat {
                from: src.format(),
                to: format,
                rank,
            })?;
        let shape = src.shape().permute(&perm);
        let order = permuted_order(src, &perm)?;
        (shape, Some(order))
    } else {
        (src.shape().clone(), None)
    };

    let mut dst = Tensor::new(src.name(), dtype, shape, src.category())
        .with_format(if rank == 4 { format } else { src.format() });
    dst.set_quant_params(src.quant_params().to_vec());
    dst.malloc_data(allocator.or_else(|| src.allocator().cloned()))?;

    let dst_width = dtype.size_bytes();
    let src_dtype = src.dtype();
    let out = dst.bytes_mut()?;
    let count = out.len() / dst_width.max(1);
    for i in 0..count {
        let from = order.as_ref().map_or(i, |o| o[i]);
        let value = src_dtype.read_f64(&src_bytes[from * src_width..]);
        dtype.write_f64(value, &mut out[i * dst_width..]);
    }
    tracing::trace!(
        "cast '{}': {} {} -> {} {}",
        src.name(),
        src_dtype,
        src.format(),
        dtype,
        format
    );
    Ok(dst)
}

/// For every destination element (row-major over the permuted shape),
/// the flat index of the matching source element.
fn permuted_order(src: &Tensor, perm: &[usize; 4]) -> Result<Vec<usize>, TensorError> {
    let dynamic = || TensorError::DynamicShape {
        name: src.name().to_string(),
        shape: src.shape().clone(),
    };
    let src_strides = src.shape().strides().ok_or_else(dynamic)?;
    let dst_shape = src.shape().permute(perm);
    let dims: Vec<usize> = dst_shape.dims().iter().map(|&d| d as usize).collect();
    let total = dst_shape.num_elements().ok_or_else(dynamic)?;

    let mut order = Vec::with_capacity(total);
    let mut idx = [0usize; 4];
    for _ in 0..total {
        order.push((0..4).map(|k| idx[k] * src_strides[perm[k]]).sum());
        // Advance the row-major counter over the destination shape.
        for k in (0..4).rev() {
            idx[k] += 1;
            if idx[k] < dims[k] {
                break;
            }
            idx[k] = 0;
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, DType, Shape};

    #[test]
    fn test_need_cast() {
        let a = Tensor::new("a", DType::I32, Shape::vector(2), Category::Var);
        let b = Tensor::new("b", DType::F32, Shape::vector(2), Category::Var);
        assert!(need_cast_data(&a, &b));
        assert!(!need_cast_data(&b, &b.clone()));

        let nhwc = Tensor::new("x", DType::F32, Shape::new(vec![1, 2, 2, 3]), Category::Var);
        let nchw = nhwc.clone().with_format(Format::Nchw);
        assert!(need_cast_data(&nhwc, &nchw));

        let flat = Tensor::new("f", DType::F32, Shape::vector(4), Category::Var);
        assert!(!need_cast_data(&flat, &flat.clone().with_format(Format::Nchw)));
    }

    #[test]
    fn test_i32_to_f32() {
        let src = Tensor::from_values("p", Shape::vector(3), &[1i32, -2, 3]).unwrap();
        let dst = cast_tensor(&src, DType::F32, Format::Nhwc, None).unwrap();
        assert_eq!(dst.to_vec::<f32>().unwrap(), vec![1.0, -2.0, 3.0]);
        assert!(!Arc::ptr_eq(src.data().unwrap(), dst.data().unwrap()));
    }

    #[test]
    fn test_f32_to_f16_and_bool() {
        let src = Tensor::from_values("p", Shape::vector(3), &[0.5f32, 0.0, -4.0]).unwrap();
        let half = cast_tensor(&src, DType::F16, Format::Nhwc, None).unwrap();
        assert_eq!(half.to_f64_vec().unwrap(), vec![0.5, 0.0, -4.0]);
        let mask = cast_tensor(&src, DType::Bool, Format::Nhwc, None).unwrap();
        assert_eq!(mask.to_vec::<bool>().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn test_nhwc_to_nchw() {
        // N=1, H=1, W=2, C=3: pixels (0,1,2) and (3,4,5).
        let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let src = Tensor::from_values("img", Shape::new(vec![1, 1, 2, 3]), &values).unwrap();
        let dst = cast_tensor(&src, DType::F32, Format::Nchw, None).unwrap();
        assert_eq!(dst.shape(), &Shape::new(vec![1, 3, 1, 2]));
        assert_eq!(dst.format(), Format::Nchw);
        assert_eq!(dst.to_vec::<f32>().unwrap(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

        let back = cast_tensor(&dst, DType::F32, Format::Nhwc, None).unwrap();
        assert_eq!(back.to_vec::<f32>().unwrap(), values);
    }

    #[test]
    fn test_unsupported_layout() {
        let mut src = Tensor::new("k", DType::F32, Shape::new(vec![1, 1, 1, 1]), Category::Var)
            .with_format(Format::Kchw);
        src.malloc_data(None).unwrap();
        assert!(matches!(
            cast_tensor(&src, DType::F32, Format::Nhwc, None),
            Err(TensorError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_cast_without_data() {
        let src = Tensor::new("e", DType::F32, Shape::vector(1), Category::Var);
        assert!(matches!(
            cast_tensor(&src, DType::I32, Format::Nhwc, None),
            Err(TensorError::NoData { .. })
        ));
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type.

use crate::{Category, DType, Element, Format, QuantParam, Shape, TensorError};
use memory_manager::{Allocator, AllocatorKind, BufferGuard};
use std::fmt;
use std::sync::Arc;

/// Backing memory of a tensor.
///
/// Pooled buffers go back to their pool when dropped; heap buffers hold
/// caller-provided or constant data. A list tensor keeps its element tensors
/// here, so moving or sharing a list works exactly like a dense buffer.
pub enum Buffer {
    Pooled(BufferGuard),
    Heap(Vec<u8>),
    List(Vec<Tensor>),
}

impl Buffer {
    /// Raw bytes; empty for a list.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Pooled(g) => g.as_slice(),
            Buffer::Heap(v) => v,
            Buffer::List(_) => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Buffer::Pooled(g) => g.as_mut_slice(),
            Buffer::Heap(v) => v,
            Buffer::List(_) => &mut [],
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Buffer::Pooled(g) => write!(f, "Pooled({} bytes)", g.size_bytes()),
            Buffer::Heap(v) => write!(f, "Heap({} bytes)", v.len()),
            Buffer::List(elements) => write!(f, "List({} elements)", elements.len()),
        }
    }
}

/// A reference-counted, n-dimensional tensor.
///
/// `Tensor` is the data carrier between actors. Its buffer sits behind an
/// `Arc`, so a shallow copy ([`Clone`]) shares memory and the buffer is
/// released exactly once, when the last handle goes away.
///
/// Two counts are involved:
/// - `ref_count`: the number of pending consumer deliveries for the current
///   value, reset to `init_ref_count` whenever the producer stores new data.
/// - the `Arc` strong count: how many tensors currently hold the buffer.
///
/// # Memory Layout
/// Data is stored in row-major order as little-endian bytes.
///
/// # Tensor Lists
/// A list tensor holds a sequence of element tensors instead of bytes. Its
/// `dtype` is the element dtype and its `shape` the element shape.
#[derive(Debug, Clone)]
pub struct Tensor {
    name: String,
    dtype: DType,
    shape: Shape,
    format: Format,
    category: Category,
    list: bool,
    data: Option<Arc<Buffer>>,
    ref_count: usize,
    init_ref_count: usize,
    own_data: bool,
    allocator: Option<Arc<dyn Allocator>>,
    quant_params: Vec<QuantParam>,
    scale: f32,
}

impl Tensor {
    /// Creates a tensor description with no data.
    pub fn new(name: impl Into<String>, dtype: DType, shape: Shape, category: Category) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
            format: Format::default(),
            category,
            list: false,
            data: None,
            ref_count: 0,
            init_ref_count: 0,
            own_data: false,
            allocator: None,
            quant_params: Vec::new(),
            scale: 1.0,
        }
    }

    /// Creates a `Var` tensor holding `values`.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Shape, Tensor};
    /// let t = Tensor::from_values("x", Shape::vector(3), &[1i32, 2, 3]).unwrap();
    /// assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
    /// ```
    pub fn from_values<T: Element>(
        name: impl Into<String>,
        shape: Shape,
        values: &[T],
    ) -> Result<Self, TensorError> {
        let mut tensor = Self::new(name, T::DTYPE, shape, Category::Var);
        let expected = tensor.require_elements()?;
        if values.len() != expected {
            return Err(TensorError::ElementCount {
                expected,
                actual: values.len(),
            });
        }
        let width = T::DTYPE.size_bytes();
        let mut bytes = vec![0u8; expected * width];
        for (chunk, v) in bytes.chunks_exact_mut(width).zip(values) {
            v.write_le(chunk);
        }
        tensor.data = Some(Arc::new(Buffer::Heap(bytes)));
        tensor.own_data = true;
        Ok(tensor)
    }

    /// Creates an empty list description whose elements are `dtype` tensors
    /// of `shape`.
    pub fn new_list(
        name: impl Into<String>,
        dtype: DType,
        shape: Shape,
        category: Category,
    ) -> Self {
        Self {
            list: true,
            ..Self::new(name, dtype, shape, category)
        }
    }

    /// Creates a `Var` list holding `elements`, which must all be `dtype`.
    pub fn from_elements(
        name: impl Into<String>,
        dtype: DType,
        shape: Shape,
        elements: Vec<Tensor>,
    ) -> Result<Self, TensorError> {
        if let Some(bad) = elements.iter().find(|e| e.dtype != dtype) {
            return Err(TensorError::DTypeMismatch {
                op: "from_elements",
                expected: dtype,
                actual: bad.dtype,
            });
        }
        let mut tensor = Self::new_list(name, dtype, shape, Category::Var);
        tensor.data = Some(Arc::new(Buffer::List(elements)));
        tensor.own_data = true;
        Ok(tensor)
    }

    /// Builder: sets the memory layout.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Builder: sets the category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    // ── Metadata ───────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn set_dtype(&mut self, dtype: DType) {
        self.dtype = dtype;
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
    }

    /// Element count, or `None` while the shape is dynamic.
    pub fn num_elements(&self) -> Option<usize> {
        self.shape.num_elements()
    }

    /// Buffer size implied by shape and dtype, or `None` while dynamic.
    pub fn size_bytes(&self) -> Option<usize> {
        self.shape.size_bytes(self.dtype)
    }

    pub fn is_const(&self) -> bool {
        self.category.is_const()
    }

    /// A constant scalar with data attached.
    pub fn is_scalar(&self) -> bool {
        self.category == Category::ConstScalar && self.data.is_some()
    }

    pub fn is_graph_input(&self) -> bool {
        self.category == Category::GraphInput
    }

    pub fn is_graph_output(&self) -> bool {
        self.category == Category::GraphOutput
    }

    /// Data is present and still wanted by someone.
    pub fn is_ready(&self) -> bool {
        self.data.is_some()
            && (self.is_const()
                || self.is_graph_input()
                || self.is_graph_output()
                || self.ref_count > 0)
    }

    pub fn quant_params(&self) -> &[QuantParam] {
        &self.quant_params
    }

    pub fn add_quant_param(&mut self, param: QuantParam) {
        self.quant_params.push(param);
    }

    pub fn set_quant_params(&mut self, params: Vec<QuantParam>) {
        self.quant_params = params;
    }

    // ── Allocation ─────────────────────────────────────────────────────

    pub fn allocator(&self) -> Option<&Arc<dyn Allocator>> {
        self.allocator.as_ref()
    }

    pub fn set_allocator(&mut self, allocator: Option<Arc<dyn Allocator>>) {
        self.allocator = allocator;
    }

    /// Reclamation policy of the tensor's allocator; heap data is generic.
    pub fn allocator_kind(&self) -> AllocatorKind {
        self.allocator
            .as_ref()
            .map_or(AllocatorKind::Generic, |a| a.kind())
    }

    /// Acquires a buffer sized `num_elements × dtype size`.
    ///
    /// Does nothing when data is already present. If `allocator` is given it
    /// replaces the tensor's allocator; without any allocator the buffer
    /// comes from the heap.
    pub fn malloc_data(
        &mut self,
        allocator: Option<Arc<dyn Allocator>>,
    ) -> Result<(), TensorError> {
        if allocator.is_some() {
            self.allocator = allocator;
        }
        if self.data.is_some() {
            return Ok(());
        }
        if self.list {
            // Elements are allocated by whoever fills the list.
            self.data = Some(Arc::new(Buffer::List(Vec::new())));
            self.own_data = true;
            return Ok(());
        }
        let size = self.require_elements()? * self.dtype.size_bytes();
        let buffer = match (&self.allocator, size) {
            (Some(alloc), s) if s > 0 => Buffer::Pooled(alloc.malloc(s)?),
            _ => Buffer::Heap(vec![0u8; size]),
        };
        self.data = Some(Arc::new(buffer));
        self.own_data = true;
        Ok(())
    }

    /// Releases this tensor's handle on its buffer.
    ///
    /// Memory from a `Runtime` allocator is kept; the runtime frees it at
    /// teardown.
    pub fn free_data(&mut self) {
        if self.allocator_kind() == AllocatorKind::Runtime {
            return;
        }
        self.data = None;
    }

    // ── Data access ────────────────────────────────────────────────────

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// The shared buffer handle.
    pub fn data(&self) -> Option<&Arc<Buffer>> {
        self.data.as_ref()
    }

    /// Installs `data` and takes ownership of it.
    ///
    /// The previous buffer is handed back rather than freed: dropping it is
    /// the caller's decision.
    #[must_use = "the previous buffer is returned, not freed"]
    pub fn set_data(&mut self, data: Option<Arc<Buffer>>) -> Option<Arc<Buffer>> {
        self.own_data = true;
        std::mem::replace(&mut self.data, data)
    }

    /// Moves the buffer out, leaving the tensor without data.
    pub fn take_data(&mut self) -> Option<Arc<Buffer>> {
        self.data.take()
    }

    pub fn own_data(&self) -> bool {
        self.own_data
    }

    pub fn set_own_data(&mut self, own_data: bool) {
        self.own_data = own_data;
    }

    /// Read-only bytes.
    pub fn bytes(&self) -> Result<&[u8], TensorError> {
        self.data
            .as_deref()
            .map(Buffer::as_slice)
            .ok_or_else(|| self.no_data())
    }

    /// Mutable bytes; refused while another tensor shares the buffer.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8], TensorError> {
        let name = &self.name;
        match self.data.as_mut() {
            None => Err(TensorError::NoData { name: name.clone() }),
            Some(arc) => Arc::get_mut(arc)
                .map(Buffer::as_mut_slice)
                .ok_or_else(|| TensorError::SharedBuffer { name: name.clone() }),
        }
    }

    /// Copies the elements out as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, TensorError> {
        self.check_dtype::<T>("to_vec")?;
        let width = self.dtype.size_bytes();
        Ok(self.bytes()?.chunks_exact(width).map(T::read_le).collect())
    }

    /// Reads every element as `f64`, whatever the dtype.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>, TensorError> {
        let width = self.dtype.size_bytes();
        let dtype = self.dtype;
        Ok(self
            .bytes()?
            .chunks_exact(width)
            .map(|c| dtype.read_f64(c))
            .collect())
    }

    /// Overwrites the elements from `f64` values, converting to the dtype.
    pub fn write_f64(&mut self, values: &[f64]) -> Result<(), TensorError> {
        let expected = self.require_elements()?;
        if values.len() != expected {
            return Err(TensorError::ElementCount {
                expected,
                actual: values.len(),
            });
        }
        let width = self.dtype.size_bytes();
        let dtype = self.dtype;
        for (chunk, &v) in self.bytes_mut()?.chunks_exact_mut(width).zip(values) {
            dtype.write_f64(v, chunk);
        }
        Ok(())
    }

    // ── Tensor lists ───────────────────────────────────────────────────

    /// Declared as a list, or currently holding list data.
    pub fn is_list(&self) -> bool {
        self.list || matches!(self.data.as_deref(), Some(Buffer::List(_)))
    }

    pub fn set_list(&mut self, list: bool) {
        self.list = list;
    }

    /// The element tensors of a list.
    pub fn elements(&self) -> Result<&[Tensor], TensorError> {
        match self.data.as_deref() {
            Some(Buffer::List(elements)) => Ok(elements),
            Some(_) => Err(self.not_a_list()),
            None => Err(self.no_data()),
        }
    }

    /// Appends an element; its dtype must be the list's element dtype.
    pub fn push_element(&mut self, element: Tensor) -> Result<(), TensorError> {
        if element.dtype != self.dtype {
            return Err(TensorError::DTypeMismatch {
                op: "push_element",
                expected: self.dtype,
                actual: element.dtype,
            });
        }
        let not_a_list = self.not_a_list();
        let name = &self.name;
        match self.data.as_mut() {
            None => Err(TensorError::NoData { name: name.clone() }),
            Some(arc) => match Arc::get_mut(arc) {
                Some(Buffer::List(elements)) => {
                    elements.push(element);
                    Ok(())
                }
                Some(_) => Err(not_a_list),
                None => Err(TensorError::SharedBuffer { name: name.clone() }),
            },
        }
    }

    // ── Reference counting ─────────────────────────────────────────────

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn set_ref_count(&mut self, count: usize) {
        self.ref_count = count;
    }

    pub fn init_ref_count(&self) -> usize {
        self.init_ref_count
    }

    pub fn set_init_ref_count(&mut self, count: usize) {
        self.init_ref_count = count;
    }

    /// Restores `ref_count` to `init_ref_count`; done when new data lands.
    pub fn reset_ref_count(&mut self) {
        self.ref_count = self.init_ref_count;
    }

    pub fn inc_ref_count(&mut self) {
        self.ref_count += 1;
    }

    /// Records one consumed delivery.
    ///
    /// Returns `true` if this released the buffer.
    pub fn dec_ref_count(&mut self) -> bool {
        self.ref_count = self.ref_count.saturating_sub(1);
        if self.ref_count == 0 && self.is_reclaimable() && self.data.is_some() {
            self.free_data();
            return !self.has_data();
        }
        false
    }

    /// Refcounting may drop this tensor's data.
    pub fn is_reclaimable(&self) -> bool {
        self.own_data
            && !self.is_const()
            && !self.is_graph_output()
            && self.allocator_kind().is_refcount_managed()
    }

    // ── Scaling ────────────────────────────────────────────────────────

    /// Multiplies every element by `factor` in place.
    ///
    /// The cumulative scale is multiplied too, so successive calls compose.
    pub fn scale<T: Element>(&mut self, factor: f32) -> Result<(), TensorError> {
        self.check_dtype::<T>("scale")?;
        let width = self.dtype.size_bytes();
        let factor_t = T::from_f64(f64::from(factor)).to_f64();
        for chunk in self.bytes_mut()?.chunks_exact_mut(width) {
            T::from_f64(T::read_le(chunk).to_f64() * factor_t).write_le(chunk);
        }
        self.scale *= factor;
        Ok(())
    }

    /// Cumulative product of every [`scale`](Self::scale) factor applied.
    pub fn scale_factor(&self) -> f32 {
        self.scale
    }

    pub fn is_scaled(&self) -> bool {
        (self.scale - 1.0).abs() > 1.0e-5
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn require_elements(&self) -> Result<usize, TensorError> {
        self.shape
            .num_elements()
            .ok_or_else(|| TensorError::DynamicShape {
                name: self.name.clone(),
                shape: self.shape.clone(),
            })
    }

    fn check_dtype<T: Element>(&self, op: &'static str) -> Result<(), TensorError> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::DTypeMismatch {
                op,
                expected: T::DTYPE,
                actual: self.dtype,
            });
        }
        Ok(())
    }

    fn no_data(&self) -> TensorError {
        TensorError::NoData {
            name: self.name.clone(),
        }
    }

    fn not_a_list(&self) -> TensorError {
        TensorError::NotAList {
            name: self.name.clone(),
        }
    }
}

// ── Free functions ─────────────────────────────────────────────────────────

/// Creates a tensor of `dtype` and `shape` from raw little-endian `bytes`.
pub fn create_tensor(
    name: impl Into<String>,
    dtype: DType,
    shape: Shape,
    bytes: &[u8],
) -> Result<Tensor, TensorError> {
    let mut tensor = Tensor::new(name, dtype, shape, Category::Var);
    let expected = tensor.require_elements()? * dtype.size_bytes();
    if bytes.len() != expected {
        return Err(TensorError::BufferSizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    tensor.data = Some(Arc::new(Buffer::Heap(bytes.to_vec())));
    tensor.own_data = true;
    Ok(tensor)
}

/// Duplicates `src`'s description, optionally with a private data copy.
///
/// The copy never shares `src`'s buffer; a list copy duplicates every
/// element. Reference counts start at zero.
pub fn copy_tensor(
    src: &Tensor,
    copy_data: bool,
    allocator: Option<Arc<dyn Allocator>>,
) -> Result<Tensor, TensorError> {
    let mut dst = Tensor::new(src.name.clone(), src.dtype, src.shape.clone(), src.category)
        .with_format(src.format);
    dst.list = src.is_list();
    dst.quant_params = src.quant_params.clone();
    dst.scale = src.scale;
    dst.allocator = allocator.or_else(|| src.allocator.clone());
    if copy_data {
        copy_tensor_data(src, &mut dst)?;
    }
    Ok(dst)
}

/// Copies `src`'s bytes into `dst`, allocating `dst` if needed.
///
/// Sizes must match exactly. A `dst` buffer shared with other tensors is
/// replaced by a fresh one rather than written through.
pub fn copy_tensor_data(src: &Tensor, dst: &mut Tensor) -> Result<(), TensorError> {
    if src.is_list() {
        let elements = crate::list::copy_elements(src, dst.allocator.clone())?;
        dst.data = Some(Arc::new(Buffer::List(elements)));
        dst.list = true;
        dst.own_data = true;
        return Ok(());
    }
    let src_bytes = src.bytes()?;
    let expected = dst.require_elements()? * dst.dtype.size_bytes();
    if src_bytes.len() != expected {
        return Err(TensorError::BufferSizeMismatch {
            expected,
            actual: src_bytes.len(),
        });
    }
    if dst.data.as_ref().is_some_and(|d| Arc::strong_count(d) > 1) {
        dst.data = None;
    }
    dst.malloc_data(None)?;
    dst.bytes_mut()?.copy_from_slice(src_bytes);
    dst.own_data = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_manager::{MemoryBudget, MemoryPool};

    fn pool(kind: AllocatorKind) -> (MemoryPool, Arc<dyn Allocator>) {
        let pool = MemoryPool::with_kind(MemoryBudget::from_kb(64), kind);
        let alloc: Arc<dyn Allocator> = Arc::new(pool.clone());
        (pool, alloc)
    }

    #[test]
    fn test_malloc_and_free() {
        let (pool, alloc) = pool(AllocatorKind::Generic);
        let mut t = Tensor::new("a", DType::F32, Shape::vector(4), Category::Var);
        t.malloc_data(Some(alloc)).unwrap();
        assert_eq!(t.bytes().unwrap().len(), 16);
        assert_eq!(pool.allocated_bytes(), 16);
        t.free_data();
        assert_eq!(pool.allocated_bytes(), 0);
    }

    #[test]
    fn test_malloc_over_capacity() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(8));
        let mut t = Tensor::new("big", DType::F32, Shape::vector(4), Category::Var);
        let err = t.malloc_data(Some(Arc::new(pool))).unwrap_err();
        assert!(matches!(err, TensorError::Allocation(_)));
        assert!(!t.has_data());
    }

    #[test]
    fn test_malloc_dynamic_shape() {
        let mut t = Tensor::new("d", DType::F32, Shape::new(vec![-1, 2]), Category::Var);
        assert!(matches!(t.malloc_data(None), Err(TensorError::DynamicShape { .. })));
    }

    #[test]
    fn test_set_data_returns_previous() {
        let mut t = Tensor::from_values("a", Shape::vector(2), &[1.0f32, 2.0]).unwrap();
        let fresh = Arc::new(Buffer::Heap(vec![0u8; 8]));
        let old = t.set_data(Some(fresh)).unwrap();
        assert_eq!(old.len(), 8);
        assert!(t.own_data());
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_dec_ref_count_frees_at_zero() {
        let (pool, alloc) = pool(AllocatorKind::Generic);
        let mut t = Tensor::new("v", DType::I32, Shape::vector(2), Category::Var);
        t.malloc_data(Some(alloc)).unwrap();
        t.set_init_ref_count(2);
        t.reset_ref_count();
        assert!(!t.dec_ref_count());
        assert!(t.has_data());
        assert!(t.dec_ref_count());
        assert!(!t.has_data());
        assert_eq!(pool.stats().live_buffers(), 0);
    }

    #[test]
    fn test_const_and_graph_output_survive() {
        for category in [Category::Const, Category::GraphOutput] {
            let mut t = Tensor::from_values("c", Shape::vector(1), &[3i32])
                .unwrap()
                .with_category(category);
            t.set_ref_count(1);
            assert!(!t.dec_ref_count());
            assert!(t.has_data());
        }
    }

    #[test]
    fn test_static_and_runtime_allocators_not_reclaimed() {
        for kind in [AllocatorKind::Static, AllocatorKind::Runtime] {
            let (pool, alloc) = pool(kind);
            let mut t = Tensor::new("s", DType::U8, Shape::vector(8), Category::Var);
            t.malloc_data(Some(alloc)).unwrap();
            t.set_ref_count(1);
            assert!(!t.dec_ref_count());
            assert!(t.has_data());
            assert_eq!(pool.allocated_bytes(), 8);
        }
    }

    #[test]
    fn test_shared_buffer_released_once() {
        let (pool, alloc) = pool(AllocatorKind::Generic);
        let mut t = Tensor::new("x", DType::F32, Shape::vector(2), Category::Var);
        t.malloc_data(Some(alloc)).unwrap();
        let share = t.clone();
        t.free_data();
        assert_eq!(pool.allocated_bytes(), 8);
        drop(share);
        assert_eq!(pool.allocated_bytes(), 0);
        assert_eq!(pool.stats().total_deallocations, 1);
    }

    #[test]
    fn test_scale_composes() {
        let mut t = Tensor::from_values("w", Shape::vector(3), &[1.0f32, 2.0, 4.0]).unwrap();
        assert!(!t.is_scaled());
        t.scale::<f32>(2.0).unwrap();
        t.scale::<f32>(0.25).unwrap();
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![0.5, 1.0, 2.0]);
        assert!((t.scale_factor() - 0.5).abs() < 1e-6);
        assert!(t.is_scaled());
    }

    #[test]
    fn test_scale_refuses_shared_and_wrong_type() {
        let mut t = Tensor::from_values("w", Shape::vector(1), &[1.0f32]).unwrap();
        assert!(matches!(t.scale::<i32>(2.0), Err(TensorError::DTypeMismatch { .. })));
        let _share = t.clone();
        assert!(matches!(t.scale::<f32>(2.0), Err(TensorError::SharedBuffer { .. })));
    }

    #[test]
    fn test_copy_tensor_is_private() {
        let mut src = Tensor::from_values("s", Shape::vector(2), &[5i64, 6]).unwrap();
        src.add_quant_param(QuantParam::new(0.5, 1));
        let copy = copy_tensor(&src, true, None).unwrap();
        assert_eq!(copy.to_vec::<i64>().unwrap(), vec![5, 6]);
        assert_eq!(copy.quant_params().len(), 1);
        assert!(!Arc::ptr_eq(src.data().unwrap(), copy.data().unwrap()));

        let shell = copy_tensor(&src, false, None).unwrap();
        assert!(!shell.has_data());
    }

    #[test]
    fn test_copy_tensor_data_size_mismatch() {
        let src = Tensor::from_values("s", Shape::vector(2), &[1u8, 2]).unwrap();
        let mut dst = Tensor::new("d", DType::U8, Shape::vector(3), Category::Var);
        assert!(matches!(
            copy_tensor_data(&src, &mut dst),
            Err(TensorError::BufferSizeMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_create_tensor() {
        let t = create_tensor("c", DType::I32, Shape::vector(1), &7i32.to_le_bytes()).unwrap();
        assert_eq!(t.to_vec::<i32>().unwrap(), vec![7]);
        assert!(create_tensor("c", DType::I32, Shape::vector(2), &[0u8; 4]).is_err());
    }

    #[test]
    fn test_write_f64_converts() {
        let mut t = Tensor::new("o", DType::I32, Shape::vector(2), Category::Var);
        t.malloc_data(None).unwrap();
        t.write_f64(&[1.9, -2.0]).unwrap();
        assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, -2]);
        assert_eq!(t.to_f64_vec().unwrap(), vec![1.0, -2.0]);
    }

    #[test]
    fn test_is_ready() {
        let mut t = Tensor::from_values("r", Shape::vector(1), &[1u8]).unwrap();
        assert!(!t.is_ready());
        t.set_ref_count(1);
        assert!(t.is_ready());
        let c = Tensor::from_values("c", Shape::vector(1), &[1u8])
            .unwrap()
            .with_category(Category::ConstScalar);
        assert!(c.is_ready());
        assert!(c.is_scalar());
    }
}

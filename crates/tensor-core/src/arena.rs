// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor storage keyed by stable indices.
//!
//! Every tensor in a compiled graph lives in one [`TensorArena`] slot. Each
//! slot is individually locked, so actors on different worker threads touch
//! unrelated tensors without contention. Locks are held only for the
//! duration of a closure and never across an `.await`.
//!
//! Who may free a slot's buffer is tracked explicitly by [`Ownership`] rather
//! than inferred from comparing buffer handles.

use crate::{Buffer, Tensor, TensorError};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stable index of a tensor in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TensorId(pub usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Who holds a slot's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Ownership {
    /// The slot owns its buffer and no consumer holds a share.
    Exclusive,
    /// At least one consumer holds a read-only share of the buffer.
    Shared,
    /// Const or caller-provided memory; never moved or reclaimed.
    Static,
}

/// A tensor obtained from the arena for a consumer's input slot.
#[derive(Debug)]
pub struct Acquired {
    pub tensor: Tensor,
    /// The buffer was moved out of the slot rather than shared.
    pub moved: bool,
}

struct Slot {
    tensor: Tensor,
    ownership: Ownership,
}

impl Slot {
    fn new(tensor: Tensor) -> Self {
        let ownership = initial_ownership(&tensor);
        Self { tensor, ownership }
    }
}

fn initial_ownership(tensor: &Tensor) -> Ownership {
    if tensor.is_const() || tensor.is_graph_input() {
        Ownership::Static
    } else {
        Ownership::Exclusive
    }
}

/// Tensor storage with per-slot ownership tracking.
#[derive(Default)]
pub struct TensorArena {
    slots: Vec<Mutex<Slot>>,
}

impl TensorArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tensor, returning its stable id.
    pub fn push(&mut self, tensor: Tensor) -> TensorId {
        self.slots.push(Mutex::new(Slot::new(tensor)));
        TensorId(self.slots.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TensorId> {
        (0..self.slots.len()).map(TensorId)
    }

    fn slot(&self, id: TensorId) -> Result<MutexGuard<'_, Slot>, TensorError> {
        self.slots
            .get(id.0)
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
            .ok_or(TensorError::InvalidId {
                id,
                len: self.slots.len(),
            })
    }

    /// Runs `f` with read access to the tensor in `id`.
    pub fn with<R>(&self, id: TensorId, f: impl FnOnce(&Tensor) -> R) -> Result<R, TensorError> {
        Ok(f(&self.slot(id)?.tensor))
    }

    /// Runs `f` with write access to the tensor in `id`.
    ///
    /// The slot's ownership tag is left untouched; use [`store`](Self::store)
    /// to install fresh data.
    pub fn with_mut<R>(
        &self,
        id: TensorId,
        f: impl FnOnce(&mut Tensor) -> R,
    ) -> Result<R, TensorError> {
        Ok(f(&mut self.slot(id)?.tensor))
    }

    pub fn ownership(&self, id: TensorId) -> Result<Ownership, TensorError> {
        Ok(self.slot(id)?.ownership)
    }

    /// A snapshot of the tensor's description and a share of its buffer.
    pub fn snapshot(&self, id: TensorId) -> Result<Tensor, TensorError> {
        self.with(id, Tensor::clone)
    }

    /// Installs a producer's fresh output in `id`.
    ///
    /// Resets the reference count to the initial count and marks the slot
    /// exclusive. Returns the previous buffer.
    pub fn store(
        &self,
        id: TensorId,
        mut produced: Tensor,
    ) -> Result<Option<Arc<Buffer>>, TensorError> {
        let mut slot = self.slot(id)?;
        let own_data = produced.own_data();
        let previous = slot.tensor.set_data(produced.take_data());
        slot.tensor.set_own_data(own_data);
        slot.tensor.set_shape(produced.shape().clone());
        if let Some(alloc) = produced.allocator() {
            slot.tensor.set_allocator(Some(Arc::clone(alloc)));
        }
        slot.tensor.reset_ref_count();
        slot.ownership = initial_ownership(&slot.tensor);
        Ok(previous)
    }

    /// Hands the tensor in `id` to one consumer and records the delivery.
    ///
    /// With `allow_move`, the buffer is moved when the slot is exclusive,
    /// this is the last pending delivery, and the tensor is reclaimable
    /// (owned, not const, not a graph output). Otherwise the consumer gets a
    /// read-only share. Either way the reference count is decremented under
    /// the same lock, so the decision cannot race with another consumer.
    pub fn acquire(&self, id: TensorId, allow_move: bool) -> Result<Acquired, TensorError> {
        let mut slot = self.slot(id)?;
        if !slot.tensor.has_data() {
            return Err(TensorError::NoData {
                name: slot.tensor.name().to_string(),
            });
        }

        let movable = allow_move
            && slot.ownership == Ownership::Exclusive
            && slot.tensor.ref_count() <= 1
            && slot.tensor.is_reclaimable();

        if movable {
            let mut tensor = slot.tensor.clone();
            tensor.set_own_data(true);
            let _ = slot.tensor.take_data();
            slot.tensor.set_ref_count(0);
            return Ok(Acquired {
                tensor,
                moved: true,
            });
        }

        let mut tensor = slot.tensor.clone();
        tensor.set_own_data(false);
        if slot.ownership == Ownership::Exclusive {
            slot.ownership = Ownership::Shared;
        }
        if slot.tensor.dec_ref_count() {
            slot.ownership = initial_ownership(&slot.tensor);
        }
        Ok(Acquired {
            tensor,
            moved: false,
        })
    }

    /// Records a delivery whose data the consumer does not need.
    pub fn release(&self, id: TensorId) -> Result<bool, TensorError> {
        let mut slot = self.slot(id)?;
        let freed = slot.tensor.dec_ref_count();
        if freed {
            slot.ownership = initial_ownership(&slot.tensor);
        }
        Ok(freed)
    }

    /// Drops the slot's buffer unless it is const, and resets ownership.
    pub fn clear(&self, id: TensorId) -> Result<(), TensorError> {
        let mut slot = self.slot(id)?;
        if !slot.tensor.is_const() {
            let _ = slot.tensor.take_data();
            slot.tensor.reset_ref_count();
        }
        slot.ownership = initial_ownership(&slot.tensor);
        Ok(())
    }
}

impl fmt::Debug for TensorArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorArena")
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, DType, Shape};

    fn produced(values: &[f32]) -> Tensor {
        Tensor::from_values("out", Shape::vector(values.len()), values).unwrap()
    }

    fn arena_with_var(init_refs: usize) -> (TensorArena, TensorId) {
        let mut arena = TensorArena::new();
        let mut t = Tensor::new("v", DType::F32, Shape::vector(2), Category::Var);
        t.set_init_ref_count(init_refs);
        let id = arena.push(t);
        (arena, id)
    }

    #[test]
    fn test_invalid_id() {
        let arena = TensorArena::new();
        assert!(matches!(
            arena.ownership(TensorId(3)),
            Err(TensorError::InvalidId { len: 0, .. })
        ));
    }

    #[test]
    fn test_single_consumer_moves() {
        let (arena, id) = arena_with_var(1);
        arena.store(id, produced(&[1.0, 2.0])).unwrap();
        assert_eq!(arena.ownership(id).unwrap(), Ownership::Exclusive);

        let got = arena.acquire(id, true).unwrap();
        assert!(got.moved);
        assert!(got.tensor.own_data());
        assert_eq!(got.tensor.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
        assert!(!arena.with(id, Tensor::has_data).unwrap());
    }

    #[test]
    fn test_two_consumers_share_then_release() {
        let (arena, id) = arena_with_var(2);
        arena.store(id, produced(&[1.0, 2.0])).unwrap();

        let first = arena.acquire(id, true).unwrap();
        assert!(!first.moved);
        assert_eq!(arena.ownership(id).unwrap(), Ownership::Shared);

        // ref_count is now 1 but a share is outstanding: no move.
        let second = arena.acquire(id, true).unwrap();
        assert!(!second.moved);
        assert!(!arena.with(id, Tensor::has_data).unwrap());
        assert!(Arc::ptr_eq(
            first.tensor.data().unwrap(),
            second.tensor.data().unwrap()
        ));
    }

    #[test]
    fn test_static_slot_never_moves() {
        let mut arena = TensorArena::new();
        let c = Tensor::from_values("w", Shape::vector(1), &[9.0f32])
            .unwrap()
            .with_category(Category::Const);
        let id = arena.push(c);
        assert_eq!(arena.ownership(id).unwrap(), Ownership::Static);
        for _ in 0..3 {
            let got = arena.acquire(id, true).unwrap();
            assert!(!got.moved);
        }
        assert!(arena.with(id, Tensor::has_data).unwrap());
        arena.clear(id).unwrap();
        assert!(arena.with(id, Tensor::has_data).unwrap());
    }

    #[test]
    fn test_store_returns_previous_and_resets_refs() {
        let (arena, id) = arena_with_var(3);
        assert!(arena.store(id, produced(&[1.0, 1.0])).unwrap().is_none());
        arena.release(id).unwrap();
        assert_eq!(arena.with(id, Tensor::ref_count).unwrap(), 2);
        let prev = arena.store(id, produced(&[2.0, 2.0])).unwrap();
        assert!(prev.is_some());
        assert_eq!(arena.with(id, Tensor::ref_count).unwrap(), 3);
    }

    #[test]
    fn test_acquire_empty_slot() {
        let (arena, id) = arena_with_var(1);
        assert!(matches!(arena.acquire(id, true), Err(TensorError::NoData { .. })));
    }

    #[test]
    fn test_list_moves_and_shares_like_dense() {
        let list = || {
            let elements = vec![produced(&[1.0]), produced(&[2.0])];
            Tensor::from_elements("l", DType::F32, Shape::vector(1), elements).unwrap()
        };
        let mut arena = TensorArena::new();
        let mut decl = Tensor::new_list("l", DType::F32, Shape::vector(1), Category::Var);
        decl.set_init_ref_count(2);
        let id = arena.push(decl);

        arena.store(id, list()).unwrap();
        let first = arena.acquire(id, true).unwrap();
        let second = arena.acquire(id, true).unwrap();
        assert!(!first.moved && !second.moved);
        assert!(Arc::ptr_eq(first.tensor.data().unwrap(), second.tensor.data().unwrap()));
        assert_eq!(second.tensor.elements().unwrap().len(), 2);
        assert!(!arena.with(id, Tensor::has_data).unwrap());

        // A single reader takes the list itself.
        arena.with_mut(id, |t| t.set_init_ref_count(1)).unwrap();
        arena.store(id, list()).unwrap();
        let only = arena.acquire(id, true).unwrap();
        assert!(only.moved);
        assert!(only.tensor.is_list());
        assert_eq!(only.tensor.elements().unwrap()[1].to_vec::<f32>().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_clear_drops_var_data() {
        let (arena, id) = arena_with_var(1);
        arena.store(id, produced(&[1.0, 2.0])).unwrap();
        arena.clear(id).unwrap();
        assert!(!arena.with(id, Tensor::has_data).unwrap());
        assert_eq!(arena.ownership(id).unwrap(), Ownership::Exclusive);
    }
}

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use ahash::AHashMap;
use lazyjson_common::Result;

use crate::value::Scalar;

/// Bounded cache of decoded scalars keyed by absolute document offset.
///
/// An entry of `None` records a value that decoded to null. The oldest entry is
/// evicted first. With a capacity of zero every lookup goes straight to the loader.
/// Loaders run without the lock held, so two threads may decode the same offset
/// concurrently; the second insert simply overwrites the first.
pub struct ValueCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: AHashMap<u64, Option<Scalar>>,
    order: VecDeque<u64>,
}

impl ValueCache {
    pub fn new(capacity: usize) -> ValueCache {
        ValueCache {
            capacity,
            state: Default::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outer `None` means the offset is not cached.
    pub fn get(&self, pos: u64) -> Option<Option<Scalar>> {
        self.state().entries.get(&pos).cloned()
    }

    pub fn insert(&self, pos: u64, value: Option<Scalar>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state();
        if let Some(slot) = state.entries.get_mut(&pos) {
            *slot = value;
            return;
        }
        if state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
        state.entries.insert(pos, value);
        state.order.push_back(pos);
    }

    pub fn get_or_load<F>(&self, pos: u64, load: F) -> Result<Option<Scalar>>
    where
        F: FnOnce() -> Result<Option<Scalar>>,
    {
        if self.capacity == 0 {
            return load();
        }
        if let Some(value) = self.get(pos) {
            return Ok(value);
        }
        let value = load()?;
        self.insert(pos, value.clone());
        Ok(value)
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.order.clear();
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

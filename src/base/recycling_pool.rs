//! Recycling pool
//!
//! Codec engines are expensive to create, so closed readers and writers give
//! them back to a process-wide pool keyed by their parameters. A guard hands
//! the engine out and returns it on drop.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{const_mutex, Mutex};
use tracing::trace;

use crate::error::Result;

/// Bounded pool of reusable values, keyed by creation parameters
pub struct RecyclingPool<T, K = ()> {
    entries: Mutex<Vec<(K, T)>>,
    max_size: usize,
}

impl<T, K> RecyclingPool<T, K> {
    pub const fn new(max_size: usize) -> Self {
        Self {
            entries: const_mutex(Vec::new()),
            max_size,
        }
    }

    /// Number of idle values currently held.
    pub fn idle(&self) -> usize {
        self.entries.lock().len()
    }

    fn put(&self, key: K, value: T) {
        let mut entries = self.entries.lock();
        if entries.len() < self.max_size {
            entries.push((key, value));
        }
    }
}

impl<T, K: PartialEq> RecyclingPool<T, K> {
    /// Takes an idle value created with `key` and prepares it with `reset`,
    /// or creates a fresh one.
    pub fn get(
        &'static self,
        key: K,
        create: impl FnOnce() -> Result<T>,
        reset: impl FnOnce(&mut T) -> Result<()>,
    ) -> Result<Recycled<T, K>> {
        let reused = {
            let mut entries = self.entries.lock();
            entries
                .iter()
                .rposition(|(entry_key, _)| *entry_key == key)
                .map(|index| entries.swap_remove(index).1)
        };
        let value = match reused {
            Some(mut value) => {
                trace!("Reusing pooled engine");
                reset(&mut value)?;
                value
            }
            None => create()?,
        };
        Ok(Recycled {
            value: Some(value),
            key: Some(key),
            pool: self,
        })
    }
}

/// Pooled value, returned to its pool on drop
pub struct Recycled<T: 'static, K: 'static = ()> {
    value: Option<T>,
    key: Option<K>,
    pool: &'static RecyclingPool<T, K>,
}

impl<T: 'static, K: 'static> Recycled<T, K> {
    /// Drops the value instead of returning it, for engines left in an
    /// unknown state.
    pub fn discard(mut self) {
        self.value = None;
    }
}

impl<T: 'static, K: fmt::Debug + 'static> fmt::Debug for Recycled<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recycled")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<T: 'static, K: 'static> Deref for Recycled<T, K> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("value present until drop"),
        }
    }
}

impl<T: 'static, K: 'static> DerefMut for Recycled<T, K> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("value present until drop"),
        }
    }
}

impl<T: 'static, K: 'static> Drop for Recycled<T, K> {
    fn drop(&mut self) {
        if let (Some(value), Some(key)) = (self.value.take(), self.key.take()) {
            self.pool.put(key, value);
        }
    }
}

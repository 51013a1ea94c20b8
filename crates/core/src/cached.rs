//! Per-field lazy cache.
//!
//! A [`CachedField`] is empty until first read, computes its value at most
//! once while readers wait on the field lock, and can be emptied again on
//! its own. Each field has its own lock, so different fields of one entry
//! compute in parallel while the same field never computes twice at once.

use parking_lot::Mutex;

/// A lazily computed, individually invalidated value.
///
/// Holding the lock while computing is what makes concurrent first reads
/// wait for a single computation instead of racing to fetch the same data.
/// A failed computation stores nothing; the next read starts over.
#[derive(Debug)]
pub struct CachedField<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for CachedField<T> {
    fn default() -> Self {
        Self { slot: Mutex::new(None) }
    }
}

impl<T: Clone> CachedField<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value, computing it with `init` if the field is
    /// empty.
    pub fn get_or_try_init<E, F>(&self, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut slot = self.slot.lock();
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }

        let value = init()?;
        *slot = Some(value.clone());
        Ok(value)
    }

    /// The cached value, if any, without computing.
    pub fn get(&self) -> Option<T> {
        self.slot.lock().clone()
    }

    /// Stores `value`, replacing whatever was cached.
    pub fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Empties the field and returns what it held. The next read recomputes.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_ready(&self) -> bool {
        self.slot.lock().is_some()
    }
}

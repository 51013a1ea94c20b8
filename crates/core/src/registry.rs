//! Identity cache for comic and article entries.
//!
//! A [`Registry`] guarantees that at most one live entry exists per [`Key`].
//! Entries are tracked through weak references, so an entry nobody holds is
//! dropped together with its cached data. Pinned ("keep alive") entries are
//! additionally held strongly until they are deleted.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::key::Key;

/// Entries that own cached fields the registry can clear.
pub trait Evict {
    /// Empties every cached field.
    fn evict(&self);
}

#[derive(Debug)]
struct Slots<T> {
    live: HashMap<Key, Weak<T>>,
    pinned: HashMap<Key, Arc<T>>,
    prune_at: usize,
}

impl<T> Slots<T> {
    fn prune(&mut self) {
        self.live.retain(|_, entry| entry.strong_count() > 0);
        self.prune_at = (self.live.len() * 2).max(64);
    }
}

/// Flyweight registry: one shared entry per key.
#[derive(Debug)]
pub struct Registry<T> {
    slots: Mutex<Slots<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { slots: Mutex::new(Slots { live: HashMap::new(), pinned: HashMap::new(), prune_at: 64 }) }
    }
}

impl<T: Evict> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live entry for `key`, or a new one built by `make`.
    ///
    /// Lookup, creation and pinning happen under one lock, so two callers
    /// can never both create an entry for the same key. With `keep_alive`
    /// the returned entry is pinned, replacing any earlier pin for the key.
    pub fn get_or_create<F>(&self, key: Key, keep_alive: bool, make: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let mut slots = self.slots.lock();

        let entry = match slots.live.get(&key).and_then(Weak::upgrade) {
            Some(entry) => {
                trace!(%key, "reusing live entry");
                entry
            }
            None => {
                if slots.live.len() >= slots.prune_at {
                    slots.prune();
                }
                let entry = Arc::new(make());
                slots.live.insert(key, Arc::downgrade(&entry));
                debug!(%key, "created entry");
                entry
            }
        };

        if keep_alive {
            slots.pinned.insert(key, Arc::clone(&entry));
        }

        entry
    }

    /// The live entry for `key`, if any, without creating one.
    pub fn get(&self, key: Key) -> Option<Arc<T>> {
        self.slots.lock().live.get(&key).and_then(Weak::upgrade)
    }

    /// Clears `entry` and forgets it, so the next lookup for `key` builds a
    /// fresh entry. Slots that already belong to a newer entry are left alone.
    pub fn delete(&self, key: Key, entry: &Arc<T>) {
        entry.evict();

        let mut slots = self.slots.lock();
        if slots.pinned.get(&key).is_some_and(|pinned| Arc::ptr_eq(pinned, entry)) {
            slots.pinned.remove(&key);
        }
        if slots
            .live
            .get(&key)
            .is_some_and(|live| std::ptr::eq(live.as_ptr(), Arc::as_ptr(entry)))
        {
            slots.live.remove(&key);
        }
        debug!(%key, "deleted entry");
    }

    /// Clears and forgets every entry, pinned or not.
    pub fn delete_all(&self) {
        let (live, pinned) = {
            let mut slots = self.slots.lock();
            let live: Vec<Arc<T>> = slots.live.drain().filter_map(|(_, entry)| entry.upgrade()).collect();
            let pinned: Vec<Arc<T>> = slots.pinned.drain().map(|(_, entry)| entry).collect();
            slots.prune_at = 64;
            (live, pinned)
        };

        debug!(live = live.len(), pinned = pinned.len(), "deleting all entries");
        for entry in &live {
            entry.evict();
        }
    }

    pub fn is_pinned(&self, key: Key) -> bool {
        self.slots.lock().pinned.contains_key(&key)
    }

    /// Number of pinned entries.
    pub fn pinned_len(&self) -> usize {
        self.slots.lock().pinned.len()
    }

    /// Number of entries that are still alive.
    pub fn live_len(&self) -> usize {
        self.slots.lock().live.values().filter(|entry| entry.strong_count() > 0).count()
    }
}

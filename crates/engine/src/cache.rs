//! Hash-keyed memoization cache
//!
//! One cache exists per algorithm identity and is shared by every instance
//! of that algorithm. Entries are keyed by the digest of a module's effective
//! state and held as `Arc`s, so a returned result keeps its whole entry alive.
//!
//! ## Insert-if-absent
//!
//! `cache()` never overwrites. When two runs with identical state race, both
//! may compute, but only the first insert is ever observable; the loser gets
//! the winner's entry back. Growth is unbounded: there is no eviction, only an
//! explicit `reset()`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use memora_core::{Error, Result, ResultMap};
use std::sync::Arc;
use tracing::debug;

/// Digest-keyed store of previously computed results
#[derive(Debug)]
pub struct MemoizationCache<V = ResultMap> {
    entries: DashMap<String, Arc<V>>,
}

impl<V> MemoizationCache<V> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of entries stored under `digest` (0 or 1)
    pub fn count(&self, digest: &str) -> usize {
        usize::from(self.entries.contains_key(digest))
    }

    /// Is anything stored under `digest`?
    pub fn contains(&self, digest: &str) -> bool {
        self.entries.contains_key(digest)
    }

    /// Store `value` under `digest` unless an entry already exists
    ///
    /// Returns whatever is stored under `digest` afterwards, which is an
    /// earlier entry if one won the race.
    pub fn cache(&self, digest: impl Into<String>, value: V) -> Arc<V> {
        match self.entries.entry(digest.into()) {
            Entry::Occupied(existing) => {
                debug!(target: "memora::cache", digest = %existing.key(), "Entry already cached; keeping first result");
                Arc::clone(existing.get())
            }
            Entry::Vacant(slot) => {
                debug!(target: "memora::cache", digest = %slot.key(), "Caching result");
                Arc::clone(slot.insert(Arc::new(value)).value())
            }
        }
    }

    /// The entry stored under `digest`, if any
    pub fn get(&self, digest: &str) -> Option<Arc<V>> {
        self.entries.get(digest).map(|entry| Arc::clone(entry.value()))
    }

    /// The entry stored under `digest`
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if nothing is stored.
    pub fn uncache(&self, digest: &str) -> Result<Arc<V>> {
        self.get(digest)
            .ok_or_else(|| Error::KeyNotFound(digest.to_string()))
    }

    /// The entry stored under `digest`, or `default` if absent
    pub fn uncache_or(&self, digest: &str, default: V) -> Arc<V> {
        self.get(digest).unwrap_or_else(|| Arc::new(default))
    }

    /// Remove every entry
    pub fn reset(&self) {
        self.entries.clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the cache empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoizationCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

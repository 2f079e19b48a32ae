//! TTL-bounded key/value store with version-based refresh.
//!
//! Expiry is lazy: an entry is only checked (and dropped) when it is read.
//! There is no background sweep and no capacity eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use super::entry::{CacheEntry, Versioned};
use super::key::CacheKey;
use crate::clock::{Clock, SystemClock};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of reads that returned a live entry.
    pub hits: u64,
    /// Number of reads that returned nothing.
    pub misses: u64,
    /// Number of entries dropped because they outlived the TTL.
    pub expirations: u64,
    /// Number of entries currently held (expired ones included until read).
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Generic cache store keyed by [`CacheKey`].
///
/// All operations are infallible. Per-key read-modify-write sequences are
/// serialised by the map's shard locks, so an entry's `stored_at` always
/// reflects its latest write.
pub struct CacheStore<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl<V> CacheStore<V>
where
    V: Versioned + Clone,
{
    /// Create a store using the wall clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live value, dropping the entry if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now, self.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value().value().clone());
            }
        }

        // Re-checked under the shard lock: a concurrent `set` may have
        // replaced the expired entry in between.
        let ttl = self.ttl;
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now, ttl))
            .is_some()
        {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or overwrite. Always restamps the entry with "now".
    pub fn set(&self, key: CacheKey, value: V) {
        let entry = CacheEntry::new(value, self.clock.now());
        self.entries.insert(key, entry);
    }

    /// Remove an entry unconditionally. Returns true if something was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Replace an existing entry when `fresh` carries a different, non-zero
    /// version. Never creates an entry. Returns true if the entry was replaced.
    pub fn update_if_stale(&self, key: &CacheKey, fresh: V) -> bool {
        let fresh_version = fresh.version();
        if fresh_version == 0 {
            return false;
        }

        match self.entries.get_mut(key) {
            Some(mut entry) if entry.version() != fresh_version => {
                *entry = CacheEntry::new(fresh, self.clock.now());
                true
            }
            _ => false,
        }
    }

    /// Returns true if a live entry exists, without touching statistics.
    pub fn contains_fresh(&self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired(now, self.ttl))
            .unwrap_or(false)
    }

    /// Number of entries held, including expired entries not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the keys currently held.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        }
    }
}

impl<V> std::fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

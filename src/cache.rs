// ABOUTME: Bounded key-value cache with least-recently-used eviction
// ABOUTME: Backs the compiled-template cache and the pipeline's content-hash caches

use indexmap::IndexMap;
use log::debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Counters describing how a cache has been used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Fixed-capacity cache. Entries are kept in recency order: the front of
/// the map is the least recently used entry, the back the most recent.
///
/// Expiry is checked lazily on access and by `purge_expired`; there is no
/// background timer to start or stop.
pub struct LruCache<K, V> {
    entries: IndexMap<K, Entry<V>>,
    capacity: usize,
    ttl: Option<Duration>,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self::with_ttl(capacity, None)
    }

    pub fn with_ttl(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
            ttl,
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Look up a value and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<V> {
        let Some(index) = self.entries.get_index_of(key) else {
            self.stats.misses += 1;
            return None;
        };

        if self.is_expired(&self.entries[index]) {
            self.entries.shift_remove_index(index);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }

        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.stats.hits += 1;
        Some(self.entries[last].value.clone())
    }

    /// True when a live entry exists; does not touch recency or counters
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .map(|entry| !self.is_expired(entry))
            .unwrap_or(false)
    }

    /// Insert a value as most recently used, evicting the least recently
    /// used entry when the cache is full
    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.contains_key(&key) {
            self.entries.shift_remove(&key);
        } else if self.entries.len() >= self.capacity {
            if self.entries.shift_remove_index(0).is_some() {
                self.stats.evictions += 1;
                debug!("Cache full ({} entries), evicted oldest entry", self.capacity);
            }
        }

        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key).map(|entry| entry.value)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&mut self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        self.ttl
            .map(|ttl| entry.inserted_at.elapsed() >= ttl)
            .unwrap_or(false)
    }
}

//! Bounded embedding cache with least-recently-used eviction.
//!
//! Shared between the chapter segmenter and the memory recall path, so it is
//! guarded by a mutex and handed around as `Arc<EmbeddingCache>`.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Default number of cached vectors.
pub const DEFAULT_CAPACITY: usize = 500;

/// Hit/miss counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Fixed-capacity text → vector cache.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` vectors (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a vector, promoting it to most-recently-used on hit.
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let found = self.entries.lock().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert or replace a vector, evicting the least-recently-used entry
    /// when the cache is full.
    pub fn set(&self, key: impl Into<String>, vector: Vec<f32>) {
        let key = key.into();
        let evicted = self.entries.lock().push(key.clone(), vector);
        if let Some((old_key, _)) = evicted {
            // `push` hands back the replaced value when the key already existed.
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(evicted = %old_key, "Embedding cache eviction");
            }
        }
    }

    /// Whether a key is cached, without touching its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

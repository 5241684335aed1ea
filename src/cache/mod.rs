//! LRU cache for kernel evaluations
//!
//! The SMO inner loop re-evaluates K(i, j) for the same sample pairs many
//! times within a pass; the cache keys on sample indices and exploits kernel
//! symmetry by normalizing keys so that i <= j.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key normalized so that i <= j.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey {
    i: usize,
    j: usize,
}

impl PairKey {
    fn new(i: usize, j: usize) -> Self {
        if i <= j {
            Self { i, j }
        } else {
            Self { i: j, j: i }
        }
    }
}

/// LRU cache over kernel matrix entries.
pub struct KernelCache {
    cache: LruCache<PairKey, f64>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Capacity in number of entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Capacity derived from a memory budget in bytes.
    pub fn with_memory_limit(memory_bytes: usize) -> Self {
        // Key + value + LRU bookkeeping per entry.
        Self::new((memory_bytes / 32).max(1))
    }

    pub fn get(&mut self, i: usize, j: usize) -> Option<f64> {
        match self.cache.get(&PairKey::new(i, j)) {
            Some(&value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, i: usize, j: usize, value: f64) {
        self.cache.put(PairKey::new(i, j), value);
    }

    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

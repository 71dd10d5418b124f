use crate::Capacity;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit and miss counters of one cache.
///
/// Only bumped and reset while the owning cache holds its store lock, so a
/// snapshot taken under that lock agrees with the stored entries.
#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss means the computation is about to run, not that it finished.
    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, capacity: Capacity, current_size: usize) -> CacheInfo {
        CacheInfo {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            capacity,
            current_size,
        }
    }
}

/// Point-in-time view of a cache: counters, bound and current size.
///
/// # Examples
///
/// ```
/// use lrumemo_core::{Args, CacheConfig, MemoCache};
///
/// let cache: MemoCache<u32> = MemoCache::new(CacheConfig::new(2));
/// let key = cache.make_key(&Args::new().arg(&1));
/// cache.get_or_compute(key.clone(), || 10);
/// cache.get_or_compute(key, || 10);
///
/// let info = cache.stats();
/// assert_eq!((info.hits, info.misses, info.current_size), (1, 1, 1));
/// assert_eq!(info.to_string(), "CacheInfo(hits=1, misses=1, maxsize=2, currsize=1)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    pub capacity: Capacity,
    pub current_size: usize,
}

impl CacheInfo {
    /// Fraction of accesses served from the cache, 0.0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheInfo(hits={}, misses={}, maxsize={}, currsize={})",
            self.hits, self.misses, self.capacity, self.current_size
        )
    }
}

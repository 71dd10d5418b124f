use crate::keys::{Arg, Args, CacheKey};
use crate::recency_store::{Insertion, RecencyStore};
use crate::stats::CacheStats;
use crate::{CacheConfig, CacheError, CacheInfo, Capacity, ReceiverHandle};
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A memoizing cache in front of a possibly slow, possibly asynchronous
/// computation.
///
/// Results are stored as `Arc<R>`: a hit hands back the very object that was
/// stored on the miss, and cloning it under the lock runs no user code.
///
/// # Locking
///
/// A single mutex guards the recency store and the counters. It is held only
/// for the lookup (and promotion) of a key, for the insertion after the
/// computation, and for reading or resetting statistics. It is never held
/// while the computation runs, so a slow computation never blocks lookups of
/// other keys, and never while a displaced value is dropped.
///
/// # Concurrent misses
///
/// Calls for the same uncached key that overlap each run the computation.
/// All of them record a miss and return their own result. In a bounded cache
/// the first insertion to reach the lock is kept and later ones leave the
/// store untouched; in an unbounded cache the last one overwrites.
///
/// # Failures and cancellation
///
/// A failed computation (`Err` from the `try_*` variants) or a dropped future
/// stores nothing. The miss recorded before the computation started stays.
///
/// # Examples
///
/// ```
/// use lrumemo_core::{Args, CacheConfig, MemoCache};
///
/// let cache: MemoCache<String> = MemoCache::new(CacheConfig::new(2));
///
/// let key = cache.make_key(&Args::new().arg(&42));
/// let first = cache.get_or_compute(key.clone(), || "answer".to_string());
/// let second = cache.get_or_compute(key, || unreachable!());
///
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// assert_eq!(cache.stats().hits, 1);
/// ```
pub struct MemoCache<R> {
    config: CacheConfig,
    store: Mutex<RecencyStore<CacheKey, Arc<R>>>,
    stats: CacheStats,
}

impl<R> MemoCache<R> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Mutex::new(RecencyStore::new(config.capacity)),
            stats: CacheStats::new(),
            config,
        }
    }

    pub fn with_capacity(capacity: impl Into<Capacity>) -> Self {
        Self::new(CacheConfig::new(capacity))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    fn label(&self) -> &str {
        self.name().unwrap_or("<unnamed>")
    }

    /// Derives the key for `args`, honoring the configured type sensitivity.
    pub fn make_key(&self, args: &Args) -> CacheKey {
        CacheKey::new(args, self.config.type_sensitive)
    }

    /// Looks `key` up and records the outcome.
    ///
    /// With zero capacity there is nothing to look up; the call only counts
    /// as a miss.
    fn lookup_entry(&self, key: &CacheKey) -> Option<Arc<R>> {
        let cached = {
            let mut store = self.store.lock();
            let cached = store.lookup(key).map(Arc::clone);
            match cached {
                Some(_) => self.stats.record_hit(),
                None => self.stats.record_miss(),
            }
            cached
        };

        match cached {
            Some(_) => trace!(cache = self.label(), ?key, "cache hit"),
            None => trace!(cache = self.label(), ?key, "cache miss"),
        }
        cached
    }

    /// Stores a freshly computed value and returns it to the caller.
    fn store(&self, key: CacheKey, value: R) -> Arc<R> {
        let value = Arc::new(value);
        if self.config.capacity == Capacity::Disabled {
            return value;
        }

        let outcome = self.store.lock().insert_or_replace(key, Arc::clone(&value));

        // Whatever the store handed back is dropped here, after the lock.
        match outcome {
            Insertion::Evicted(evicted, _) => {
                trace!(cache = self.label(), key = ?evicted, "evicted least recently used entry");
            }
            Insertion::AlreadyPresent(_) => {
                debug!(
                    cache = self.label(),
                    "concurrent miss already stored this key, keeping the existing entry"
                );
            }
            Insertion::Inserted | Insertion::Replaced(_) | Insertion::Discarded(_) => {}
        }
        value
    }

    /// Returns the cached result for `key`, computing and storing it on a miss.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Arc<R>
    where
        F: FnOnce() -> R,
    {
        if let Some(hit) = self.lookup_entry(&key) {
            return hit;
        }
        let value = compute();
        self.store(key, value)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for fallible computations.
    ///
    /// # Errors
    ///
    /// Returns the computation's own error unchanged; nothing is stored.
    pub fn try_get_or_compute<E, F>(&self, key: CacheKey, compute: F) -> Result<Arc<R>, E>
    where
        F: FnOnce() -> Result<R, E>,
    {
        if let Some(hit) = self.lookup_entry(&key) {
            return Ok(hit);
        }
        let value = compute()?;
        Ok(self.store(key, value))
    }

    /// Async variant of [`get_or_compute`](Self::get_or_compute).
    ///
    /// The future is only created on a miss. The lock is released before it
    /// is awaited.
    pub async fn get_or_compute_async<F, Fut>(&self, key: CacheKey, compute: F) -> Arc<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        if let Some(hit) = self.lookup_entry(&key) {
            return hit;
        }
        let value = compute().await;
        self.store(key, value)
    }

    /// Async variant of [`try_get_or_compute`](Self::try_get_or_compute).
    ///
    /// # Errors
    ///
    /// Returns the computation's own error unchanged; nothing is stored.
    pub async fn try_get_or_compute_async<E, F, Fut>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Arc<R>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        if let Some(hit) = self.lookup_entry(&key) {
            return Ok(hit);
        }
        let value = compute().await?;
        Ok(self.store(key, value))
    }

    /// Builds the key of a method call: the receiver identity first, then
    /// the remaining arguments.
    fn method_key<S>(&self, receiver: &Arc<S>, args: Args) -> CacheKey
    where
        S: Any + Send + Sync,
    {
        let handle = ReceiverHandle::bind(receiver, self.config.bind_receiver_non_owning);
        let args = args.with_receiver(Arg::receiver::<S>(handle.id()));
        self.make_key(&args)
    }

    /// Memoizes a method call on `receiver`.
    ///
    /// Unless the cache is configured otherwise, the key only refers to the
    /// receiver weakly: cached entries never keep it alive. The receiver is
    /// borrowed as a live `Arc` for the duration of the call, so it cannot
    /// disappear before the computation gets it.
    ///
    /// ```
    /// use lrumemo_core::{Args, CacheConfig, MemoCache};
    /// use std::sync::Arc;
    ///
    /// struct Pricing {
    ///     rate: u64,
    /// }
    ///
    /// let cache: MemoCache<u64> = MemoCache::new(CacheConfig::default());
    /// let pricing = Arc::new(Pricing { rate: 3 });
    ///
    /// let price = cache.invoke_method(&pricing, Args::new().arg(&10), |this| this.rate * 10);
    /// assert_eq!(*price, 30);
    ///
    /// // The cache holds no strong reference to the receiver.
    /// assert_eq!(Arc::strong_count(&pricing), 1);
    /// ```
    pub fn invoke_method<S, F>(&self, receiver: &Arc<S>, args: Args, compute: F) -> Arc<R>
    where
        S: Any + Send + Sync,
        F: FnOnce(Arc<S>) -> R,
    {
        let key = self.method_key(receiver, args);
        self.get_or_compute(key, || compute(Arc::clone(receiver)))
    }

    /// Fallible variant of [`invoke_method`](Self::invoke_method).
    ///
    /// # Errors
    ///
    /// Returns the computation's own error unchanged; nothing is stored.
    pub fn try_invoke_method<S, E, F>(
        &self,
        receiver: &Arc<S>,
        args: Args,
        compute: F,
    ) -> Result<Arc<R>, E>
    where
        S: Any + Send + Sync,
        F: FnOnce(Arc<S>) -> Result<R, E>,
    {
        let key = self.method_key(receiver, args);
        self.try_get_or_compute(key, || compute(Arc::clone(receiver)))
    }

    /// Async variant of [`invoke_method`](Self::invoke_method).
    pub async fn invoke_method_async<S, F, Fut>(
        &self,
        receiver: &Arc<S>,
        args: Args,
        compute: F,
    ) -> Arc<R>
    where
        S: Any + Send + Sync,
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = R>,
    {
        let key = self.method_key(receiver, args);
        self.get_or_compute_async(key, || compute(Arc::clone(receiver)))
            .await
    }

    /// Async variant of [`try_invoke_method`](Self::try_invoke_method).
    ///
    /// # Errors
    ///
    /// Returns the computation's own error unchanged; nothing is stored.
    pub async fn try_invoke_method_async<S, E, F, Fut>(
        &self,
        receiver: &Arc<S>,
        args: Args,
        compute: F,
    ) -> Result<Arc<R>, E>
    where
        S: Any + Send + Sync,
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let key = self.method_key(receiver, args);
        self.try_get_or_compute_async(key, || compute(Arc::clone(receiver)))
            .await
    }

    /// Resolves a receiver handle and memoizes the method call on it.
    ///
    /// # Errors
    ///
    /// Fails with [`CacheError::ReceiverGone`] (converted into `E`) when the
    /// receiver was dropped; in that case nothing is looked up, counted or
    /// computed. Otherwise returns the computation's own error unchanged.
    pub fn invoke_with_handle<S, E, F>(
        &self,
        handle: &ReceiverHandle<S>,
        args: Args,
        compute: F,
    ) -> Result<Arc<R>, E>
    where
        S: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce(Arc<S>) -> Result<R, E>,
    {
        let receiver = self.resolve(handle)?;
        self.try_invoke_method(&receiver, args, compute)
    }

    /// Async variant of [`invoke_with_handle`](Self::invoke_with_handle).
    ///
    /// The resolved receiver is held strongly only while the computation runs.
    ///
    /// # Errors
    ///
    /// Same as [`invoke_with_handle`](Self::invoke_with_handle).
    pub async fn invoke_with_handle_async<S, E, F, Fut>(
        &self,
        handle: &ReceiverHandle<S>,
        args: Args,
        compute: F,
    ) -> Result<Arc<R>, E>
    where
        S: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let receiver = self.resolve(handle)?;
        self.try_invoke_method_async(&receiver, args, compute)
            .await
    }

    fn resolve<S>(&self, handle: &ReceiverHandle<S>) -> Result<Arc<S>, CacheError>
    where
        S: Any + Send + Sync,
    {
        handle.resolve().map_err(|err| {
            warn!(cache = self.label(), error = %err, "cached method invoked on a dropped receiver");
            err
        })
    }

    /// Checks for `key` without counting an access or changing recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of hits, misses, capacity and current size.
    pub fn stats(&self) -> CacheInfo {
        let store = self.store.lock();
        self.stats.snapshot(store.capacity(), store.len())
    }

    /// Zeroes hits and misses; stored entries stay.
    pub fn reset_stats(&self) {
        let _store = self.store.lock();
        self.stats.reset();
    }

    /// Drops every entry and zeroes the statistics.
    pub fn clear(&self) {
        let drained = {
            let mut store = self.store.lock();
            self.stats.reset();
            store.clear()
        };
        debug!(cache = self.label(), entries = drained.len(), "cache cleared");
        drop(drained);
    }

    /// Keys from least to most recently used (map order when unbounded).
    pub fn keys(&self) -> Vec<CacheKey> {
        self.store.lock().keys().into_iter().cloned().collect()
    }

    /// Drops the entries of method calls whose receiver no longer exists.
    ///
    /// Such entries can never be hit again but otherwise stay until they are
    /// evicted. Returns the number of entries removed.
    pub fn purge_dead_receivers(&self) -> usize {
        let removed = self
            .store
            .lock()
            .retain(|key, _| !key.has_dead_receiver());
        let count = removed.len();
        if count > 0 {
            debug!(cache = self.label(), entries = count, "purged entries of dropped receivers");
        }
        drop(removed);
        count
    }
}

//! Process-wide registry of named caches.
//!
//! Caches created by the `#[lru_cache]` attribute live in hidden statics. They
//! register here under their name (the function name unless overridden) so
//! that their statistics can be read and their contents cleared from
//! anywhere.
//!
//! # Examples
//!
//! ```
//! use lrumemo_core::registry;
//!
//! if let Some(info) = registry::stats("fetch_user") {
//!     println!("fetch_user: {}", info);
//! }
//!
//! for name in registry::list() {
//!     registry::clear(&name);
//! }
//! ```

use crate::{CacheInfo, MemoCache};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Type-erased control surface of a cache.
pub trait CacheControl: Send + Sync {
    fn name(&self) -> Option<&str>;
    fn info(&self) -> CacheInfo;
    fn clear(&self);
    fn reset_stats(&self);
}

impl<R: Send + Sync> CacheControl for MemoCache<R> {
    fn name(&self) -> Option<&str> {
        MemoCache::name(self)
    }

    fn info(&self) -> CacheInfo {
        MemoCache::stats(self)
    }

    fn clear(&self) {
        MemoCache::clear(self)
    }

    fn reset_stats(&self) {
        MemoCache::reset_stats(self)
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, &'static dyn CacheControl>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `cache` under `name`, replacing any cache previously registered
/// under the same name.
pub fn register(name: &str, cache: &'static dyn CacheControl) {
    REGISTRY.write().insert(name.to_string(), cache);
}

pub fn unregister(name: &str) -> bool {
    REGISTRY.write().remove(name).is_some()
}

/// Snapshot of the named cache's statistics.
pub fn stats(name: &str) -> Option<CacheInfo> {
    lookup(name).map(|cache| cache.info())
}

/// Copies the cache reference out so the registry lock is released before
/// the cache runs any user `Drop` code.
fn lookup(name: &str) -> Option<&'static dyn CacheControl> {
    REGISTRY.read().get(name).copied()
}

/// Clears the named cache. Returns `false` if no such cache is registered.
pub fn clear(name: &str) -> bool {
    match lookup(name) {
        Some(cache) => {
            cache.clear();
            true
        }
        None => false,
    }
}

/// Zeroes the named cache's hit and miss counters.
pub fn reset_stats(name: &str) -> bool {
    match lookup(name) {
        Some(cache) => {
            cache.reset_stats();
            true
        }
        None => false,
    }
}

pub fn list() -> Vec<String> {
    REGISTRY.read().keys().cloned().collect()
}

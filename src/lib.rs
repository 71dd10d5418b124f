//! # lrumemo
//!
//! Bounded LRU memoization for functions, methods and async functions.
//!
//! ## Features
//!
//! - **Easy to use**: Add `#[lru_cache]` to any function, method or `async fn`
//! - **LRU eviction**: Bounded caches drop the least recently used entry in O(1)
//! - **Async-aware**: The output of the future is cached, not the future itself
//! - **Non-owning methods**: `self: &Arc<Self>` methods never keep their receiver alive
//! - **Result-aware**: Only `Ok` values are cached, errors pass through untouched
//! - **Statistics**: Hits, misses, maxsize and current size per cache
//!
//! ## Quick Start
//!
//! ```rust
//! use lrumemo::lru_cache;
//!
//! #[lru_cache(maxsize = 32)]
//! fn fibonacci(n: u64) -> u64 {
//!     if n <= 1 {
//!         return n;
//!     }
//!     fibonacci(n - 1) + fibonacci(n - 2)
//! }
//!
//! assert_eq!(fibonacci(40), 102_334_155);
//! let info = lrumemo::cache_info("fibonacci").unwrap();
//! assert_eq!(info.misses, 41);
//! ```
//!
//! ## Methods
//!
//! Methods taking `self: &Arc<Self>` are keyed by the identity of the
//! receiver. The cache only holds a weak reference, so dropping the last
//! `Arc` frees the object even while its results are still cached.
//!
//! ```rust
//! use lrumemo::lru_cache;
//! use std::sync::Arc;
//!
//! struct Pricing {
//!     rate: f64,
//! }
//!
//! impl Pricing {
//!     #[lru_cache(maxsize = 16)]
//!     fn quote(self: &Arc<Self>, amount: u32) -> f64 {
//!         amount as f64 * self.rate
//!     }
//! }
//!
//! let pricing = Arc::new(Pricing { rate: 1.5 });
//! assert_eq!(pricing.quote(10), 15.0);
//! assert_eq!(pricing.quote(10), 15.0);
//!
//! let weak = Arc::downgrade(&pricing);
//! drop(pricing);
//! assert!(weak.upgrade().is_none());
//! ```
//!
//! ## Custom Argument Types
//!
//! Arguments must implement [`KeyArg`]. Types that only implement `Debug`
//! can be wrapped in [`DebugArg`] or implement [`KeyArg`] through it:
//!
//! ```rust
//! use lrumemo::{ArgValue, DebugArg, KeyArg};
//!
//! #[derive(Debug)]
//! struct Region {
//!     code: &'static str,
//! }
//!
//! impl KeyArg for Region {
//!     fn to_arg_value(&self) -> ArgValue {
//!         DebugArg(self).to_arg_value()
//!     }
//! }
//! ```
//!
//! ## Manual Caches
//!
//! [`MemoCache`] can be used directly when the attribute does not fit, e.g.
//! for caches owned by a struct or keyed by computed arguments.

pub use lrumemo_core::*;
pub use lrumemo_macros::lru_cache;

#[doc(hidden)]
pub use once_cell;

/// Statistics of the cache registered under `cache_name`.
pub fn cache_info(cache_name: &str) -> Option<CacheInfo> {
    registry::stats(cache_name)
}

/// Clears the cache registered under `cache_name` and zeroes its counters.
///
/// Returns `false` if no cache with that name exists.
pub fn cache_clear(cache_name: &str) -> bool {
    registry::clear(cache_name)
}

/// Zeroes the hit and miss counters of the cache registered under `cache_name`.
pub fn reset_stats(cache_name: &str) -> bool {
    registry::reset_stats(cache_name)
}

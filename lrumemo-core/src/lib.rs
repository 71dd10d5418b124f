//! # lrumemo Core
//!
//! Cache engine behind the `lrumemo` memoization library.
//!
//! ## Features
//!
//! - **Argument keys**: Positional and keyword arguments folded into a hashable
//!   [`CacheKey`], optionally distinguishing argument types
//! - **O(1) LRU**: Arena-backed circular list with in-place slot reuse on eviction
//! - **Sync and async**: The same cache memoizes closures and futures
//! - **Short critical sections**: The lock is never held while a computation runs
//! - **Non-owning receivers**: Cached methods never keep their receiver alive
//! - **Statistics**: Hits, misses, capacity and current size on demand
//!
//! ## Module Organization
//!
//! - [`keys`] - Argument conversion and cache key derivation
//! - [`recency_store`] - Bounded/unbounded storage with recency tracking
//! - [`receiver`] - Weak receiver handles for cached methods
//! - [`registry`] - Named caches registered by the `#[lru_cache]` attribute
//!
//! ## Example
//!
//! ```
//! use lrumemo_core::{Args, CacheConfig, MemoCache};
//!
//! let cache: MemoCache<u64> = MemoCache::new(CacheConfig::new(2));
//! let square = |n: u64| cache.get_or_compute(cache.make_key(&Args::new().arg(&n)), || n * n);
//!
//! assert_eq!(*square(1), 1);
//! assert_eq!(*square(2), 4);
//! assert_eq!(*square(1), 1);
//! assert_eq!(*square(3), 9);
//!
//! let info = cache.stats();
//! assert_eq!((info.hits, info.misses, info.current_size), (1, 3, 2));
//! ```
mod config;
mod error;
mod memo_cache;
mod stats;

pub mod keys;
pub mod receiver;
pub mod recency_store;
pub mod registry;

pub use config::{CacheConfig, Capacity, DEFAULT_CAPACITY};
pub use error::CacheError;
pub use keys::{Arg, ArgValue, Args, ByteArg, CacheKey, DebugArg, KeyArg};
pub use memo_cache::MemoCache;
pub use receiver::{ReceiverHandle, ReceiverId};
pub use recency_store::{Insertion, RecencyStore};
pub use registry::CacheControl;
pub use stats::CacheInfo;

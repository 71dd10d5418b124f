use thiserror::Error;

/// Errors raised by the cache layer itself.
///
/// Failures of the memoized computation are never wrapped in this type: the
/// `try_*` operations of [`MemoCache`](crate::MemoCache) hand the computation's
/// own error back to the caller untouched. `CacheError` only covers usage
/// errors the cache detects on its own.
///
/// # Examples
///
/// ```
/// use lrumemo_core::{CacheError, ReceiverHandle};
/// use std::sync::Arc;
///
/// let receiver = Arc::new(String::from("service"));
/// let handle = ReceiverHandle::weak(&receiver);
/// drop(receiver);
///
/// let err = handle.resolve().unwrap_err();
/// assert!(matches!(err, CacheError::ReceiverGone { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A cached method was invoked through a non-owning handle whose receiver
    /// has already been dropped.
    #[error("receiver of type `{type_name}` was dropped before the cached method was invoked")]
    ReceiverGone { type_name: &'static str },
}

//! Non-owning binding of method receivers.
//!
//! Caching a method keys every entry on the receiver it was called on. Holding
//! the receiver strongly inside the key would keep it alive for as long as the
//! entry survives, which for a long-lived cache attached to short-lived objects
//! is a hidden leak. [`ReceiverHandle`] instead holds a [`Weak`] reference and
//! resolves it back to the live receiver when the computation actually runs.

use crate::CacheError;
use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// A reference to a method receiver that either owns it or not.
///
/// # Examples
///
/// ```
/// use lrumemo_core::ReceiverHandle;
/// use std::sync::Arc;
///
/// let service = Arc::new(vec![1, 2, 3]);
/// let handle = ReceiverHandle::weak(&service);
/// assert_eq!(handle.resolve().unwrap().len(), 3);
///
/// drop(service);
/// assert!(!handle.is_alive());
/// assert!(handle.resolve().is_err());
/// ```
pub struct ReceiverHandle<T> {
    binding: Binding<T>,
}

enum Binding<T> {
    Weak(Weak<T>),
    Strong(Arc<T>),
}

impl<T: Any + Send + Sync> ReceiverHandle<T> {
    /// Non-owning handle: never extends the receiver's lifetime.
    pub fn weak(receiver: &Arc<T>) -> Self {
        Self {
            binding: Binding::Weak(Arc::downgrade(receiver)),
        }
    }

    /// Owning handle: the receiver lives at least as long as the handle.
    pub fn strong(receiver: &Arc<T>) -> Self {
        Self {
            binding: Binding::Strong(Arc::clone(receiver)),
        }
    }

    pub fn bind(receiver: &Arc<T>, non_owning: bool) -> Self {
        if non_owning {
            Self::weak(receiver)
        } else {
            Self::strong(receiver)
        }
    }

    /// Resolves the handle to the live receiver.
    ///
    /// # Errors
    ///
    /// [`CacheError::ReceiverGone`] when a weak handle's receiver was dropped.
    pub fn resolve(&self) -> Result<Arc<T>, CacheError> {
        match &self.binding {
            Binding::Weak(weak) => weak.upgrade().ok_or(CacheError::ReceiverGone {
                type_name: type_name::<T>(),
            }),
            Binding::Strong(strong) => Ok(Arc::clone(strong)),
        }
    }

    pub fn is_alive(&self) -> bool {
        match &self.binding {
            Binding::Weak(weak) => weak.strong_count() > 0,
            Binding::Strong(_) => true,
        }
    }

    /// Identity of the receiver, suitable as cache key material.
    ///
    /// The id carries the same ownership as the handle: a weak handle yields
    /// an id that does not keep the receiver alive.
    pub fn id(&self) -> ReceiverId {
        match &self.binding {
            Binding::Weak(weak) => {
                let anchor: Weak<dyn Any + Send + Sync> = weak.clone();
                ReceiverId {
                    addr: weak.as_ptr() as *const () as usize,
                    anchor: Anchor::Weak(anchor),
                }
            }
            Binding::Strong(strong) => {
                let anchor: Arc<dyn Any + Send + Sync> = strong.clone();
                ReceiverId {
                    addr: Arc::as_ptr(strong) as *const () as usize,
                    anchor: Anchor::Strong(anchor),
                }
            }
        }
    }
}

impl<T> Clone for ReceiverHandle<T> {
    fn clone(&self) -> Self {
        let binding = match &self.binding {
            Binding::Weak(weak) => Binding::Weak(weak.clone()),
            Binding::Strong(strong) => Binding::Strong(Arc::clone(strong)),
        };
        Self { binding }
    }
}

impl<T> fmt::Debug for ReceiverHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.binding {
            Binding::Weak(_) => "weak",
            Binding::Strong(_) => "strong",
        };
        f.debug_struct("ReceiverHandle")
            .field("type", &type_name::<T>())
            .field("binding", &kind)
            .finish()
    }
}

/// Type-erased receiver identity stored inside cache keys.
///
/// Two ids are equal when they refer to the same allocation. The anchor keeps
/// that allocation reserved (a `Weak` pins the control block, not the value),
/// so its address cannot be handed to a different receiver while a key still
/// refers to it.
#[derive(Clone)]
pub struct ReceiverId {
    addr: usize,
    anchor: Anchor,
}

#[derive(Clone)]
enum Anchor {
    Weak(Weak<dyn Any + Send + Sync>),
    Strong(Arc<dyn Any + Send + Sync>),
}

impl ReceiverId {
    pub fn is_alive(&self) -> bool {
        match &self.anchor {
            Anchor::Weak(weak) => weak.strong_count() > 0,
            Anchor::Strong(_) => true,
        }
    }
}

impl PartialEq for ReceiverId {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for ReceiverId {}

impl Hash for ReceiverId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl fmt::Debug for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Receiver({:#x}", self.addr)?;
        if !self.is_alive() {
            f.write_str(", gone")?;
        }
        f.write_str(")")
    }
}

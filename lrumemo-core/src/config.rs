use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

/// Default bound used when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 128;

/// How many entries a cache may hold.
///
/// # Variants
///
/// * `Unbounded` - Entries are never evicted. Lookups do not track recency.
/// * `Disabled` - Nothing is stored; every call is a miss and recomputes.
/// * `Bounded(n)` - At most `n` entries, least recently used evicted first.
///
/// The serialized form is the classic `maxsize` value: `null` for unbounded,
/// `0` for disabled, any other integer for a bound.
///
/// # Examples
///
/// ```
/// use lrumemo_core::Capacity;
///
/// assert_eq!(Capacity::from(None), Capacity::Unbounded);
/// assert_eq!(Capacity::from(0), Capacity::Disabled);
/// assert_eq!(Capacity::from(2).bound(), Some(2));
/// assert_eq!(Capacity::default().bound(), Some(128));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<usize>", into = "Option<usize>")]
pub enum Capacity {
    Unbounded,
    Disabled,
    Bounded(NonZeroUsize),
}

impl Capacity {
    /// Returns the maximum number of entries, `None` when unbounded.
    pub fn bound(&self) -> Option<usize> {
        match self {
            Capacity::Unbounded => None,
            Capacity::Disabled => Some(0),
            Capacity::Bounded(n) => Some(n.get()),
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::from(DEFAULT_CAPACITY)
    }
}

impl From<usize> for Capacity {
    fn from(maxsize: usize) -> Self {
        match NonZeroUsize::new(maxsize) {
            Some(n) => Capacity::Bounded(n),
            None => Capacity::Disabled,
        }
    }
}

impl From<Option<usize>> for Capacity {
    fn from(maxsize: Option<usize>) -> Self {
        match maxsize {
            Some(n) => Capacity::from(n),
            None => Capacity::Unbounded,
        }
    }
}

impl From<Capacity> for Option<usize> {
    fn from(capacity: Capacity) -> Self {
        capacity.bound()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound() {
            Some(n) => write!(f, "{}", n),
            None => f.write_str("None"),
        }
    }
}

/// Construction options for a [`MemoCache`](crate::MemoCache).
///
/// All fields have defaults, so a partial document deserializes cleanly:
///
/// ```
/// use lrumemo_core::{CacheConfig, Capacity};
///
/// let config: CacheConfig = serde_json::from_str(r#"{ "capacity": 2 }"#).unwrap();
/// assert_eq!(config.capacity, Capacity::from(2));
/// assert!(!config.type_sensitive);
/// assert!(config.bind_receiver_non_owning);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry bound and eviction mode.
    pub capacity: Capacity,

    /// Distinguish arguments that compare equal but have different types
    /// (`1_i64` vs `1.0_f64`).
    pub type_sensitive: bool,

    /// Reference method receivers through a `Weak` handle instead of keeping
    /// them alive from inside the cache.
    pub bind_receiver_non_owning: bool,

    /// Identifier used in log events and in the named cache registry.
    pub name: Option<String>,
}

impl CacheConfig {
    pub fn new(capacity: impl Into<Capacity>) -> Self {
        Self {
            capacity: capacity.into(),
            ..Self::default()
        }
    }

    pub fn unbounded() -> Self {
        Self::new(Capacity::Unbounded)
    }

    pub fn with_capacity(mut self, capacity: impl Into<Capacity>) -> Self {
        self.capacity = capacity.into();
        self
    }

    pub fn type_sensitive(mut self, type_sensitive: bool) -> Self {
        self.type_sensitive = type_sensitive;
        self
    }

    pub fn bind_receiver_non_owning(mut self, non_owning: bool) -> Self {
        self.bind_receiver_non_owning = non_owning;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Capacity::default(),
            type_sensitive: false,
            bind_receiver_non_owning: true,
            name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_conversions() {
        assert_eq!(Capacity::from(None), Capacity::Unbounded);
        assert_eq!(Capacity::from(Some(0)), Capacity::Disabled);
        assert_eq!(Capacity::from(Some(5)).bound(), Some(5));
        assert_eq!(Capacity::Unbounded.bound(), None);
        assert_eq!(Capacity::Disabled.bound(), Some(0));
    }

    #[test]
    fn test_capacity_display() {
        assert_eq!(Capacity::Unbounded.to_string(), "None");
        assert_eq!(Capacity::Disabled.to_string(), "0");
        assert_eq!(Capacity::from(64).to_string(), "64");
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity.bound(), Some(DEFAULT_CAPACITY));
        assert!(!config.type_sensitive);
        assert!(config.bind_receiver_non_owning);
        assert_eq!(config.name, None);
    }

    #[test]
    fn test_builder_setters() {
        let config = CacheConfig::new(2)
            .type_sensitive(true)
            .bind_receiver_non_owning(false)
            .named("fetch_user");

        assert_eq!(config.capacity, Capacity::from(2));
        assert!(config.type_sensitive);
        assert!(!config.bind_receiver_non_owning);
        assert_eq!(config.name.as_deref(), Some("fetch_user"));

        let config = config.with_capacity(None);
        assert_eq!(config.capacity, Capacity::Unbounded);
        assert_eq!(CacheConfig::unbounded().capacity, Capacity::Unbounded);
    }

    #[test]
    fn test_serde_maxsize_representation() {
        let json = serde_json::to_string(&CacheConfig::unbounded()).unwrap();
        assert!(json.contains(r#""capacity":null"#));

        let config: CacheConfig =
            serde_json::from_str(r#"{ "capacity": 0, "type_sensitive": true }"#).unwrap();
        assert_eq!(config.capacity, Capacity::Disabled);
        assert!(config.type_sensitive);

        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CacheConfig::default());
    }
}

//! Recency-ordered storage with O(1) least-recently-used eviction.
//!
//! Bounded stores keep their entries in an arena of slots linked into a
//! circular doubly linked list. One slot is the root sentinel and never holds
//! an entry; the slot after the root is the least recently used entry and the
//! slot before it the most recently used one.
//!
//! When the store is full, insertion does not free or allocate anything: the
//! current root slot receives the new entry (which makes it the most recently
//! used, since it sits right before the next root) and the least recently used
//! slot is emptied and becomes the new root.
//!
//! ```text
//!        +---------------------------------------------+
//!        v                                             |
//!     [root] <-> [LRU] <-> ... <-> ... <-> [MRU] <-----+
//! ```

use crate::Capacity;
use std::collections::HashMap;
use std::hash::Hash;

type SlotIndex = usize;

/// Upper bound on the slots reserved when a ring is created; larger rings
/// grow as entries arrive.
const INITIAL_RESERVE: usize = 1024;

struct Slot<K, V> {
    prev: SlotIndex,
    next: SlotIndex,
    entry: Option<(K, V)>,
}

/// Arena-backed circular list plus key index for the bounded mode.
struct LruRing<K, V> {
    slots: Vec<Slot<K, V>>,
    map: HashMap<K, SlotIndex>,
    root: SlotIndex,
    capacity: usize,
    full: bool,
}

impl<K: Eq + Hash + Clone, V> LruRing<K, V> {
    fn new(capacity: usize) -> Self {
        let mut ring = Self {
            slots: Vec::with_capacity(capacity.min(INITIAL_RESERVE) + 1),
            map: HashMap::with_capacity(capacity.min(INITIAL_RESERVE)),
            root: 0,
            capacity,
            full: false,
        };
        ring.reset();
        ring
    }

    fn reset(&mut self) {
        self.slots.clear();
        self.slots.push(Slot {
            prev: 0,
            next: 0,
            entry: None,
        });
        self.root = 0;
        self.full = false;
    }

    fn unlink(&mut self, idx: SlotIndex) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
    }

    /// Links `idx` right before the root, i.e. as most recently used.
    fn link_last(&mut self, idx: SlotIndex) {
        let root = self.root;
        let last = self.slots[root].prev;
        self.slots[idx].prev = last;
        self.slots[idx].next = root;
        self.slots[last].next = idx;
        self.slots[root].prev = idx;
    }

    fn lookup(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.unlink(idx);
        self.link_last(idx);
        self.slots[idx].entry.as_ref().map(|(_, value)| value)
    }

    fn insert(&mut self, key: K, value: V) -> Insertion<K, V> {
        if self.map.contains_key(&key) {
            return Insertion::AlreadyPresent(value);
        }

        if self.full {
            // The old root takes the new entry; it already sits right before
            // the next root, so it is the most recently used slot.
            let old_root = self.root;
            self.slots[old_root].entry = Some((key.clone(), value));
            self.root = self.slots[old_root].next;
            let evicted = self.slots[self.root].entry.take();
            if let Some((old_key, _)) = &evicted {
                self.map.remove(old_key);
            }
            self.map.insert(key, old_root);
            return match evicted {
                Some((old_key, old_value)) => Insertion::Evicted(old_key, old_value),
                None => Insertion::Inserted,
            };
        }

        let idx = self.slots.len();
        self.slots.push(Slot {
            prev: idx,
            next: idx,
            entry: Some((key.clone(), value)),
        });
        self.link_last(idx);
        self.map.insert(key, idx);
        self.full = self.map.len() >= self.capacity;
        Insertion::Inserted
    }

    /// Walks the ring from the least to the most recently used entry.
    fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let mut cursor = self.slots[self.root].next;
        std::iter::from_fn(move || {
            if cursor == self.root {
                return None;
            }
            let slot = &self.slots[cursor];
            cursor = slot.next;
            slot.entry.as_ref().map(|(key, value)| (key, value))
        })
    }

    /// Rebuilds the ring from the entries `keep` accepts, preserving their
    /// recency order, and returns the rest.
    fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> Vec<(K, V)> {
        let mut order = Vec::with_capacity(self.map.len());
        let mut cursor = self.slots[self.root].next;
        while cursor != self.root {
            order.push(cursor);
            cursor = self.slots[cursor].next;
        }
        let entries: Vec<(K, V)> = order
            .into_iter()
            .filter_map(|idx| self.slots[idx].entry.take())
            .collect();

        self.map.clear();
        self.reset();

        let mut removed = Vec::new();
        for (key, value) in entries {
            if keep(&key, &value) {
                self.insert(key, value);
            } else {
                removed.push((key, value));
            }
        }
        removed
    }

    fn take_all(&mut self) -> Vec<(K, V)> {
        self.map.clear();
        let drained = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.entry.take())
            .collect();
        self.reset();
        drained
    }
}

enum Storage<K, V> {
    Disabled,
    Unbounded(HashMap<K, V>),
    Bounded(LruRing<K, V>),
}

/// Outcome of [`RecencyStore::insert_or_replace`].
///
/// Values handed back here are owned by the caller, so they can be dropped
/// after any lock protecting the store has been released.
#[derive(Debug, PartialEq, Eq)]
pub enum Insertion<K, V> {
    /// The entry was stored without displacing anything.
    Inserted,
    /// The entry was stored and the least recently used one was evicted.
    Evicted(K, V),
    /// An unbounded store overwrote an existing value for the same key.
    Replaced(V),
    /// A bounded store already holds this key; nothing changed and the
    /// offered value is returned unused.
    AlreadyPresent(V),
    /// The store has zero capacity; the offered value is returned unused.
    Discarded(V),
}

/// Map from key to value that remembers the recency of each entry.
///
/// # Examples
///
/// ```
/// use lrumemo_core::{Capacity, RecencyStore};
///
/// let mut store = RecencyStore::new(Capacity::from(2));
/// store.insert_or_replace("a", 1);
/// store.insert_or_replace("b", 2);
///
/// // Touch "a" so that "b" becomes the least recently used entry.
/// assert_eq!(store.lookup(&"a"), Some(&1));
/// store.insert_or_replace("c", 3);
///
/// assert!(!store.contains(&"b"));
/// assert_eq!(store.keys(), vec![&"a", &"c"]);
/// ```
pub struct RecencyStore<K, V> {
    capacity: Capacity,
    storage: Storage<K, V>,
}

impl<K: Eq + Hash + Clone, V> RecencyStore<K, V> {
    pub fn new(capacity: Capacity) -> Self {
        let storage = match capacity {
            Capacity::Disabled => Storage::Disabled,
            Capacity::Unbounded => Storage::Unbounded(HashMap::new()),
            Capacity::Bounded(n) => Storage::Bounded(LruRing::new(n.get())),
        };
        Self { capacity, storage }
    }

    /// Returns the value for `key`, promoting it to most recently used.
    ///
    /// Unbounded stores keep no recency order, so nothing moves there.
    pub fn lookup(&mut self, key: &K) -> Option<&V> {
        match &mut self.storage {
            Storage::Disabled => None,
            Storage::Unbounded(map) => map.get(key),
            Storage::Bounded(ring) => ring.lookup(key),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// - Disabled stores never keep anything.
    /// - Unbounded stores insert unconditionally; the last writer wins.
    /// - Bounded stores leave an existing entry for `key` untouched (the first
    ///   writer wins) and otherwise evict the least recently used entry once
    ///   full.
    pub fn insert_or_replace(&mut self, key: K, value: V) -> Insertion<K, V> {
        match &mut self.storage {
            Storage::Disabled => Insertion::Discarded(value),
            Storage::Unbounded(map) => match map.insert(key, value) {
                Some(previous) => Insertion::Replaced(previous),
                None => Insertion::Inserted,
            },
            Storage::Bounded(ring) => ring.insert(key, value),
        }
    }

    /// Checks for `key` without touching its recency.
    pub fn contains(&self, key: &K) -> bool {
        match &self.storage {
            Storage::Disabled => false,
            Storage::Unbounded(map) => map.contains_key(key),
            Storage::Bounded(ring) => ring.map.contains_key(key),
        }
    }

    /// Removes every entry and hands them back to the caller.
    pub fn clear(&mut self) -> Vec<(K, V)> {
        match &mut self.storage {
            Storage::Disabled => Vec::new(),
            Storage::Unbounded(map) => map.drain().collect(),
            Storage::Bounded(ring) => ring.take_all(),
        }
    }

    /// Removes the entries `keep` rejects and hands them back to the caller.
    /// Surviving entries keep their recency order.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> Vec<(K, V)> {
        match &mut self.storage {
            Storage::Disabled => Vec::new(),
            Storage::Unbounded(map) => {
                let rejected: Vec<K> = map
                    .iter()
                    .filter(|&(key, value)| !keep(key, value))
                    .map(|(key, _)| key.clone())
                    .collect();
                rejected
                    .into_iter()
                    .filter_map(|key| map.remove_entry(&key))
                    .collect()
            }
            Storage::Bounded(ring) => ring.retain(keep),
        }
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Disabled => 0,
            Storage::Unbounded(map) => map.len(),
            Storage::Bounded(ring) => ring.map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Keys from least to most recently used.
    ///
    /// Unbounded stores have no recency order and list keys in map order.
    pub fn keys(&self) -> Vec<&K> {
        match &self.storage {
            Storage::Disabled => Vec::new(),
            Storage::Unbounded(map) => map.keys().collect(),
            Storage::Bounded(ring) => ring.iter().map(|(key, _)| key).collect(),
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        if let Storage::Bounded(ring) = &self.storage {
            assert!(ring.slots[ring.root].entry.is_none(), "root holds an entry");
            assert!(ring.map.len() <= ring.capacity, "size exceeds capacity");
            assert_eq!(ring.full, ring.map.len() >= ring.capacity);

            let walked: Vec<&K> = ring.iter().map(|(key, _)| key).collect();
            assert_eq!(walked.len(), ring.map.len(), "list and map sizes differ");
            for key in walked {
                let idx = ring.map[key];
                assert_eq!(ring.slots[ring.slots[idx].prev].next, idx);
                assert_eq!(ring.slots[ring.slots[idx].next].prev, idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded(n: usize) -> RecencyStore<u32, String> {
        RecencyStore::new(Capacity::from(n))
    }

    fn fill(store: &mut RecencyStore<u32, String>, keys: &[u32]) {
        for &k in keys {
            store.insert_or_replace(k, format!("v{}", k));
        }
    }

    #[test]
    fn test_bounded_evicts_least_recently_used() {
        let mut store = bounded(3);
        fill(&mut store, &[1, 2, 3]);
        store.check_invariants();

        let outcome = store.insert_or_replace(4, "v4".to_string());
        assert_eq!(outcome, Insertion::Evicted(1, "v1".to_string()));
        assert_eq!(store.keys(), vec![&2, &3, &4]);
        assert_eq!(store.len(), 3);
        store.check_invariants();
    }

    #[test]
    fn test_lookup_promotes_entry() {
        let mut store = bounded(2);
        fill(&mut store, &[1, 2]);

        assert_eq!(store.lookup(&1).map(String::as_str), Some("v1"));
        assert_eq!(store.keys(), vec![&2, &1]);

        store.insert_or_replace(3, "v3".to_string());
        assert!(store.contains(&1));
        assert!(!store.contains(&2));
        assert_eq!(store.keys(), vec![&1, &3]);
        store.check_invariants();
    }

    #[test]
    fn test_many_evictions_reuse_slots() {
        let mut store = bounded(4);
        fill(&mut store, &(0..100).collect::<Vec<_>>());
        store.check_invariants();

        assert_eq!(store.keys(), vec![&96, &97, &98, &99]);
        if let Storage::Bounded(ring) = &store.storage {
            assert_eq!(ring.slots.len(), 5);
        }
    }

    #[test]
    fn test_existing_key_is_left_untouched() {
        let mut store = bounded(2);
        fill(&mut store, &[1, 2]);

        let outcome = store.insert_or_replace(1, "late".to_string());
        assert_eq!(outcome, Insertion::AlreadyPresent("late".to_string()));
        assert_eq!(store.lookup(&1).map(String::as_str), Some("v1"));
        assert_eq!(store.len(), 2);
        store.check_invariants();
    }

    #[test]
    fn test_capacity_one() {
        let mut store = bounded(1);
        fill(&mut store, &[1]);
        assert_eq!(
            store.insert_or_replace(2, "v2".to_string()),
            Insertion::Evicted(1, "v1".to_string())
        );
        assert_eq!(store.keys(), vec![&2]);
        assert_eq!(store.lookup(&2).map(String::as_str), Some("v2"));
        store.check_invariants();
    }

    #[test]
    fn test_clear_resets_ring() {
        let mut store = bounded(2);
        fill(&mut store, &[1, 2, 3]);

        let drained = store.clear();
        assert_eq!(drained.len(), 2);
        assert!(store.is_empty());
        assert!(store.keys().is_empty());
        store.check_invariants();

        fill(&mut store, &[4, 5, 6]);
        assert_eq!(store.keys(), vec![&5, &6]);
        store.check_invariants();
    }

    #[test]
    fn test_retain_keeps_recency_order() {
        let mut store = bounded(4);
        fill(&mut store, &[1, 2, 3, 4]);
        store.lookup(&1);

        let removed = store.retain(|key, _| key % 2 == 1);
        assert_eq!(removed.len(), 2);
        assert_eq!(store.keys(), vec![&3, &1]);
        store.check_invariants();

        // The freed room is usable before anything is evicted.
        fill(&mut store, &[5, 6]);
        assert_eq!(store.keys(), vec![&3, &1, &5, &6]);
        let outcome = store.insert_or_replace(7, "v7".to_string());
        assert_eq!(outcome, Insertion::Evicted(3, "v3".to_string()));
        store.check_invariants();
    }

    #[test]
    fn test_retain_unbounded() {
        let mut store: RecencyStore<u32, String> = RecencyStore::new(Capacity::Unbounded);
        fill(&mut store, &[1, 2, 3]);
        let removed = store.retain(|key, _| *key != 2);
        assert_eq!(removed, vec![(2, "v2".to_string())]);
        assert_eq!(store.len(), 2);
        assert!(!store.contains(&2));
    }

    #[test]
    fn test_huge_bound_reserves_lazily() {
        let mut store = bounded(usize::MAX);
        fill(&mut store, &[1, 2, 3]);
        assert_eq!(store.lookup(&2).map(String::as_str), Some("v2"));
        assert_eq!(store.keys(), vec![&1, &3, &2]);
        assert_eq!(store.capacity(), Capacity::from(usize::MAX));
        store.check_invariants();

        let mut store = bounded(1 << 36);
        fill(&mut store, &(0..2000).collect::<Vec<_>>());
        assert_eq!(store.len(), 2000);
        store.check_invariants();
    }

    #[test]
    fn test_unbounded_last_writer_wins() {
        let mut store: RecencyStore<u32, &str> = RecencyStore::new(Capacity::Unbounded);
        for k in 0..1000 {
            assert_eq!(store.insert_or_replace(k, "first"), Insertion::Inserted);
        }
        assert_eq!(store.len(), 1000);

        assert_eq!(store.insert_or_replace(7, "second"), Insertion::Replaced("first"));
        assert_eq!(store.lookup(&7), Some(&"second"));
        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_disabled_stores_nothing() {
        let mut store: RecencyStore<u32, u32> = RecencyStore::new(Capacity::Disabled);
        assert_eq!(store.insert_or_replace(1, 10), Insertion::Discarded(10));
        assert_eq!(store.lookup(&1), None);
        assert!(store.is_empty());
        assert!(store.clear().is_empty());
        assert_eq!(store.capacity(), Capacity::Disabled);
    }

    #[test]
    fn test_randomized_against_model() {
        let capacity = 8;
        let mut store = bounded(capacity);
        let mut model: Vec<u32> = Vec::new();
        let mut rng = fastrand::Rng::with_seed(42);

        for _ in 0..2000 {
            let key = rng.u32(..20);
            if rng.u8(..3) == 0 {
                let hit = store.lookup(&key).is_some();
                assert_eq!(hit, model.contains(&key));
                if hit {
                    model.retain(|k| *k != key);
                    model.push(key);
                }
            } else if !model.contains(&key) {
                store.insert_or_replace(key, format!("v{}", key));
                if model.len() == capacity {
                    model.remove(0);
                }
                model.push(key);
            }
            assert_eq!(store.keys(), model.iter().collect::<Vec<_>>());
        }
        store.check_invariants();
    }
}

//! # LRU Response Cache
//!
//! Bounded memoization of scan reports keyed by the exact request text.
//!
//! ## Design
//!
//! Entries live in a slab (`Vec<Node>`) threaded by a doubly linked list of
//! slot indices, least recently used at the head and most recently used at
//! the tail. A `HashMap<key, slot>` finds a node in `O(1)`; moving it to the
//! tail and popping the head are pointer swaps, so `get` and `set` are
//! `O(1)` expected.
//!
//! ```text
//!   index: HashMap<key, slot>
//!   slots: [ a | b | c ]          head -> a <-> b <-> c <- tail
//!
//!   get("b")                      set("d") at capacity 3
//!   head -> a <-> c <-> b         head -> c <-> b <-> d
//!                                 ("a" evicted, its slot reused for "d")
//! ```
//!
//! The slab never grows past `capacity`: once full, the evicted head's slot
//! is rewritten in place. Entries never touched after insertion keep their
//! insertion order along the list and are evicted in that order.
//!
//! ## Security Notes
//!
//! - The key is the raw prompt. Two prompts differing by one byte are
//!   different keys; no normalisation happens here.
//! - Capacity is a hard bound. `len() <= capacity()` holds after every call.
//! - Callers only ever receive clones. A cached report cannot be mutated in
//!   place by whoever read it.

use std::collections::HashMap;
use std::mem;

use tracing::debug;

use crate::error::{CacheError, Result};

/// Default number of entries.
pub const DEFAULT_CAPACITY: usize = 100;

/// Snapshot of cache activity since creation (or the last [`ResponseCache::clear`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
}

#[derive(Debug)]
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Least-recently-used cache from request text to a value.
///
/// # Thread Safety
///
/// `ResponseCache` is not thread-safe by itself; `get` mutates recency.
/// Share it behind a `Mutex`.
///
/// # Example
///
/// ```rust
/// use vigil_cache::ResponseCache;
///
/// let mut cache = ResponseCache::new(2).unwrap();
/// cache.set("a", 1);
/// cache.set("b", 2);
/// cache.get("a");      // "a" is now the most recent
/// cache.set("c", 3);   // evicts "b"
///
/// assert!(cache.contains("a"));
/// assert!(!cache.contains("b"));
/// assert_eq!(cache.len(), 2);
/// ```
#[derive(Debug)]
pub struct ResponseCache<V> {
    capacity: usize,
    index: HashMap<String, usize>,
    slots: Vec<Node<V>>,
    head: Option<usize>,
    tail: Option<usize>,
    stats: CacheStats,
}

impl<V: Clone> ResponseCache<V> {
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// [`CacheError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            stats: CacheStats::default(),
        })
    }

    /// Maximum number of entries.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the cache is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Activity counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns true if `key` is cached. Does not touch recency or counters.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Returns a copy of the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let Some(&slot) = self.index.get(key) else {
            self.stats.misses += 1;
            return None;
        };

        self.touch(slot);
        self.stats.hits += 1;
        Some(self.slots[slot].value.clone())
    }

    /// Stores `value` under `key` as the most recently used entry.
    ///
    /// Replacing an existing key never evicts. Inserting a new key into a
    /// full cache evicts the least recently used entry first.
    ///
    /// # Returns
    ///
    /// The key that was evicted, if any.
    pub fn set(&mut self, key: impl Into<String>, value: V) -> Option<String> {
        let key = key.into();

        if let Some(&slot) = self.index.get(&key) {
            self.slots[slot].value = value;
            self.touch(slot);
            return None;
        }

        match self.head {
            Some(lru) if self.slots.len() >= self.capacity => {
                self.unlink(lru);
                let node = &mut self.slots[lru];
                let evicted = mem::replace(&mut node.key, key.clone());
                node.value = value;
                self.index.remove(&evicted);
                self.index.insert(key, lru);
                self.push_back(lru);
                self.stats.evictions += 1;
                debug!("Evicted least recently used cache entry");
                Some(evicted)
            }
            _ => {
                let slot = self.slots.len();
                self.slots.push(Node {
                    key: key.clone(),
                    value,
                    prev: None,
                    next: None,
                });
                self.index.insert(key, slot);
                self.push_back(slot);
                None
            }
        }
    }

    /// Removes every entry and resets the counters.
    pub fn clear(&mut self) {
        let dropped = self.index.len();
        self.index.clear();
        self.slots.clear();
        self.head = None;
        self.tail = None;
        self.stats = CacheStats::default();
        debug!("Cleared response cache ({} entries)", dropped);
    }

    fn touch(&mut self, slot: usize) {
        if self.tail != Some(slot) {
            self.unlink(slot);
            self.push_back(slot);
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[slot].prev = None;
        self.slots[slot].next = None;
    }

    fn push_back(&mut self, slot: usize) {
        self.slots[slot].prev = self.tail;
        self.slots[slot].next = None;
        match self.tail {
            Some(t) => self.slots[t].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }
}

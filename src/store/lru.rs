//! # Bounded LRU statement store
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                         LruStore<V>                              │
//!   │                                                                  │
//!   │   ┌──────────────────────────────────────────────────────────┐   │
//!   │   │                 Mutex<LruCore<V>>                        │   │
//!   │   │                                                          │   │
//!   │   │   FxHashMap<String, NonNull<Node<V>>>                    │   │
//!   │   │                                                          │   │
//!   │   │   head ──► [q1] ◄──► [q2] ◄──► [q3] ◄── tail             │   │
//!   │   │            MRU                  LRU                      │   │
//!   │   └──────────────────────────────────────────────────────────┘   │
//!   │                                                                  │
//!   │   eviction listener (called after the mutex is released)         │
//!   │   eviction counter                                               │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation, including `get`, takes the one mutex: a hit moves the
//! entry to the MRU position, so there is no read-only fast path.
//!
//! `get_or_try_insert_with` performs lookup, factory call and insert inside
//! one critical section. Two callers missing on the same query can never
//! both run the factory.
//!
//! ## Capacity
//!
//! | Operation          | Effect                                              |
//! |--------------------|-----------------------------------------------------|
//! | `new(0)`           | normalized to [`DEFAULT_CAPACITY`]                  |
//! | `set_capacity(n)`  | recorded; applied at the next insert                |
//! | `put` over limit   | evicts from the LRU end until `len <= capacity`     |
//!
//! Shrinking the capacity does not evict on its own. The next insert evicts
//! as many entries as needed.
//!
//! ## Shared values
//!
//! Values are held as `Arc<V>`. Evicting an entry drops only the store's
//! reference; callers holding a clone keep the value alive, and whatever
//! `V::drop` does (closing a prepared statement, say) happens when the last
//! holder lets go.
//!
//! ## Thread Safety
//!
//! - `LruCore`: **not** thread-safe on its own.
//! - `LruStore`: `Send + Sync` via `parking_lot::Mutex`.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::InvariantError;
use crate::traits::StatementStore;

/// Capacity used when a non-positive capacity is requested.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Callback invoked with each entry the store evicts.
pub type EvictionListener<V> = Arc<dyn Fn(&str, &Arc<V>) + Send + Sync>;

#[inline]
fn normalize_capacity(capacity: usize) -> usize {
    if capacity == 0 {
        DEFAULT_CAPACITY
    } else {
        capacity
    }
}

#[repr(C)]
struct Node<V> {
    prev: Option<NonNull<Node<V>>>,
    next: Option<NonNull<Node<V>>>,
    key: String,
    value: Arc<V>,
}

/// Single-threaded LRU core: hash index plus an intrusive recency list.
///
/// All operations are O(1) except [`recency`](LruCore::recency) and
/// [`check_invariants`](LruCore::check_invariants).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stmtkit::store::lru::LruCore;
///
/// let mut core: LruCore<&str> = LruCore::new(2);
/// core.put("a".to_string(), Arc::new("A"));
/// core.put("b".to_string(), Arc::new("B"));
/// core.get("a");
///
/// // "b" is now least recently used.
/// let evicted = core.put("c".to_string(), Arc::new("C")).evicted;
/// assert_eq!(evicted[0].0, "b");
/// ```
pub struct LruCore<V> {
    map: FxHashMap<String, NonNull<Node<V>>>,
    head: Option<NonNull<Node<V>>>,
    tail: Option<NonNull<Node<V>>>,
    capacity: usize,
}

// SAFETY: the raw pointers only reference heap nodes owned by the core.
unsafe impl<V: Send + Sync> Send for LruCore<V> {}
// SAFETY: shared access only reads through the pointers.
unsafe impl<V: Send + Sync> Sync for LruCore<V> {}

/// Outcome of [`LruCore::put`].
#[derive(Debug)]
pub struct PutOutcome<V> {
    /// Previous value for the key, when the put replaced an entry.
    pub replaced: Option<Arc<V>>,
    /// Entries evicted to get back under capacity, least recent first.
    pub evicted: Vec<(String, Arc<V>)>,
}

impl<V> LruCore<V> {
    /// Creates an empty core. A capacity of 0 becomes [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = normalize_capacity(capacity);
        Self {
            map: FxHashMap::with_capacity_and_hasher(
                capacity.min(DEFAULT_CAPACITY),
                Default::default(),
            ),
            head: None,
            tail: None,
            capacity,
        }
    }

    /// Number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no entries are resident.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Current capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sets the capacity used by the next eviction decision.
    ///
    /// A capacity of 0 becomes [`DEFAULT_CAPACITY`]. Nothing is evicted here.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = normalize_capacity(capacity);
    }

    /// Returns `true` if `query` is resident. Does not touch recency.
    #[inline]
    pub fn contains(&self, query: &str) -> bool {
        self.map.contains_key(query)
    }

    /// Looks up `query` and marks it most recently used.
    pub fn get(&mut self, query: &str) -> Option<&Arc<V>> {
        let node_ptr = *self.map.get(query)?;
        self.detach(node_ptr);
        self.attach_front(node_ptr);
        // SAFETY: node_ptr is valid as long as it's in the map
        Some(unsafe { &(*node_ptr.as_ptr()).value })
    }

    /// Looks up `query` without touching recency.
    pub fn peek(&self, query: &str) -> Option<&Arc<V>> {
        // SAFETY: node_ptr is valid as long as it's in the map
        self.map
            .get(query)
            .map(|node_ptr| unsafe { &(*node_ptr.as_ptr()).value })
    }

    /// Inserts or replaces `query`, marks it most recently used, then evicts
    /// from the LRU end until the core is back within capacity.
    pub fn put(&mut self, query: String, value: Arc<V>) -> PutOutcome<V> {
        let replaced = match self.map.get(query.as_str()) {
            Some(&node_ptr) => {
                // SAFETY: node_ptr is valid as long as it's in the map
                let previous =
                    unsafe { std::mem::replace(&mut (*node_ptr.as_ptr()).value, value) };
                self.detach(node_ptr);
                self.attach_front(node_ptr);
                Some(previous)
            },
            None => {
                let node = Box::new(Node {
                    prev: None,
                    next: None,
                    key: query.clone(),
                    value,
                });
                let node_ptr = NonNull::from(Box::leak(node));
                self.map.insert(query, node_ptr);
                self.attach_front(node_ptr);
                None
            },
        };

        let mut evicted = Vec::new();
        // The entry just put sits at the head, so it is never evicted here
        // while capacity >= 1.
        while self.map.len() > self.capacity {
            match self.pop_lru() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }

        #[cfg(debug_assertions)]
        self.debug_validate();

        PutOutcome { replaced, evicted }
    }

    /// Removes `query`, returning its value.
    pub fn remove(&mut self, query: &str) -> Option<Arc<V>> {
        let node_ptr = self.map.remove(query)?;
        self.detach(node_ptr);
        // SAFETY: the node was unlinked from both map and list; we own it.
        let node = unsafe { Box::from_raw(node_ptr.as_ptr()) };
        Some(node.value)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(String, Arc<V>)> {
        let tail_ptr = self.tail?;
        self.detach(tail_ptr);
        // SAFETY: tail was a live node; it is now unlinked and owned here.
        let node = unsafe { Box::from_raw(tail_ptr.as_ptr()) };
        self.map.remove(node.key.as_str());
        Some((node.key, node.value))
    }

    /// Returns the least recently used entry without removing it.
    pub fn peek_lru(&self) -> Option<(&str, &Arc<V>)> {
        // SAFETY: tail, when set, points at a live node owned by the core.
        self.tail.map(|tail_ptr| unsafe {
            let node = tail_ptr.as_ref();
            (node.key.as_str(), &node.value)
        })
    }

    /// Position of `query` in recency order (0 = most recent). O(n).
    pub fn recency(&self, query: &str) -> Option<usize> {
        let &target = self.map.get(query)?;
        let mut rank = 0usize;
        let mut current = self.head;
        while let Some(ptr) = current {
            if ptr == target {
                return Some(rank);
            }
            rank += 1;
            // SAFETY: every pointer reachable from head is a live node.
            current = unsafe { ptr.as_ref().next };
        }
        None
    }

    /// Queries from most to least recently used.
    pub fn queries(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.map.len());
        let mut current = self.head;
        while let Some(ptr) = current {
            // SAFETY: every pointer reachable from head is a live node.
            unsafe {
                let node = ptr.as_ref();
                out.push(node.key.as_str());
                current = node.next;
            }
        }
        out
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        while self.pop_lru().is_some() {}
    }

    /// Walks the recency list and checks it against the index.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.map.is_empty() {
            if self.head.is_some() || self.tail.is_some() {
                return Err(InvariantError::new("empty index but non-empty list"));
            }
            return Ok(());
        }

        let mut count = 0usize;
        let mut prev: Option<NonNull<Node<V>>> = None;
        let mut current = self.head;
        while let Some(ptr) = current {
            count += 1;
            if count > self.map.len() {
                return Err(InvariantError::new(format!(
                    "recency list longer than index ({} entries)",
                    self.map.len()
                )));
            }
            // SAFETY: the walk is bounded by the index length, and every
            // pointer reachable from head is a live node.
            let node = unsafe { ptr.as_ref() };
            if node.prev != prev {
                return Err(InvariantError::new(format!(
                    "broken back link at {:?}",
                    node.key
                )));
            }
            if self.map.get(node.key.as_str()) != Some(&ptr) {
                return Err(InvariantError::new(format!(
                    "list node {:?} not indexed",
                    node.key
                )));
            }
            prev = current;
            current = node.next;
        }

        if prev != self.tail {
            return Err(InvariantError::new("tail does not match last list node"));
        }
        if count != self.map.len() {
            return Err(InvariantError::new(format!(
                "list has {} nodes, index has {}",
                count,
                self.map.len()
            )));
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn debug_validate(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("LruCore invariant violated: {err}");
        }
    }

    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<V>>) {
        // SAFETY: node_ptr and its neighbours are live nodes linked into
        // this core's list; `&mut self` gives exclusive access to them.
        unsafe {
            let node = node_ptr.as_ptr();
            let prev = (*node).prev;
            let next = (*node).next;

            match prev {
                Some(prev_ptr) => (*prev_ptr.as_ptr()).next = next,
                None => self.head = next,
            }

            match next {
                Some(next_ptr) => (*next_ptr.as_ptr()).prev = prev,
                None => self.tail = prev,
            }

            (*node).prev = None;
            (*node).next = None;
        }
    }

    #[inline(always)]
    fn attach_front(&mut self, node_ptr: NonNull<Node<V>>) {
        // SAFETY: node_ptr is a live, unlinked node and head (if any) is a
        // live node; `&mut self` gives exclusive access to both.
        unsafe {
            let node = node_ptr.as_ptr();
            (*node).prev = None;
            (*node).next = self.head;

            match self.head {
                Some(head_ptr) => (*head_ptr.as_ptr()).prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }
}

impl<V> Drop for LruCore<V> {
    fn drop(&mut self) {
        let mut current = self.head;
        while let Some(node_ptr) = current {
            // SAFETY: each node was leaked from a Box in `put` and is freed
            // exactly once here; the index is dropped without touching them.
            unsafe {
                let node = Box::from_raw(node_ptr.as_ptr());
                current = node.next;
            }
        }
    }
}

impl<V> fmt::Debug for LruCore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCore")
            .field("len", &self.map.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Bounded, thread-safe statement store with least-recently-used eviction.
///
/// # Example
///
/// ```
/// use stmtkit::store::lru::LruStore;
/// use stmtkit::traits::StatementStore;
///
/// let store: LruStore<u32> = LruStore::new(2);
/// store.get_or_try_insert_with("a", |_| Ok::<_, ()>(1)).unwrap();
/// store.get_or_try_insert_with("b", |_| Ok::<_, ()>(2)).unwrap();
/// store.get("a");
/// store.get_or_try_insert_with("c", |_| Ok::<_, ()>(3)).unwrap();
///
/// assert!(store.contains("a"));
/// assert!(!store.contains("b"));
/// assert_eq!(store.evictions(), 1);
/// ```
pub struct LruStore<V> {
    core: Mutex<LruCore<V>>,
    listener: Option<EvictionListener<V>>,
    evictions: AtomicU64,
}

impl<V> LruStore<V> {
    /// Creates an empty store. A capacity of 0 becomes [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        Self {
            core: Mutex::new(LruCore::new(capacity)),
            listener: None,
            evictions: AtomicU64::new(0),
        }
    }

    /// Creates an empty store that reports each eviction to `listener`.
    ///
    /// The listener runs after the store's mutex has been released, so it
    /// may call back into the store.
    pub fn with_listener<F>(capacity: usize, listener: F) -> Self
    where
        F: Fn(&str, &Arc<V>) + Send + Sync + 'static,
    {
        Self {
            listener: Some(Arc::new(listener)),
            ..Self::new(capacity)
        }
    }

    /// Inserts or replaces `query`, returning the replaced value.
    pub fn put(&self, query: &str, value: Arc<V>) -> Option<Arc<V>> {
        let outcome = self.core.lock().put(query.to_owned(), value);
        self.notify(outcome.evicted);
        outcome.replaced
    }

    /// Looks up `query` without touching recency.
    pub fn peek(&self, query: &str) -> Option<Arc<V>> {
        self.core.lock().peek(query).cloned()
    }

    /// Returns `true` if `query` is resident. Does not touch recency.
    pub fn contains(&self, query: &str) -> bool {
        self.core.lock().contains(query)
    }

    /// Removes `query`, returning its value. Not reported as an eviction.
    pub fn remove(&self, query: &str) -> Option<Arc<V>> {
        self.core.lock().remove(query)
    }

    /// Sets the capacity applied at the next insert.
    ///
    /// A capacity of 0 becomes [`DEFAULT_CAPACITY`].
    pub fn set_capacity(&self, capacity: usize) {
        self.core.lock().set_capacity(capacity);
    }

    /// Total entries evicted over the store's lifetime.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Resident queries from most to least recently used.
    pub fn queries(&self) -> Vec<String> {
        self.core
            .lock()
            .queries()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    /// Checks the core's list/index consistency.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.core.lock().check_invariants()
    }

    // Evicted values are dropped here, outside the mutex.
    fn notify(&self, evicted: Vec<(String, Arc<V>)>) {
        if evicted.is_empty() {
            return;
        }
        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        for (query, value) in evicted {
            tracing::debug!(query = %query, "evicted statement");
            if let Some(listener) = &self.listener {
                listener(&query, &value);
            }
        }
    }
}

impl<V> StatementStore<V> for LruStore<V>
where
    V: Send + Sync,
{
    fn get(&self, query: &str) -> Option<Arc<V>> {
        self.core.lock().get(query).cloned()
    }

    fn get_or_try_insert_with<E, F>(&self, query: &str, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&str) -> Result<V, E>,
    {
        let (value, evicted) = {
            let mut core = self.core.lock();
            if let Some(value) = core.get(query) {
                return Ok(Arc::clone(value));
            }
            let value = Arc::new(factory(query)?);
            let outcome = core.put(query.to_owned(), Arc::clone(&value));
            (value, outcome.evicted)
        };
        self.notify(evicted);
        Ok(value)
    }

    fn len(&self) -> usize {
        self.core.lock().len()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.core.lock().capacity())
    }

    fn clear(&self) {
        // Swap the entries out so their values drop after the lock.
        let drained = {
            let mut core = self.core.lock();
            let capacity = core.capacity();
            std::mem::replace(&mut *core, LruCore::new(capacity))
        };
        drop(drained);
    }
}

impl<V> fmt::Debug for LruStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("LruStore")
            .field("len", &core.len())
            .field("capacity", &core.capacity())
            .field("evictions", &self.evictions())
            .finish()
    }
}

//! Copy-on-write snapshot store with lock-free reads.
//!
//! ## Architecture
//!
//! ```text
//!   readers (any number)                       writers (one at a time)
//!        │                                            │
//!        │ load()                                     │ lock writer mutex
//!        │                                            │ re-check current map
//!        ▼                                            │ factory(query)
//!   ┌──────────────────────────────┐                  │ clone map + new entry
//!   │   ArcSwap<FxHashMap<..>>     │ ◄──── store() ───┘
//!   └──────────────┬───────────────┘
//!                  │ old map dropped when its last reader
//!                  ▼ guard or Snapshot goes away
//!   ┌──────────────────────────────┐
//!   │ immutable map: query → Arc<V>│
//!   └──────────────────────────────┘
//! ```
//!
//! A published map is never mutated. Every insert builds a full copy, so
//! inserts cost O(n) while lookups never block. Use this store when the set
//! of distinct queries is small and stable, which is the usual shape of
//! prepared statements issued by fixed application code.
//!
//! Replaced maps are freed on the thread that releases the last reference
//! to them. Once the store is dropped and no [`Snapshot`] is outstanding,
//! every value it ever held has been dropped.
//!
//! There is no eviction: the store grows with every distinct query.
//!
//! ## Example Usage
//!
//! ```
//! use stmtkit::store::snapshot::SnapshotStore;
//! use stmtkit::traits::StatementStore;
//!
//! let store: SnapshotStore<u64> = SnapshotStore::new();
//! let before = store.snapshot();
//!
//! let v = store
//!     .get_or_try_insert_with("SELECT 1", |_| Ok::<_, ()>(1))
//!     .unwrap();
//! assert_eq!(*v, 1);
//!
//! // Older snapshots are unaffected by later inserts.
//! assert!(!before.contains("SELECT 1"));
//! assert!(store.snapshot().contains("SELECT 1"));
//! ```

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::traits::StatementStore;

type Map<V> = FxHashMap<String, Arc<V>>;

/// Owned, immutable view of a snapshot store's map at one point in time.
///
/// Holding a `Snapshot` keeps that exact map alive; later inserts publish a
/// new map and never show up here.
pub struct Snapshot<V> {
    map: Arc<Map<V>>,
}

impl<V> Snapshot<V> {
    /// Returns the value recorded for `query` in this snapshot.
    pub fn get(&self, query: &str) -> Option<&Arc<V>> {
        self.map.get(query)
    }

    /// Returns `true` if this snapshot has an entry for `query`.
    pub fn contains(&self, query: &str) -> bool {
        self.map.contains_key(query)
    }

    /// Number of entries in this snapshot.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if this snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the queries in this snapshot, in no particular order.
    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Returns `true` if both snapshots refer to the same published map.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.map, &b.map)
    }
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
        }
    }
}

impl<V> fmt::Debug for Snapshot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Unbounded statement store with lock-free reads and copy-on-write inserts.
pub struct SnapshotStore<V> {
    current: ArcSwap<Map<V>>,
    // Serializes writers only; readers never touch it.
    writer: Mutex<()>,
}

impl<V> SnapshotStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Map::default()),
            writer: Mutex::new(()),
        }
    }

    /// Publishes `map` as the new current map. Callers must hold `writer`.
    fn publish(&self, map: Map<V>) {
        self.current.store(Arc::new(map));
    }

    /// Returns an owned view of the currently published map.
    pub fn snapshot(&self) -> Snapshot<V> {
        Snapshot {
            map: self.current.load_full(),
        }
    }
}

impl<V> StatementStore<V> for SnapshotStore<V>
where
    V: Send + Sync,
{
    #[inline]
    fn get(&self, query: &str) -> Option<Arc<V>> {
        self.current.load().get(query).cloned()
    }

    fn get_or_try_insert_with<E, F>(&self, query: &str, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&str) -> Result<V, E>,
    {
        if let Some(value) = self.get(query) {
            return Ok(value);
        }

        let _writer = self.writer.lock();

        // Another writer may have published this key while we waited.
        if let Some(value) = self.get(query) {
            return Ok(value);
        }

        let value = Arc::new(factory(query)?);

        // `current` cannot change while we hold `writer`.
        let mut next: Map<V> = (**self.current.load()).clone();
        next.insert(query.to_owned(), Arc::clone(&value));
        let entries = next.len();
        self.publish(next);

        tracing::trace!(query, entries, "published statement snapshot");
        Ok(value)
    }

    fn len(&self) -> usize {
        self.current.load().len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn clear(&self) {
        let _writer = self.writer.lock();
        self.publish(Map::default());
    }
}

impl<V> Default for SnapshotStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for SnapshotStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("len", &self.current.load().len())
            .finish()
    }
}

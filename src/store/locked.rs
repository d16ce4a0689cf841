//! Unbounded statement store behind a single `RwLock`.
//!
//! Lookups share a read lock; misses take the write lock, re-check, and run
//! the factory while still holding it. Cheaper inserts than
//! [`SnapshotStore`](crate::store::snapshot::SnapshotStore) (no map copy),
//! at the price of readers briefly waiting behind a writer.
//!
//! ```
//! use stmtkit::store::locked::LockedStore;
//! use stmtkit::traits::StatementStore;
//!
//! let store: LockedStore<&str> = LockedStore::new();
//! let v = store.get_or_try_insert_with("SELECT 1", |_| Ok::<_, ()>("one")).unwrap();
//! assert_eq!(*v, "one");
//! assert_eq!(store.len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::traits::StatementStore;

/// Unbounded `RwLock<HashMap>` statement store.
pub struct LockedStore<V> {
    map: RwLock<FxHashMap<String, Arc<V>>>,
}

impl<V> LockedStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<V> StatementStore<V> for LockedStore<V>
where
    V: Send + Sync,
{
    #[inline]
    fn get(&self, query: &str) -> Option<Arc<V>> {
        self.map.read().get(query).cloned()
    }

    fn get_or_try_insert_with<E, F>(&self, query: &str, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&str) -> Result<V, E>,
    {
        if let Some(value) = self.get(query) {
            return Ok(value);
        }

        let mut map = self.map.write();
        if let Some(value) = map.get(query) {
            return Ok(Arc::clone(value));
        }

        let value = Arc::new(factory(query)?);
        map.insert(query.to_owned(), Arc::clone(&value));
        Ok(value)
    }

    fn len(&self) -> usize {
        self.map.read().len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn clear(&self) {
        let drained = std::mem::take(&mut *self.map.write());
        drop(drained);
    }
}

impl<V> Default for LockedStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for LockedStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedStore")
            .field("len", &self.map.read().len())
            .finish()
    }
}

//! # Statement cache facade
//!
//! [`StatementCache`] binds a [`Client`] to one storage strategy and exposes
//! a single data-path operation, [`acquire`](StatementCache::acquire).
//!
//! ## Acquire flow
//!
//! ```text
//!   acquire("SELECT ...")
//!        │
//!        ▼
//!   store.get_or_try_insert_with(query, factory)
//!        │
//!        ├── hit ──────────────────────────────► Statement (shared Arc)
//!        │
//!        └── miss (under the store's writer section)
//!              │
//!              ├── client.prepare(query) ── Err ──► Err(C::Error), nothing cached
//!              │
//!              └── Ok ─► Arc<Prepared> inserted ──► Statement
//! ```
//!
//! Prepare errors are returned exactly as the client produced them and are
//! never cached: the next `acquire` for that query tries again.
//!
//! Queries are matched byte-for-byte. `"SELECT 1"` and `"SELECT  1"` are two
//! entries and two prepare calls.
//!
//! ## Ownership
//!
//! The cache owns every prepared statement. Callers get a [`Statement`]
//! whose `release` is a no-op; the client's `close` runs only when the
//! last reference to a prepared statement drops, whether that last
//! reference was the store (eviction, `clear`, cache teardown) or a caller.
//!
//! Each cache owns its own storage. Create one per client/connection and
//! pass it around explicitly; there is no process-wide registry.
//!
//! Dropping the cache drops every stored reference before `drop` returns,
//! so statements not held by a caller are closed by then.

use std::fmt;
use std::sync::Arc;

use crate::builder::{CacheBuilder, CachePolicy};
use crate::metrics::{CacheCounters, CacheMetricsSnapshot};
use crate::statement::{Prepared, Statement};
use crate::store::{LockedStore, LruStore, SnapshotStore};
use crate::traits::{Client, StatementStore};

/// Storage strategy selected by [`CachePolicy`].
pub(crate) enum StoreKind<V> {
    Snapshot(SnapshotStore<V>),
    Lru(LruStore<V>),
    Locked(LockedStore<V>),
}

impl<V> StoreKind<V> {
    fn evictions(&self) -> u64 {
        match self {
            StoreKind::Lru(lru) => lru.evictions(),
            StoreKind::Snapshot(_) | StoreKind::Locked(_) => 0,
        }
    }
}

impl<V> StatementStore<V> for StoreKind<V>
where
    V: Send + Sync,
{
    #[inline]
    fn get(&self, query: &str) -> Option<Arc<V>> {
        match self {
            StoreKind::Snapshot(s) => s.get(query),
            StoreKind::Lru(s) => s.get(query),
            StoreKind::Locked(s) => s.get(query),
        }
    }

    #[inline]
    fn get_or_try_insert_with<E, F>(&self, query: &str, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&str) -> Result<V, E>,
    {
        match self {
            StoreKind::Snapshot(s) => s.get_or_try_insert_with(query, factory),
            StoreKind::Lru(s) => s.get_or_try_insert_with(query, factory),
            StoreKind::Locked(s) => s.get_or_try_insert_with(query, factory),
        }
    }

    fn len(&self) -> usize {
        match self {
            StoreKind::Snapshot(s) => s.len(),
            StoreKind::Lru(s) => s.len(),
            StoreKind::Locked(s) => s.len(),
        }
    }

    fn capacity(&self) -> Option<usize> {
        match self {
            StoreKind::Snapshot(s) => s.capacity(),
            StoreKind::Lru(s) => s.capacity(),
            StoreKind::Locked(s) => s.capacity(),
        }
    }

    fn clear(&self) {
        match self {
            StoreKind::Snapshot(s) => s.clear(),
            StoreKind::Lru(s) => s.clear(),
            StoreKind::Locked(s) => s.clear(),
        }
    }
}

/// Concurrency-safe prepared statement cache.
///
/// # Example
///
/// ```
/// use stmtkit::cache::StatementCache;
/// use stmtkit::traits::Client;
///
/// struct Db;
///
/// impl Client for Db {
///     type Statement = String;
///     type Error = String;
///
///     fn prepare(&self, query: &str) -> Result<String, String> {
///         if query.is_empty() {
///             Err("empty query".to_string())
///         } else {
///             Ok(format!("plan for {query}"))
///         }
///     }
/// }
///
/// let cache = StatementCache::new(Db);
///
/// let stmt = cache.acquire("SELECT 1").unwrap();
/// assert_eq!(stmt.as_str(), "plan for SELECT 1");
///
/// // Client errors come back untouched and are not cached.
/// assert_eq!(cache.acquire("").unwrap_err(), "empty query");
/// assert_eq!(cache.len(), 1);
/// ```
pub struct StatementCache<C: Client> {
    client: Arc<C>,
    store: StoreKind<Prepared<C>>,
    counters: CacheCounters,
}

impl<C: Client> StatementCache<C> {
    /// Creates a cache with the default [`CachePolicy::Snapshot`] strategy.
    pub fn new(client: C) -> Self {
        CacheBuilder::new().build(client)
    }

    /// Creates a cache using `policy`.
    pub fn with_policy(client: C, policy: CachePolicy) -> Self {
        CacheBuilder::new().policy(policy).build(client)
    }

    pub(crate) fn from_parts(client: Arc<C>, store: StoreKind<Prepared<C>>) -> Self {
        Self {
            client,
            store,
            counters: CacheCounters::default(),
        }
    }

    /// Returns the cached statement for `query`, preparing it on first use.
    ///
    /// At most one prepare call happens per resident query, however many
    /// threads ask for it at once. On failure the client's error is
    /// returned unchanged and nothing is cached.
    pub fn acquire(&self, query: &str) -> Result<Statement<C>, C::Error> {
        self.counters.inc_acquire();

        let mut prepared = false;
        let result = self.store.get_or_try_insert_with(query, |query| {
            prepared = true;
            self.client
                .prepare(query)
                .map(|statement| Prepared::new(query, statement, Arc::clone(&self.client)))
        });

        match result {
            Ok(inner) => {
                if prepared {
                    self.counters.inc_miss();
                    tracing::debug!(query, "prepared statement");
                } else {
                    self.counters.inc_hit();
                    tracing::trace!(query, "statement cache hit");
                }
                Ok(Statement::new(inner))
            },
            Err(err) => {
                self.counters.inc_prepare_failure();
                tracing::debug!(query, "prepare failed");
                Err(err)
            },
        }
    }

    /// Changes the capacity of a bounded cache.
    ///
    /// A capacity of 0 becomes [`DEFAULT_CAPACITY`](crate::store::DEFAULT_CAPACITY).
    /// The new capacity is applied at the next insert; nothing is evicted
    /// here. Returns `false`, and does nothing, for unbounded policies.
    pub fn set_capacity(&self, capacity: usize) -> bool {
        match &self.store {
            StoreKind::Lru(lru) => {
                lru.set_capacity(capacity);
                tracing::debug!(
                    requested = capacity,
                    capacity = ?lru.capacity(),
                    "statement cache capacity changed"
                );
                true
            },
            StoreKind::Snapshot(_) | StoreKind::Locked(_) => false,
        }
    }

    /// Current policy, reflecting any capacity change.
    pub fn policy(&self) -> CachePolicy {
        match &self.store {
            StoreKind::Snapshot(_) => CachePolicy::Snapshot,
            StoreKind::Locked(_) => CachePolicy::Locked,
            StoreKind::Lru(lru) => CachePolicy::Lru {
                capacity: lru.capacity().unwrap_or_default(),
            },
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Number of resident statements.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if no statements are resident.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Store capacity, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.store.capacity()
    }

    /// Drops every resident statement, e.g. after reconnecting.
    ///
    /// Statements still held by callers stay usable and are closed when
    /// the last holder drops them.
    pub fn clear(&self) {
        let len = self.store.len();
        self.store.clear();
        tracing::debug!(dropped = len, "cleared statement cache");
    }

    /// Snapshot of the cache's counters.
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.counters.snapshot(
            self.store.evictions(),
            self.store.len(),
            self.store.capacity(),
        )
    }
}

impl<C: Client> fmt::Debug for StatementCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementCache")
            .field("policy", &self.policy())
            .field("len", &self.store.len())
            .finish()
    }
}

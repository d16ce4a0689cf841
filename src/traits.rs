//! # Trait seams
//!
//! Two traits hold the crate together:
//!
//! ```text
//!   ┌─────────────────────────────┐        ┌──────────────────────────────────┐
//!   │        Client               │        │      StatementStore<V>           │
//!   │  (consumed, upstream)       │        │  (storage strategy, leaf)        │
//!   │                             │        │                                  │
//!   │  prepare(&str) → Statement  │        │  get(&str) → Option<Arc<V>>      │
//!   │  close(Statement)           │        │  get_or_try_insert_with(..)      │
//!   └──────────────┬──────────────┘        │  len / capacity / clear          │
//!                  │                       └────────────────┬─────────────────┘
//!                  │                                        │
//!                  └──────────────┐      ┌──────────────────┘
//!                                 ▼      ▼
//!                      ┌──────────────────────────────┐
//!                      │    StatementCache<C>         │
//!                      │    acquire(&str) → Statement │
//!                      └──────────────────────────────┘
//! ```
//!
//! ## Store implementations
//!
//! | Store           | Read path          | Write path                 | Bounded |
//! |-----------------|--------------------|----------------------------|---------|
//! | `SnapshotStore` | lock-free (swap)   | writer mutex + COW swap    | no      |
//! | `LruStore`      | mutex              | same mutex                 | yes     |
//! | `LockedStore`   | shared read lock   | exclusive write lock       | no      |
//!
//! Every store runs the factory while holding its exclusive writer section,
//! so at most one factory call happens per resident key.

use std::sync::Arc;

/// Capability-based database client consumed by the cache.
///
/// The cache calls [`prepare`](Client::prepare) at most once per resident
/// query and calls [`close`](Client::close) exactly once per prepared
/// statement, when the last reference to it goes away. Application code
/// only ever sees statements through [`Statement`](crate::statement::Statement),
/// which has no way to reach `close`.
///
/// # Example
///
/// ```
/// use stmtkit::traits::Client;
///
/// struct Echo;
///
/// impl Client for Echo {
///     type Statement = String;
///     type Error = std::convert::Infallible;
///
///     fn prepare(&self, query: &str) -> Result<String, Self::Error> {
///         Ok(query.to_uppercase())
///     }
/// }
/// ```
pub trait Client: Send + Sync + 'static {
    /// Prepared statement handle produced by the client.
    type Statement: Send + Sync + 'static;

    /// Error returned by a failed prepare; surfaced to callers unchanged.
    type Error;

    /// Prepares `query` and returns the native handle.
    fn prepare(&self, query: &str) -> Result<Self::Statement, Self::Error>;

    /// Destroys a prepared statement.
    ///
    /// The default implementation simply drops it.
    fn close(&self, statement: Self::Statement) {
        drop(statement);
    }
}

/// Thread-safe query-keyed storage strategy.
///
/// Keys are compared byte-for-byte; no normalization is performed, so
/// `"SELECT 1"` and `"SELECT  1"` are different entries.
pub trait StatementStore<V>: Send + Sync {
    /// Returns the value cached for `query`, if resident.
    fn get(&self, query: &str) -> Option<Arc<V>>;

    /// Returns the value cached for `query`, creating it with `factory` on a
    /// miss.
    ///
    /// `factory` runs at most once per resident key, under the store's
    /// exclusive writer section. A factory error is returned unchanged and
    /// leaves the store untouched.
    fn get_or_try_insert_with<E, F>(&self, query: &str, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&str) -> Result<V, E>;

    /// Number of resident entries.
    fn len(&self) -> usize;

    /// Returns `true` if no entries are resident.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries, or `None` for unbounded stores.
    fn capacity(&self) -> Option<usize>;

    /// Drops every resident entry.
    fn clear(&self);
}

//! Cache construction.
//!
//! Picks the storage strategy and optional eviction listener, then binds a
//! [`Client`] into a [`StatementCache`].
//!
//! ## Example
//!
//! ```rust
//! use stmtkit::builder::{CacheBuilder, CachePolicy};
//! use stmtkit::traits::Client;
//!
//! struct Echo;
//!
//! impl Client for Echo {
//!     type Statement = String;
//!     type Error = std::convert::Infallible;
//!
//!     fn prepare(&self, query: &str) -> Result<String, Self::Error> {
//!         Ok(query.to_string())
//!     }
//! }
//!
//! let cache = CacheBuilder::new()
//!     .policy(CachePolicy::Lru { capacity: 2 })
//!     .on_evict(|query| println!("evicted {query}"))
//!     .build(Echo);
//!
//! cache.acquire("SELECT 1").unwrap();
//! assert_eq!(cache.capacity(), Some(2));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::cache::{StatementCache, StoreKind};
use crate::store::{LockedStore, LruStore, SnapshotStore, DEFAULT_CAPACITY};
use crate::traits::Client;

/// Available storage strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Unbounded copy-on-write map with lock-free reads.
    #[default]
    Snapshot,
    /// Bounded map with least-recently-used eviction. A capacity of 0 is
    /// normalized to [`DEFAULT_CAPACITY`].
    Lru { capacity: usize },
    /// Unbounded map behind a read/write lock.
    Locked,
}

impl CachePolicy {
    /// LRU policy with [`DEFAULT_CAPACITY`].
    pub fn lru_default() -> Self {
        CachePolicy::Lru {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

type QueryListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Builder for [`StatementCache`] instances.
#[derive(Default)]
pub struct CacheBuilder {
    policy: CachePolicy,
    on_evict: Option<QueryListener>,
}

impl CacheBuilder {
    /// Creates a builder for the default [`CachePolicy::Snapshot`] policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the storage strategy.
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Registers a callback run with the query of every evicted statement.
    ///
    /// Only bounded policies evict; the callback is ignored otherwise. It
    /// runs outside the store's lock and may call back into the cache.
    pub fn on_evict<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(listener));
        self
    }

    /// Builds a cache that owns `client`.
    pub fn build<C: Client>(self, client: C) -> StatementCache<C> {
        self.build_shared(Arc::new(client))
    }

    /// Builds a cache around an already shared client.
    pub fn build_shared<C: Client>(self, client: Arc<C>) -> StatementCache<C> {
        let store = match self.policy {
            CachePolicy::Snapshot => StoreKind::Snapshot(SnapshotStore::new()),
            CachePolicy::Locked => StoreKind::Locked(LockedStore::new()),
            CachePolicy::Lru { capacity } => match self.on_evict {
                Some(listener) => StoreKind::Lru(LruStore::with_listener(
                    capacity,
                    move |query, _| listener(query),
                )),
                None => StoreKind::Lru(LruStore::new(capacity)),
            },
        };

        tracing::debug!(policy = ?self.policy, "built statement cache");
        StatementCache::from_parts(client, store)
    }
}

impl fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("policy", &self.policy)
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}

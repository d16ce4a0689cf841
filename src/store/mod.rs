//! Storage strategies for prepared statements.
//!
//! Stores own query keys and shared `Arc<V>` values; they know nothing about
//! the database client. The facade picks one through
//! [`CachePolicy`](crate::builder::CachePolicy).
//!
//! - [`snapshot::SnapshotStore`]: unbounded, lock-free reads, copy-on-write.
//! - [`lru::LruStore`]: bounded, least-recently-used eviction.
//! - [`locked::LockedStore`]: unbounded, `RwLock` around a hash map.

pub mod locked;
pub mod lru;
pub mod snapshot;

pub use locked::LockedStore;
pub use lru::{LruCore, LruStore, DEFAULT_CAPACITY};
pub use snapshot::{Snapshot, SnapshotStore};

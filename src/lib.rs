//! stmtkit: a concurrency-safe prepared statement cache.
//!
//! [`StatementCache`](cache::StatementCache) hands out shared, reusable
//! prepared statements keyed by exact query text, preparing each one at most
//! once. Storage is pluggable: a lock-free copy-on-write snapshot map, a
//! bounded LRU map, or a read/write-locked map.

pub mod builder;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod prelude;
pub mod statement;
pub mod store;
pub mod traits;

pub use crate::builder::{CacheBuilder, CachePolicy};
pub use crate::cache::StatementCache;
pub use crate::error::InvariantError;
pub use crate::metrics::CacheMetricsSnapshot;
pub use crate::statement::Statement;
pub use crate::store::{LockedStore, LruStore, SnapshotStore, DEFAULT_CAPACITY};
pub use crate::traits::{Client, StatementStore};

//! Cache-level counters.
//!
//! Counters use relaxed atomics: a snapshot taken while other threads are
//! acquiring is approximate, but each counter is individually exact once the
//! cache is quiescent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a [`StatementCache`](crate::cache::StatementCache)'s
/// counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    /// Calls to `acquire`.
    pub acquires: u64,
    /// Acquires served from the store without preparing.
    pub hits: u64,
    /// Acquires that prepared and inserted a new statement.
    pub misses: u64,
    /// Acquires whose prepare call failed.
    pub prepare_failures: u64,
    /// Entries evicted by a bounded store.
    pub evictions: u64,
    /// Resident entries.
    pub len: usize,
    /// Store capacity, `None` when unbounded.
    pub capacity: Option<usize>,
}

impl CacheMetricsSnapshot {
    /// Fraction of completed acquires served from the store.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    acquires: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    prepare_failures: AtomicU64,
}

impl CacheCounters {
    #[inline]
    pub(crate) fn inc_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_prepare_failure(&self) {
        self.prepare_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        evictions: u64,
        len: usize,
        capacity: Option<usize>,
    ) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            acquires: self.acquires.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            prepare_failures: self.prepare_failures.load(Ordering::Relaxed),
            evictions,
            len,
            capacity,
        }
    }
}

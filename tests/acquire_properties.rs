// ==============================================
// ACQUIRE PROPERTIES (integration)
// ==============================================
//
// Behavior every cache policy must share, exercised through the public
// facade with a recording mock client.

#[allow(dead_code)]
mod common;

use std::sync::Arc;

use common::{MockClient, MockError};
use stmtkit::prelude::*;

const POLICIES: [CachePolicy; 3] = [
    CachePolicy::Snapshot,
    CachePolicy::Lru { capacity: 64 },
    CachePolicy::Locked,
];

fn cache_with(policy: CachePolicy) -> (Arc<MockClient>, StatementCache<MockClient>) {
    let client = Arc::new(MockClient::new());
    let cache = CacheBuilder::new()
        .policy(policy)
        .build_shared(Arc::clone(&client));
    (client, cache)
}

// ==============================================
// No-op close
// ==============================================

mod release {
    use super::*;

    #[test]
    fn release_never_fails_and_never_reprepares() {
        for policy in POLICIES {
            let (client, cache) = cache_with(policy);

            let stmt = cache.acquire("SELECT * FROM users WHERE id = ?").unwrap();
            for _ in 0..3 {
                assert_eq!(stmt.release(), Ok(()));
            }
            drop(stmt);

            let again = cache.acquire("SELECT * FROM users WHERE id = ?").unwrap();
            assert_eq!(again.release(), Ok(()));
            assert_eq!(client.prepares_of("SELECT * FROM users WHERE id = ?"), 1);
            assert_eq!(client.closes(), 0, "{policy:?}: release must not close");
        }
    }

    #[test]
    fn wrapper_forwards_native_capabilities() {
        let (_, cache) = cache_with(CachePolicy::Snapshot);
        let stmt = cache.acquire("UPDATE t SET x = ?").unwrap();

        assert_eq!(stmt.execute(5), "UPDATE t SET x = ? <- 5");
        assert_eq!(stmt.sql, "UPDATE t SET x = ?");
        assert_eq!(stmt.query(), "UPDATE t SET x = ?");
    }
}

// ==============================================
// Failures are never cached
// ==============================================

mod failures {
    use super::*;

    #[test]
    fn failure_does_not_poison() {
        for policy in POLICIES {
            let (client, cache) = cache_with(policy);
            client.fail_next("SELECT broken", 1);

            let err = cache.acquire("SELECT broken").unwrap_err();
            assert_eq!(err, MockError("cannot prepare \"SELECT broken\"".to_string()));
            assert!(cache.is_empty(), "{policy:?}: failed prepare left an entry");

            let stmt = cache.acquire("SELECT broken").unwrap();
            assert_eq!(stmt.sql, "SELECT broken");
            assert_eq!(client.prepares_of("SELECT broken"), 1);
            assert_eq!(cache.metrics().prepare_failures, 1);
        }
    }

    #[test]
    fn repeated_failures_each_reach_the_client() {
        let (client, cache) = cache_with(CachePolicy::Lru { capacity: 2 });
        client.fail_next("q", 3);

        for _ in 0..3 {
            assert!(cache.acquire("q").is_err());
        }
        assert!(cache.acquire("q").is_ok());
        assert_eq!(cache.metrics().prepare_failures, 3);
        assert_eq!(cache.metrics().misses, 1);
    }
}

// ==============================================
// Key exactness
// ==============================================

mod keys {
    use super::*;

    #[test]
    fn whitespace_variants_are_distinct_entries() {
        for policy in POLICIES {
            let (client, cache) = cache_with(policy);

            let a = cache.acquire("SELECT 1").unwrap();
            let b = cache.acquire("SELECT  1").unwrap();

            assert!(!Statement::ptr_eq(&a, &b));
            assert_eq!(client.prepares_of("SELECT 1"), 1);
            assert_eq!(client.prepares_of("SELECT  1"), 1);
            assert_eq!(cache.len(), 2);
        }
    }

    #[test]
    fn case_is_significant() {
        let (client, cache) = cache_with(CachePolicy::Locked);
        cache.acquire("select 1").unwrap();
        cache.acquire("SELECT 1").unwrap();
        assert_eq!(client.total_prepares(), 2);
    }
}

// ==============================================
// Snapshot immutability
// ==============================================

mod snapshot {
    use super::*;
    use stmtkit::store::SnapshotStore;

    #[test]
    fn old_snapshot_keeps_old_contents() {
        let client = MockClient::new();
        let store: SnapshotStore<common::MockStatement> = SnapshotStore::new();

        store
            .get_or_try_insert_with("q1", |q| client.prepare(q))
            .unwrap();
        let before_q2 = store.snapshot();

        store
            .get_or_try_insert_with("q2", |q| client.prepare(q))
            .unwrap();

        assert!(before_q2.contains("q1"));
        assert!(!before_q2.contains("q2"));
        assert_eq!(before_q2.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }
}

// ==============================================
// LRU capacity bound
// ==============================================

mod lru_bound {
    use super::*;

    #[test]
    fn capacity_plus_one_evicts_least_recent() {
        let (client, cache) = cache_with(CachePolicy::Lru { capacity: 3 });

        let a_id = cache.acquire("a").unwrap().id;
        let b_id = cache.acquire("b").unwrap().id;
        cache.acquire("c").unwrap();

        // Touching "a" protects it; "b" becomes least recent.
        cache.acquire("a").unwrap();
        cache.acquire("d").unwrap();

        assert_eq!(cache.len(), 3);
        assert_eq!(client.closed_ids(), vec![b_id]);
        assert!(!client.closed_ids().contains(&a_id));

        // "a" is still cached, "b" has to be prepared again.
        cache.acquire("a").unwrap();
        assert_eq!(client.prepares_of("a"), 1);
        cache.acquire("b").unwrap();
        assert_eq!(client.prepares_of("b"), 2);
    }

    #[test]
    fn evicted_statement_in_use_is_closed_after_last_holder() {
        let (client, cache) = cache_with(CachePolicy::Lru { capacity: 1 });

        let held = cache.acquire("a").unwrap();
        cache.acquire("b").unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(client.closes(), 0, "held statement closed on eviction");
        assert_eq!(held.execute(1), "a <- 1");

        let clone = held.clone();
        drop(held);
        assert_eq!(client.closes(), 0);
        drop(clone);
        assert_eq!(client.closes(), 1);
    }

    #[test]
    fn set_capacity_takes_effect_on_next_insert() {
        let (client, cache) = cache_with(CachePolicy::Lru { capacity: 4 });
        for q in ["a", "b", "c", "d"] {
            cache.acquire(q).unwrap();
        }

        assert!(cache.set_capacity(2));
        assert_eq!(cache.len(), 4);
        assert_eq!(client.closes(), 0);

        cache.acquire("e").unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(client.closes(), 3);
        assert_eq!(cache.metrics().evictions, 3);
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let (_, cache) = cache_with(CachePolicy::Lru { capacity: 8 });
        cache.set_capacity(0);
        assert_eq!(cache.capacity(), Some(DEFAULT_CAPACITY));
    }
}

// ==============================================
// Teardown
// ==============================================

mod teardown {
    use super::*;

    #[test]
    fn dropping_cache_closes_each_statement_once() {
        for policy in POLICIES {
            let (client, cache) = cache_with(policy);
            for i in 0..5 {
                cache.acquire(&format!("SELECT {i}")).unwrap();
            }
            drop(cache);

            let mut ids = client.closed_ids();
            ids.sort_unstable();
            assert_eq!(ids, vec![0, 1, 2, 3, 4], "{policy:?}");
            assert_eq!(Arc::strong_count(&client), 1, "{policy:?}: client still referenced");
        }
    }

    #[test]
    fn dropping_cache_after_clear_releases_the_client() {
        for policy in POLICIES {
            let (client, cache) = cache_with(policy);
            cache.acquire("SELECT 1").unwrap();
            cache.clear();
            cache.acquire("SELECT 2").unwrap();
            drop(cache);

            assert_eq!(client.closes(), 2, "{policy:?}");
            assert_eq!(Arc::strong_count(&client), 1, "{policy:?}");
        }
    }

    #[test]
    fn held_statement_survives_cache_drop() {
        for policy in POLICIES {
            let (client, cache) = cache_with(policy);
            let held = cache.acquire("SELECT 1").unwrap();
            drop(cache);

            assert!(!client.closed_ids().contains(&held.id), "{policy:?}");
            assert_eq!(held.execute(2), "SELECT 1 <- 2");

            let id = held.id;
            drop(held);
            assert_eq!(client.closed_ids(), vec![id], "{policy:?}");
            assert_eq!(Arc::strong_count(&client), 1, "{policy:?}");
        }
    }

    #[test]
    fn independent_caches_do_not_share_entries() {
        let client = Arc::new(MockClient::new());
        let first = CacheBuilder::new().build_shared(Arc::clone(&client));
        let second = CacheBuilder::new().build_shared(Arc::clone(&client));

        first.acquire("SELECT 1").unwrap();
        second.acquire("SELECT 1").unwrap();

        assert_eq!(client.prepares_of("SELECT 1"), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}

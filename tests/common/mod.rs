// Shared mock client for integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use stmtkit::traits::Client;

/// Handle produced by [`MockClient`]. `id` is unique per prepare call.
#[derive(Debug, PartialEq, Eq)]
pub struct MockStatement {
    pub id: usize,
    pub sql: String,
}

impl MockStatement {
    /// Stand-in for a query/execute capability on the native handle.
    pub fn execute(&self, arg: i64) -> String {
        format!("{} <- {}", self.sql, arg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockError(pub String);

#[derive(Default)]
pub struct MockClient {
    next_id: AtomicUsize,
    closes: AtomicUsize,
    prepares: Mutex<HashMap<String, usize>>,
    closed_ids: Mutex<Vec<usize>>,
    failures: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every prepare sleeps for `delay`, widening race windows.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// The next `times` prepares of `sql` fail.
    pub fn fail_next(&self, sql: &str, times: usize) {
        self.failures.lock().unwrap().insert(sql.to_string(), times);
    }

    pub fn prepares_of(&self, sql: &str) -> usize {
        self.prepares.lock().unwrap().get(sql).copied().unwrap_or(0)
    }

    pub fn total_prepares(&self) -> usize {
        self.prepares.lock().unwrap().values().sum()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn closed_ids(&self) -> Vec<usize> {
        self.closed_ids.lock().unwrap().clone()
    }
}

impl Client for MockClient {
    type Statement = MockStatement;
    type Error = MockError;

    fn prepare(&self, query: &str) -> Result<MockStatement, MockError> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(query) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(MockError(format!("cannot prepare {query:?}")));
                }
            }
        }

        *self
            .prepares
            .lock()
            .unwrap()
            .entry(query.to_string())
            .or_default() += 1;

        Ok(MockStatement {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            sql: query.to_string(),
        })
    }

    fn close(&self, statement: MockStatement) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed_ids.lock().unwrap().push(statement.id);
    }
}

//! Error types owned by stmtkit.
//!
//! Errors produced by the database client are never wrapped: `acquire`
//! returns the client's own `Client::Error` unchanged. The types here cover
//! the cache's internal bookkeeping only.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (`check_invariants` helpers used by tests and debug tooling).
//!
//! ## Example Usage
//!
//! ```
//! use stmtkit::store::lru::LruCore;
//!
//! let mut core: LruCore<u32> = LruCore::new(2);
//! core.put("SELECT 1".to_string(), std::sync::Arc::new(1));
//! assert!(core.check_invariants().is_ok());
//! ```

use thiserror::Error;

/// Error returned when internal store invariants are violated.
///
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_message() {
        let err = InvariantError::new("recency list length mismatch");
        assert_eq!(err.to_string(), "recency list length mismatch");
    }

    #[test]
    fn message_accessor() {
        let err = InvariantError::new("dangling tail");
        assert_eq!(err.message(), "dangling tail");
    }

    #[test]
    fn clone_and_eq() {
        let a = InvariantError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<InvariantError>();
    }
}

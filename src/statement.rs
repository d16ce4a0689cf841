//! Cached statements and the close-suppressing wrapper handed to callers.
//!
//! ```text
//!   caller ── Statement<C> ──┐
//!   caller ── Statement<C> ──┼──► Arc<Prepared<C>> ──► C::Statement
//!   store  ── Arc<..> ───────┘            │
//!                                         └── Drop: client.close(statement)
//! ```
//!
//! [`Statement::release`] does nothing: the prepared statement belongs to the
//! cache and may be in use elsewhere. The client's real `close` runs exactly
//! once, when the last reference (store entry or outstanding wrapper) drops.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::Arc;

use crate::traits::Client;

/// A prepared statement owned by the cache.
pub(crate) struct Prepared<C: Client> {
    query: String,
    statement: ManuallyDrop<C::Statement>,
    client: Arc<C>,
}

impl<C: Client> Prepared<C> {
    pub(crate) fn new(query: &str, statement: C::Statement, client: Arc<C>) -> Self {
        Self {
            query: query.to_owned(),
            statement: ManuallyDrop::new(statement),
            client,
        }
    }
}

impl<C: Client> Drop for Prepared<C> {
    fn drop(&mut self) {
        // SAFETY: `statement` is taken exactly once, here, and never touched
        // again.
        let statement = unsafe { ManuallyDrop::take(&mut self.statement) };
        self.client.close(statement);
        tracing::debug!(query = %self.query, "closed statement");
    }
}

/// Handle returned by [`StatementCache::acquire`](crate::cache::StatementCache::acquire).
///
/// Derefs to the client's statement type, so every execute/query method of
/// the underlying handle is available directly. Cloning is cheap and shares
/// the same prepared statement.
///
/// # Example
///
/// ```
/// use stmtkit::cache::StatementCache;
/// use stmtkit::traits::Client;
///
/// struct Upper;
///
/// impl Client for Upper {
///     type Statement = String;
///     type Error = std::convert::Infallible;
///
///     fn prepare(&self, query: &str) -> Result<String, Self::Error> {
///         Ok(query.to_uppercase())
///     }
/// }
///
/// let cache = StatementCache::new(Upper);
/// let stmt = cache.acquire("select 1").unwrap();
/// assert_eq!(stmt.len(), 8); // String::len through Deref
///
/// stmt.release().unwrap(); // no-op
/// assert_eq!(cache.acquire("select 1").unwrap().as_str(), "SELECT 1");
/// ```
pub struct Statement<C: Client> {
    inner: Arc<Prepared<C>>,
}

impl<C: Client> Statement<C> {
    pub(crate) fn new(inner: Arc<Prepared<C>>) -> Self {
        Self { inner }
    }

    /// The query text this statement was prepared from.
    #[inline]
    pub fn query(&self) -> &str {
        &self.inner.query
    }

    /// Releases the caller's interest in the statement.
    ///
    /// Always succeeds and never closes the underlying statement; it can be
    /// called any number of times.
    #[inline]
    pub fn release(&self) -> Result<(), C::Error> {
        Ok(())
    }

    /// Returns `true` if both wrappers share the same prepared statement.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<C: Client> Deref for Statement<C> {
    type Target = C::Statement;

    #[inline]
    fn deref(&self) -> &C::Statement {
        &self.inner.statement
    }
}

impl<C: Client> AsRef<C::Statement> for Statement<C> {
    fn as_ref(&self) -> &C::Statement {
        self
    }
}

impl<C: Client> Clone for Statement<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Statement<C>
where
    C: Client,
    C::Statement: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("query", &self.inner.query)
            .field("statement", &*self.inner.statement)
            .finish()
    }
}

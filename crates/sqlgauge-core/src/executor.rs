//! The query execution seam.

use std::future::Future;
use std::pin::Pin;

use crate::error::QueryError;
use crate::types::Row;

/// Boxed, sendable future used at the trait seams of the workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs a SQL statement against a named database.
///
/// Connection acquisition and release are the implementor's concern; the
/// caller only sees rows or an error.
pub trait QueryExecutor: Send + Sync {
    fn fetch<'a>(
        &'a self,
        database: &'a str,
        statement: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, QueryError>>;
}

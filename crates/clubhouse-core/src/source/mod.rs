//! Data sources
//!
//! A [`DataSource`] answers a [`QuerySpec`] with one page of typed items.
//! Callers depend on the trait only, so a resource can move between an
//! in-memory collection and a table scan without touching its consumers.
//!
//! - [`InMemoryDataSource`]: loads the whole collection per query, then
//!   filters, sorts, counts and slices locally (offset pagination)
//! - [`ScanDataSource`]: filtered table scan over one entity type (cursor
//!   pagination, no total count)

pub mod memory;
pub mod scan;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DataResult;
use crate::query::{QueryResult, QuerySpec};

pub use memory::{CollectionLoader, FnLoader, InMemoryDataSource};
pub use scan::ScanDataSource;

/// Queryable collection of `T`
#[async_trait]
pub trait DataSource<T>: Send + Sync {
    /// Run `spec` and return one page
    async fn query(&self, spec: &QuerySpec) -> DataResult<QueryResult<T>>;
}

/// A source that can also look up a single item by id
///
/// Absence is `Ok(None)`, not an error.
#[async_trait]
pub trait KeyedDataSource<T>: DataSource<T> {
    async fn get_by_id(&self, id: &str) -> DataResult<Option<T>>;
}

#[async_trait]
impl<T, S> DataSource<T> for Arc<S>
where
    S: DataSource<T> + ?Sized,
    T: Send + 'static,
{
    async fn query(&self, spec: &QuerySpec) -> DataResult<QueryResult<T>> {
        (**self).query(spec).await
    }
}

#[async_trait]
impl<T, S> KeyedDataSource<T> for Arc<S>
where
    S: KeyedDataSource<T> + ?Sized,
    T: Send + 'static,
{
    async fn get_by_id(&self, id: &str) -> DataResult<Option<T>> {
        (**self).get_by_id(id).await
    }
}

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Book, BookFields, BookId, NewBook};
use super::query::{AggregateOp, Field, Filter, OrderBy};

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failure, reported to callers verbatim.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Narrow read/write contract the book service is written against.
///
/// Each call is a single atomic statement; implementations do their own
/// concurrency control and hold nothing across calls.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Records matching `filter`, in `order` or ascending id when `None`.
    async fn find_many(&self, filter: &Filter, order: Option<OrderBy>) -> StoreResult<Vec<Book>>;

    async fn find_one(&self, id: BookId) -> StoreResult<Option<Book>>;

    /// Insert and return the record with its freshly assigned id.
    async fn insert(&self, book: NewBook) -> StoreResult<Book>;

    /// Merge `fields` onto the record. `None` when `id` does not exist.
    async fn update_by_id(&self, id: BookId, fields: &BookFields) -> StoreResult<Option<Book>>;

    /// `false` when `id` does not exist.
    async fn delete_by_id(&self, id: BookId) -> StoreResult<bool>;

    /// `op` over `field` across the whole collection; `None` when there is
    /// nothing to aggregate.
    async fn aggregate(&self, op: AggregateOp, field: Field) -> StoreResult<Option<f64>>;
}

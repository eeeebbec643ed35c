use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::models::{Book, BookFields, BookId, NewBook};
use super::query::{AggregateOp, Field, Filter, OrderBy, Value};
use super::store::{BookStore, StoreResult};

#[derive(Default)]
struct Shelf {
    last_id: BookId,
    books: BTreeMap<BookId, Book>,
}

/// Process-local store. Each operation takes the lock once, so single
/// record writes are atomic and the last writer wins.
#[derive(Default)]
pub struct MemoryBookStore {
    shelf: RwLock<Shelf>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn find_many(&self, filter: &Filter, order: Option<OrderBy>) -> StoreResult<Vec<Book>> {
        let shelf = self.shelf.read().await;
        let mut books: Vec<Book> = shelf
            .books
            .values()
            .filter(|book| filter.matches(book))
            .cloned()
            .collect();
        if let Some(order) = order {
            books.sort_by(|a, b| order.compare(a, b));
        }
        Ok(books)
    }

    async fn find_one(&self, id: BookId) -> StoreResult<Option<Book>> {
        Ok(self.shelf.read().await.books.get(&id).cloned())
    }

    async fn insert(&self, book: NewBook) -> StoreResult<Book> {
        let mut shelf = self.shelf.write().await;
        shelf.last_id += 1;
        let created = Book {
            id: shelf.last_id,
            isbn: book.isbn,
            name: book.name,
            price: book.price,
            detail: book.detail,
            register_date: book.register_date,
        };
        shelf.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_by_id(&self, id: BookId, fields: &BookFields) -> StoreResult<Option<Book>> {
        let mut shelf = self.shelf.write().await;
        Ok(shelf.books.get_mut(&id).map(|book| {
            fields.apply_to(book);
            book.clone()
        }))
    }

    async fn delete_by_id(&self, id: BookId) -> StoreResult<bool> {
        Ok(self.shelf.write().await.books.remove(&id).is_some())
    }

    async fn aggregate(&self, op: AggregateOp, field: Field) -> StoreResult<Option<f64>> {
        let shelf = self.shelf.read().await;
        let values = shelf.books.values().filter_map(|book| match book.value(field) {
            Some(Value::Int(v)) => Some(v as f64),
            Some(Value::Number(v)) => Some(v),
            _ => None,
        });
        Ok(op.apply(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::store::conformance;

    #[tokio::test]
    async fn assigns_unique_stable_ids() {
        conformance::assigns_unique_stable_ids(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn never_reuses_ids() {
        conformance::never_reuses_ids(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn updates_merge_and_report_missing() {
        conformance::updates_merge_and_report_missing(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn deletes_once() {
        conformance::deletes_once(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn filters_text_case_sensitively() {
        conformance::filters_text_case_sensitively(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn filters_ranges_and_nulls() {
        conformance::filters_ranges_and_nulls(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn orders_with_id_tiebreak() {
        conformance::orders_with_id_tiebreak(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn aggregates_prices() {
        conformance::aggregates_prices(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn concurrent_inserts_get_distinct_ids() {
        let store = std::sync::Arc::new(MemoryBookStore::new());
        let mut handles = Vec::new();
        for n in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(conformance::new_book(&n.to_string(), "parallel", 1.0))
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }
}

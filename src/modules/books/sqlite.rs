//! `book` table access through sqlx.
//!
//! Filters are compiled to parameterised SQL. Text matching uses `instr`
//! and `substr` rather than `LIKE`, which is case-insensitive in SQLite, so
//! results agree with the in-memory store.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::models::{Book, BookFields, BookId, NewBook};
use super::query::{AggregateOp, Condition, Field, Filter, OrderBy, TextMatch, Value};
use super::store::{BookStore, StoreResult};

const SELECT_BOOKS: &str = "SELECT id, isbn, name, price, detail, register_date FROM book";
const RETURNING_BOOK: &str = " RETURNING id, isbn, name, price, detail, register_date";

#[derive(Debug, FromRow)]
struct BookRow {
    id: i64,
    isbn: String,
    name: String,
    price: f64,
    detail: Option<String>,
    register_date: Option<NaiveDate>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            isbn: row.isbn,
            name: row.name,
            price: row.price,
            detail: row.detail,
            register_date: row.register_date,
        }
    }
}

pub struct SqliteBookStore {
    pool: SqlitePool,
}

impl SqliteBookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Int(v) => builder.push_bind(*v),
        Value::Number(v) => builder.push_bind(*v),
        Value::Text(v) => builder.push_bind(v.clone()),
        Value::Date(v) => builder.push_bind(*v),
    };
}

fn push_condition(builder: &mut QueryBuilder<'_, Sqlite>, condition: &Condition) {
    match condition {
        Condition::Equals(field, value) => {
            builder.push(field.column()).push(" = ");
            push_value(builder, value);
        }
        Condition::Compare(field, comparison, value) => {
            builder
                .push(field.column())
                .push(" ")
                .push(comparison.operator())
                .push(" ");
            push_value(builder, value);
        }
        Condition::Text(field, _, needle) if needle.is_empty() => {
            builder.push(field.column()).push(" IS NOT NULL");
        }
        Condition::Text(field, mode, needle) => {
            // SQLite's length() and substr() count characters, not bytes.
            let chars = needle.chars().count() as i64;
            match mode {
                TextMatch::Contains => {
                    builder
                        .push("instr(")
                        .push(field.column())
                        .push(", ")
                        .push_bind(needle.clone())
                        .push(") > 0");
                }
                TextMatch::StartsWith => {
                    builder
                        .push("substr(")
                        .push(field.column())
                        .push(", 1, ")
                        .push_bind(chars)
                        .push(") = ")
                        .push_bind(needle.clone());
                }
                TextMatch::EndsWith => {
                    builder
                        .push("(length(")
                        .push(field.column())
                        .push(") >= ")
                        .push_bind(chars)
                        .push(" AND substr(")
                        .push(field.column())
                        .push(", ")
                        .push_bind(-chars)
                        .push(") = ")
                        .push_bind(needle.clone())
                        .push(")");
                }
            }
        }
        Condition::IsNull(field) => {
            builder.push(field.column()).push(" IS NULL");
        }
        Condition::NotNull(field) => {
            builder.push(field.column()).push(" IS NOT NULL");
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    for (index, condition) in filter.conditions().iter().enumerate() {
        builder.push(if index == 0 { " WHERE " } else { " AND " });
        push_condition(builder, condition);
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Sqlite>, order: Option<OrderBy>) {
    match order {
        Some(order) if order.field != Field::Id => {
            builder
                .push(" ORDER BY ")
                .push(order.field.column())
                .push(" ")
                .push(order.direction.keyword())
                .push(", id ASC");
        }
        Some(order) => {
            builder.push(" ORDER BY id ").push(order.direction.keyword());
        }
        None => {
            builder.push(" ORDER BY id ASC");
        }
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn find_many(&self, filter: &Filter, order: Option<OrderBy>) -> StoreResult<Vec<Book>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_BOOKS);
        push_filter(&mut builder, filter);
        push_order(&mut builder, order);

        let rows = builder
            .build_query_as::<BookRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn find_one(&self, id: BookId) -> StoreResult<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(
            "SELECT id, isbn, name, price, detail, register_date FROM book WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Book::from))
    }

    async fn insert(&self, book: NewBook) -> StoreResult<Book> {
        let row = sqlx::query_as::<_, BookRow>(
            "INSERT INTO book (isbn, name, price, detail, register_date) VALUES (?, ?, ?, ?, ?) \
             RETURNING id, isbn, name, price, detail, register_date",
        )
        .bind(book.isbn)
        .bind(book.name)
        .bind(book.price)
        .bind(book.detail)
        .bind(book.register_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_by_id(&self, id: BookId, fields: &BookFields) -> StoreResult<Option<Book>> {
        if fields.is_empty() {
            return self.find_one(id).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE book SET ");
        {
            let mut assignments = builder.separated(", ");
            if let Some(isbn) = &fields.isbn {
                assignments.push("isbn = ").push_bind_unseparated(isbn.clone());
            }
            if let Some(name) = &fields.name {
                assignments.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(price) = fields.price {
                assignments.push("price = ").push_bind_unseparated(price);
            }
            if let Some(detail) = &fields.detail {
                assignments.push("detail = ").push_bind_unseparated(detail.clone());
            }
            if let Some(register_date) = fields.register_date {
                assignments
                    .push("register_date = ")
                    .push_bind_unseparated(register_date);
            }
        }
        builder.push(" WHERE id = ").push_bind(id).push(RETURNING_BOOK);

        let row = builder
            .build_query_as::<BookRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Book::from))
    }

    async fn delete_by_id(&self, id: BookId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM book WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn aggregate(&self, op: AggregateOp, field: Field) -> StoreResult<Option<f64>> {
        let sql = format!(
            "SELECT CAST({}({}) AS REAL) FROM book",
            op.function(),
            field.column()
        );
        let value = sqlx::query_scalar::<_, Option<f64>>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::store::conformance;
    use bookshelf_kernel::settings::DatabaseSettings;

    async fn store() -> SqliteBookStore {
        let pool = bookshelf_db::connect(&DatabaseSettings::sqlite_in_memory())
            .await
            .unwrap();
        let migrations: Vec<_> = crate::modules::books::migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        bookshelf_db::run_migrations(&pool, &migrations).await.unwrap();
        SqliteBookStore::new(pool)
    }

    #[tokio::test]
    async fn assigns_unique_stable_ids() {
        conformance::assigns_unique_stable_ids(&store().await).await;
    }

    #[tokio::test]
    async fn never_reuses_ids() {
        conformance::never_reuses_ids(&store().await).await;
    }

    #[tokio::test]
    async fn updates_merge_and_report_missing() {
        conformance::updates_merge_and_report_missing(&store().await).await;
    }

    #[tokio::test]
    async fn deletes_once() {
        conformance::deletes_once(&store().await).await;
    }

    #[tokio::test]
    async fn filters_text_case_sensitively() {
        conformance::filters_text_case_sensitively(&store().await).await;
    }

    #[tokio::test]
    async fn filters_ranges_and_nulls() {
        conformance::filters_ranges_and_nulls(&store().await).await;
    }

    #[tokio::test]
    async fn orders_with_id_tiebreak() {
        conformance::orders_with_id_tiebreak(&store().await).await;
    }

    #[tokio::test]
    async fn aggregates_prices() {
        conformance::aggregates_prices(&store().await).await;
    }

    #[tokio::test]
    async fn negative_price_violates_table_constraint() {
        let store = store().await;
        let err = store
            .insert(conformance::new_book("1", "Broken", -1.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("CHECK constraint failed"));
    }

    #[test]
    fn filter_compiles_to_bound_sql() {
        let filter = Filter::all()
            .and(Condition::Text(Field::Name, TextMatch::StartsWith, "Rust".to_string()))
            .and(Condition::NotNull(Field::Detail));
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_BOOKS);
        push_filter(&mut builder, &filter);
        push_order(
            &mut builder,
            Some(OrderBy::new(Field::Price, crate::modules::books::query::Direction::Desc)),
        );

        assert_eq!(
            builder.sql(),
            "SELECT id, isbn, name, price, detail, register_date FROM book \
             WHERE substr(name, 1, ?) = ? AND detail IS NOT NULL \
             ORDER BY price DESC, id ASC"
        );
    }
}

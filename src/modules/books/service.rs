use std::sync::Arc;

use chrono::NaiveDate;

use super::error::{BookError, BookResult, Violation};
use super::models::{Book, BookFields, BookId, NewBook};
use super::query::{
    AggregateOp, Comparison, Condition, Direction, Field, Filter, OrderBy, TextMatch, Value,
};
use super::store::BookStore;

/// Query surface over the book collection.
///
/// Stateless: every call is one round trip to the injected store and store
/// failures are passed through untouched.
pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> BookResult<Vec<Book>> {
        self.find(Filter::all()).await
    }

    pub async fn get(&self, id: BookId) -> BookResult<Book> {
        self.store
            .find_one(id)
            .await?
            .ok_or(BookError::NotFound(id))
    }

    pub async fn create(&self, fields: BookFields) -> BookResult<Book> {
        let new_book = validate_new(fields)?;
        let book = self.store.insert(new_book).await?;
        tracing::info!(book_id = book.id, isbn = %book.isbn, "book created");
        Ok(book)
    }

    /// Merge `fields` onto the record; omitted fields are left untouched.
    pub async fn update(&self, id: BookId, fields: BookFields) -> BookResult<Book> {
        let violations = field_violations(&fields);
        if !violations.is_empty() {
            return Err(BookError::Validation(violations));
        }

        let book = self
            .store
            .update_by_id(id, &fields)
            .await?
            .ok_or(BookError::NotFound(id))?;
        tracing::info!(book_id = id, "book updated");
        Ok(book)
    }

    pub async fn remove(&self, id: BookId) -> BookResult<()> {
        if !self.store.delete_by_id(id).await? {
            return Err(BookError::NotFound(id));
        }
        tracing::info!(book_id = id, "book removed");
        Ok(())
    }

    /// Books whose name relates to `keyword` as `mode` says. An empty
    /// keyword matches every book.
    pub async fn search(&self, keyword: &str, mode: TextMatch) -> BookResult<Vec<Book>> {
        self.find(Filter::all().and(Condition::Text(Field::Name, mode, keyword.to_string())))
            .await
    }

    pub async fn order_by_price(&self, direction: Direction) -> BookResult<Vec<Book>> {
        let order = OrderBy::new(Field::Price, direction);
        Ok(self.store.find_many(&Filter::all(), Some(order)).await?)
    }

    pub async fn filter_price_greater_than(&self, threshold: f64) -> BookResult<Vec<Book>> {
        let threshold = finite("value", threshold)?;
        self.find(Filter::all().and(price(Comparison::Gt, threshold)))
            .await
    }

    pub async fn filter_price_less_than(&self, threshold: f64) -> BookResult<Vec<Book>> {
        let threshold = finite("value", threshold)?;
        self.find(Filter::all().and(price(Comparison::Lt, threshold)))
            .await
    }

    /// Inclusive `[low, high]`; both bounds always apply.
    pub async fn filter_price_between(&self, low: f64, high: f64) -> BookResult<Vec<Book>> {
        let low = finite("low", low)?;
        let high = finite("high", high)?;
        self.find(
            Filter::all()
                .and(price(Comparison::Gte, low))
                .and(price(Comparison::Lte, high)),
        )
        .await
    }

    pub async fn filter_detail_not_null(&self) -> BookResult<Vec<Book>> {
        self.find(Filter::all().and(Condition::NotNull(Field::Detail)))
            .await
    }

    pub async fn filter_detail_is_null(&self) -> BookResult<Vec<Book>> {
        self.find(Filter::all().and(Condition::IsNull(Field::Detail)))
            .await
    }

    pub async fn filter_by_exact_date(&self, date: NaiveDate) -> BookResult<Vec<Book>> {
        self.find(Filter::all().and(Condition::Equals(Field::RegisterDate, Value::Date(date))))
            .await
    }

    /// Inclusive `[start, end]` on the registration day.
    pub async fn filter_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BookResult<Vec<Book>> {
        self.find(
            Filter::all()
                .and(registered(Comparison::Gte, start))
                .and(registered(Comparison::Lte, end)),
        )
        .await
    }

    pub async fn filter_by_month(&self, year: i32, month: u32) -> BookResult<Vec<Book>> {
        let (start, end) = month_window(year, month)?;
        self.filter_by_date_range(start, end).await
    }

    pub async fn filter_by_year(&self, year: i32) -> BookResult<Vec<Book>> {
        let (start, _) = month_window(year, 1)?;
        let (_, end) = month_window(year, 12)?;
        self.filter_by_date_range(start, end).await
    }

    /// `op` over a numeric `field` across the whole collection. Over an empty
    /// collection `sum` is `0` and the other operations are `None`.
    pub async fn aggregate(&self, op: AggregateOp, field: Field) -> BookResult<Option<f64>> {
        if !field.is_numeric() {
            return Err(BookError::Validation(vec![Violation::new(
                "field",
                "aggregates need a numeric field",
            )]));
        }

        let value = self.store.aggregate(op, field).await?;
        Ok(match op {
            AggregateOp::Sum => Some(value.unwrap_or(0.0)),
            _ => value,
        })
    }

    pub async fn aggregate_sum(&self, field: Field) -> BookResult<f64> {
        Ok(self.aggregate(AggregateOp::Sum, field).await?.unwrap_or(0.0))
    }

    pub async fn aggregate_max(&self, field: Field) -> BookResult<Option<f64>> {
        self.aggregate(AggregateOp::Max, field).await
    }

    pub async fn aggregate_min(&self, field: Field) -> BookResult<Option<f64>> {
        self.aggregate(AggregateOp::Min, field).await
    }

    pub async fn aggregate_avg(&self, field: Field) -> BookResult<Option<f64>> {
        self.aggregate(AggregateOp::Avg, field).await
    }

    async fn find(&self, filter: Filter) -> BookResult<Vec<Book>> {
        Ok(self.store.find_many(&filter, None).await?)
    }
}

fn price(comparison: Comparison, bound: f64) -> Condition {
    Condition::Compare(Field::Price, comparison, Value::Number(bound))
}

fn registered(comparison: Comparison, day: NaiveDate) -> Condition {
    Condition::Compare(Field::RegisterDate, comparison, Value::Date(day))
}

fn finite(field: &'static str, value: f64) -> BookResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BookError::Validation(vec![Violation::new(
            field,
            "must be a finite number",
        )]))
    }
}

/// First and last day of `month` in `year`.
fn month_window(year: i32, month: u32) -> BookResult<(NaiveDate, NaiveDate)> {
    let invalid = || BookError::Validation(vec![Violation::new("month", "no such month")]);
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let end = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
    Ok((start, end))
}

/// Problems with the fields that are present.
fn field_violations(fields: &BookFields) -> Vec<Violation> {
    let mut violations = Vec::new();
    if fields.isbn.as_deref().is_some_and(|isbn| isbn.trim().is_empty()) {
        violations.push(Violation::new("isbn", "must not be blank"));
    }
    if fields.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        violations.push(Violation::new("name", "must not be blank"));
    }
    if fields
        .price
        .is_some_and(|price| !price.is_finite() || price < 0.0)
    {
        violations.push(Violation::new("price", "must be a non-negative number"));
    }
    violations
}

fn validate_new(fields: BookFields) -> BookResult<NewBook> {
    let mut violations = field_violations(&fields);
    if fields.isbn.is_none() {
        violations.push(Violation::new("isbn", "required"));
    }
    if fields.name.is_none() {
        violations.push(Violation::new("name", "required"));
    }
    if fields.price.is_none() {
        violations.push(Violation::new("price", "required"));
    }

    match fields {
        BookFields {
            isbn: Some(isbn),
            name: Some(name),
            price: Some(price),
            detail,
            register_date,
        } if violations.is_empty() => Ok(NewBook {
            isbn,
            name,
            price,
            detail: detail.flatten(),
            register_date: register_date.flatten(),
        }),
        _ => Err(BookError::Validation(violations)),
    }
}

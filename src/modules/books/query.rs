//! Declarative filters, orderings and aggregates over the book collection.
//!
//! These types are the vocabulary of the store contract. Every backend must
//! give them the same meaning; [`Filter::matches`] and [`OrderBy::compare`]
//! are the reference semantics used by the in-memory store.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::Book;

/// A column of the `book` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Isbn,
    Name,
    Price,
    Detail,
    RegisterDate,
}

impl Field {
    pub const fn column(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Isbn => "isbn",
            Field::Name => "name",
            Field::Price => "price",
            Field::Detail => "detail",
            Field::RegisterDate => "register_date",
        }
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, Field::Id | Field::Price)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::RegisterDate => "registerDate",
            other => other.column(),
        };
        f.write_str(name)
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "id" => Ok(Field::Id),
            "isbn" => Ok(Field::Isbn),
            "name" => Ok(Field::Name),
            "price" => Ok(Field::Price),
            "detail" => Ok(Field::Detail),
            "registerDate" | "register_date" => Ok(Field::RegisterDate),
            other => Err(format!("unknown field '{}'", other)),
        }
    }
}

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    /// Integers and floats compare numerically; other mixed kinds are
    /// incomparable.
    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Number(b)) => (*a as f64).partial_cmp(b),
            (Value::Number(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Substring relationship used by keyword search. Matching is
/// case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextMatch {
    #[default]
    Contains,
    StartsWith,
    EndsWith,
}

impl TextMatch {
    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        match self {
            TextMatch::Contains => haystack.contains(needle),
            TextMatch::StartsWith => haystack.starts_with(needle),
            TextMatch::EndsWith => haystack.ends_with(needle),
        }
    }
}

/// Strict and inclusive ordering comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub const fn operator(self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
        }
    }
}

/// One predicate on a single column. A null column satisfies only
/// [`Condition::IsNull`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Field, Value),
    Text(Field, TextMatch, String),
    Compare(Field, Comparison, Value),
    IsNull(Field),
    NotNull(Field),
}

impl Condition {
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            Condition::Equals(field, expected) => book
                .value(*field)
                .and_then(|actual| actual.compare(expected))
                .is_some_and(|ordering| ordering == Ordering::Equal),
            Condition::Text(field, mode, needle) => book
                .text(*field)
                .is_some_and(|haystack| mode.matches(haystack, needle)),
            Condition::Compare(field, comparison, bound) => book
                .value(*field)
                .and_then(|actual| actual.compare(bound))
                .is_some_and(|ordering| comparison.holds(ordering)),
            Condition::IsNull(field) => book.value(*field).is_none(),
            Condition::NotNull(field) => book.value(*field).is_some(),
        }
    }
}

/// Conjunction of conditions. The empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, book: &Book) -> bool {
        self.conditions.iter().all(|condition| condition.matches(book))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Sort key. Nulls sort first ascending and last descending; equal keys
/// fall back to ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: Field,
    pub direction: Direction,
}

impl OrderBy {
    pub const fn new(field: Field, direction: Direction) -> Self {
        Self { field, direction }
    }

    pub fn compare(&self, a: &Book, b: &Book) -> Ordering {
        let primary = match (a.value(self.field), b.value(self.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
        };
        let primary = match self.direction {
            Direction::Asc => primary,
            Direction::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Sum,
    Max,
    Min,
    Avg,
}

impl AggregateOp {
    pub const fn function(self) -> &'static str {
        match self {
            AggregateOp::Sum => "SUM",
            AggregateOp::Max => "MAX",
            AggregateOp::Min => "MIN",
            AggregateOp::Avg => "AVG",
        }
    }

    /// Fold `values`; `None` over an empty input for every operation.
    pub fn apply(self, values: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut count = 0usize;
        let mut acc = 0.0f64;
        for value in values {
            acc = match (self, count) {
                (_, 0) => value,
                (AggregateOp::Sum | AggregateOp::Avg, _) => acc + value,
                (AggregateOp::Max, _) => acc.max(value),
                (AggregateOp::Min, _) => acc.min(value),
            };
            count += 1;
        }

        match (self, count) {
            (_, 0) => None,
            (AggregateOp::Avg, n) => Some(acc / n as f64),
            _ => Some(acc),
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Max => "max",
            AggregateOp::Min => "min",
            AggregateOp::Avg => "avg",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: i64, name: &str, price: f64, detail: Option<&str>) -> Book {
        Book {
            id,
            isbn: format!("10{:02}", id),
            name: name.to_string(),
            price,
            detail: detail.map(str::to_string),
            register_date: None,
        }
    }

    #[test]
    fn text_match_is_case_sensitive() {
        assert!(TextMatch::Contains.matches("Flutter", "utt"));
        assert!(!TextMatch::Contains.matches("Flutter", "UTT"));
        assert!(TextMatch::StartsWith.matches("Flutter", "Flu"));
        assert!(!TextMatch::StartsWith.matches("Flutter", "ter"));
        assert!(TextMatch::EndsWith.matches("Flutter", "ter"));
    }

    #[test]
    fn empty_needle_matches_everything() {
        for mode in [TextMatch::Contains, TextMatch::StartsWith, TextMatch::EndsWith] {
            assert!(mode.matches("Flutter", ""));
        }
    }

    #[test]
    fn range_bounds_are_both_honoured() {
        let filter = Filter::all()
            .and(Condition::Compare(Field::Price, Comparison::Gte, Value::Int(900)))
            .and(Condition::Compare(Field::Price, Comparison::Lte, Value::Int(1500)));

        assert!(!filter.matches(&book(1, "a", 899.99, None)));
        assert!(filter.matches(&book(2, "b", 900.0, None)));
        assert!(filter.matches(&book(3, "c", 1500.0, None)));
        assert!(!filter.matches(&book(4, "d", 1500.01, None)));
    }

    #[test]
    fn strict_comparisons_exclude_the_bound() {
        let gt = Condition::Compare(Field::Price, Comparison::Gt, Value::Number(900.0));
        assert!(!gt.matches(&book(1, "a", 900.0, None)));
        assert!(gt.matches(&book(2, "b", 900.5, None)));

        let lt = Condition::Compare(Field::Price, Comparison::Lt, Value::Number(1000.0));
        assert!(!lt.matches(&book(3, "c", 1000.0, None)));
    }

    #[test]
    fn null_columns_only_match_is_null() {
        let nulled = book(1, "a", 1.0, None);
        assert!(Condition::IsNull(Field::Detail).matches(&nulled));
        assert!(!Condition::NotNull(Field::Detail).matches(&nulled));
        assert!(!Condition::Text(Field::Detail, TextMatch::Contains, String::new()).matches(&nulled));
        assert!(!Condition::Equals(Field::Detail, Value::Text(String::new())).matches(&nulled));
    }

    #[test]
    fn equals_compares_dates_by_day() {
        let mut dated = book(1, "a", 1.0, None);
        dated.register_date = NaiveDate::from_ymd_opt(2024, 5, 8);
        let day = |d| Value::Date(NaiveDate::from_ymd_opt(2024, 5, d).unwrap());

        assert!(Condition::Equals(Field::RegisterDate, day(8)).matches(&dated));
        assert!(!Condition::Equals(Field::RegisterDate, day(9)).matches(&dated));
    }

    #[test]
    fn order_breaks_ties_by_id() {
        let mut books = vec![
            book(3, "c", 900.0, None),
            book(1, "a", 1200.0, None),
            book(2, "b", 900.0, None),
        ];

        let desc = OrderBy::new(Field::Price, Direction::Desc);
        books.sort_by(|a, b| desc.compare(a, b));
        let ids: Vec<_> = books.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let asc = OrderBy::new(Field::Price, Direction::Asc);
        books.sort_by(|a, b| asc.compare(a, b));
        let ids: Vec<_> = books.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn nulls_sort_first_ascending_and_last_descending() {
        let mut books = vec![book(1, "a", 1.0, Some("x")), book(2, "b", 1.0, None)];

        books.sort_by(|a, b| OrderBy::new(Field::Detail, Direction::Asc).compare(a, b));
        assert_eq!(books[0].id, 2);

        books.sort_by(|a, b| OrderBy::new(Field::Detail, Direction::Desc).compare(a, b));
        assert_eq!(books[0].id, 1);
    }

    #[test]
    fn aggregates_over_values() {
        let prices = [800.0, 900.0, 1200.0];
        assert_eq!(AggregateOp::Sum.apply(prices), Some(2900.0));
        assert_eq!(AggregateOp::Max.apply(prices), Some(1200.0));
        assert_eq!(AggregateOp::Min.apply(prices), Some(800.0));
        let avg = AggregateOp::Avg.apply(prices).unwrap();
        assert!((avg - 966.666_666).abs() < 1e-3);
    }

    #[test]
    fn aggregates_over_nothing_are_null() {
        for op in [AggregateOp::Sum, AggregateOp::Max, AggregateOp::Min, AggregateOp::Avg] {
            assert_eq!(op.apply(std::iter::empty()), None);
        }
    }

    #[test]
    fn field_names_parse_in_both_spellings() {
        assert_eq!("registerDate".parse::<Field>(), Ok(Field::RegisterDate));
        assert_eq!("register_date".parse::<Field>(), Ok(Field::RegisterDate));
        assert!("title".parse::<Field>().is_err());
        assert_eq!(Field::RegisterDate.to_string(), "registerDate");
    }
}

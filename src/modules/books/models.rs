use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::query::{Field, Value};

/// Store-assigned book identifier. Never reused.
pub type BookId = i64;

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub isbn: String,
    pub name: String,
    pub price: f64,
    pub detail: Option<String>,
    pub register_date: Option<NaiveDate>,
}

impl Book {
    /// Current value of `field`, `None` when the column is null.
    pub fn value(&self, field: Field) -> Option<Value> {
        match field {
            Field::Id => Some(Value::Int(self.id)),
            Field::Isbn => Some(Value::Text(self.isbn.clone())),
            Field::Name => Some(Value::Text(self.name.clone())),
            Field::Price => Some(Value::Number(self.price)),
            Field::Detail => self.detail.clone().map(Value::Text),
            Field::RegisterDate => self.register_date.map(Value::Date),
        }
    }

    pub(crate) fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Isbn => Some(&self.isbn),
            Field::Name => Some(&self.name),
            Field::Detail => self.detail.as_deref(),
            Field::Id | Field::Price | Field::RegisterDate => None,
        }
    }
}

/// Validated values for a new record. Absent optional fields stay null.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub isbn: String,
    pub name: String,
    pub price: f64,
    pub detail: Option<String>,
    pub register_date: Option<NaiveDate>,
}

/// Caller-supplied field values for create and update.
///
/// For the nullable columns the outer `Option` says whether the field was
/// sent at all, so `"detail": null` clears it while omitting it leaves it
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookFields {
    pub isbn: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    pub detail: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub register_date: Option<Option<NaiveDate>>,
}

impl BookFields {
    pub fn is_empty(&self) -> bool {
        self.isbn.is_none()
            && self.name.is_none()
            && self.price.is_none()
            && self.detail.is_none()
            && self.register_date.is_none()
    }

    /// Overwrite the fields present in `self` onto `book`.
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(isbn) = &self.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(name) = &self.name {
            book.name = name.clone();
        }
        if let Some(price) = self.price {
            book.price = price;
        }
        if let Some(detail) = &self.detail {
            book.detail = detail.clone();
        }
        if let Some(register_date) = self.register_date {
            book.register_date = register_date;
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

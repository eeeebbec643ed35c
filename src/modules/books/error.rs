use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use bookshelf_http::AppError;

use super::models::BookId;
use super::store::StoreError;

pub type BookResult<T> = Result<T, BookError>;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub error: &'static str,
}

impl Violation {
    pub const fn new(field: &'static str, error: &'static str) -> Self {
        Self { field, error }
    }
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("invalid book request ({} violation(s))", .0.len())]
    Validation(Vec<Violation>),

    #[error("book {0} not found")]
    NotFound(BookId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation(violations) => {
                let details = violations
                    .iter()
                    .map(|v| json!({ "field": v.field, "error": v.error }))
                    .collect();
                AppError::validation(details, "invalid book request")
            }
            BookError::NotFound(id) => AppError::not_found(format!("book {} not found", id)),
            BookError::Store(store) => AppError::store(store.to_string()),
        }
    }
}

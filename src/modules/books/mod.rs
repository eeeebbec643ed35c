//! Book catalogue: CRUD plus the canned filter, ordering and aggregate
//! queries, served under `/api/books`.

pub mod error;
pub mod memory;
pub mod models;
pub mod query;
pub mod routes;
pub mod service;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Migration, Module};
use serde_json::json;

pub use error::{BookError, BookResult};
pub use memory::MemoryBookStore;
pub use models::{Book, BookFields, BookId, NewBook};
pub use service::BookService;
pub use sqlite::SqliteBookStore;
pub use store::{BookStore, StoreError};

pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self {
            service: Arc::new(BookService::new(store)),
        }
    }
}

/// Schema for the `book` table.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE IF NOT EXISTS book (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                isbn          TEXT NOT NULL,
                name          TEXT NOT NULL,
                price         REAL NOT NULL CHECK (price >= 0),
                detail        TEXT,
                register_date TEXT
            );
            CREATE INDEX IF NOT EXISTS book_price_idx ON book (price);
            CREATE INDEX IF NOT EXISTS book_register_date_idx ON book (register_date);
            "#,
    }]
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            backend = ?ctx.settings.database.backend,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_list(summary: &str, parameters: serde_json::Value) -> serde_json::Value {
    json!({
        "get": {
            "summary": summary,
            "tags": ["Books"],
            "parameters": parameters,
            "responses": {
                "200": {
                    "description": "Matching books",
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Book" }
                            }
                        }
                    }
                },
                "400": error_response("Malformed query"),
                "500": error_response("Store failure")
            }
        }
    })
}

fn query_param(name: &str, schema: serde_json::Value, required: bool) -> serde_json::Value {
    json!({ "name": name, "in": "query", "required": required, "schema": schema })
}

fn openapi_fragment() -> serde_json::Value {
    let number = json!({ "type": "number" });
    let date = json!({ "type": "string", "format": "date" });
    let integer = json!({ "type": "integer" });
    let id_param = json!([{
        "name": "id", "in": "path", "required": true,
        "schema": { "type": "integer", "format": "int64" }
    }]);
    let single_book = json!({
        "description": "Book",
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/Book" } }
        }
    });

    let book_array = json!({
        "description": "Matching books",
        "content": {
            "application/json": {
                "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } }
            }
        }
    });
    let fields_body = json!({
        "required": true,
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/BookFields" } }
        }
    });

    let mut paths = serde_json::Map::new();
    paths.insert(
        "/".to_string(),
        json!({
            "get": {
                "summary": "List books",
                "tags": ["Books"],
                "responses": {
                    "200": book_array,
                    "500": error_response("Store failure")
                }
            },
            "post": {
                "summary": "Create a book",
                "tags": ["Books"],
                "requestBody": fields_body,
                "responses": {
                    "201": single_book,
                    "400": error_response("Malformed body"),
                    "422": error_response("Validation error"),
                    "500": error_response("Store failure")
                }
            }
        }),
    );
    paths.insert(
        "/{id}".to_string(),
        json!({
            "get": {
                "summary": "Get a book",
                "tags": ["Books"],
                "parameters": id_param,
                "responses": {
                    "200": single_book,
                    "404": error_response("Book not found")
                }
            },
            "put": {
                "summary": "Update the fields present in the body",
                "tags": ["Books"],
                "parameters": id_param,
                "requestBody": fields_body,
                "responses": {
                    "200": single_book,
                    "404": error_response("Book not found"),
                    "422": error_response("Validation error")
                }
            },
            "delete": {
                "summary": "Remove a book",
                "tags": ["Books"],
                "parameters": id_param,
                "responses": {
                    "200": { "description": "Removed" },
                    "404": error_response("Book not found")
                }
            }
        }),
    );
    paths.insert(
        "/search".to_string(),
        json!({
            "post": {
                "summary": "Search book names",
                "tags": ["Books"],
                "requestBody": {
                    "required": true,
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/SearchRequest" }
                        }
                    }
                },
                "responses": { "200": book_array }
            }
        }),
    );

    let canned = [
        (
            "/order-by-price",
            "Books ordered by price",
            json!([query_param("direction", json!({ "type": "string", "enum": ["asc", "desc"] }), false)]),
        ),
        (
            "/price/gt",
            "Price strictly above",
            json!([query_param("value", number.clone(), true)]),
        ),
        (
            "/price/lt",
            "Price strictly below",
            json!([query_param("value", number.clone(), true)]),
        ),
        (
            "/price/between",
            "Price within an inclusive range",
            json!([query_param("low", number.clone(), true), query_param("high", number, true)]),
        ),
        ("/detail/not-null", "Books with a detail", json!([])),
        ("/detail/is-null", "Books without a detail", json!([])),
        (
            "/registered/day",
            "Registered on a day",
            json!([query_param("date", date.clone(), true)]),
        ),
        (
            "/registered/range",
            "Registered within an inclusive date range",
            json!([query_param("start", date.clone(), true), query_param("end", date, true)]),
        ),
        (
            "/registered/month",
            "Registered in a calendar month",
            json!([query_param("year", integer.clone(), true), query_param("month", integer.clone(), true)]),
        ),
        (
            "/registered/year",
            "Registered in a calendar year",
            json!([query_param("year", integer, true)]),
        ),
    ];
    for (path, summary, parameters) in canned {
        paths.insert(path.to_string(), book_list(summary, parameters));
    }

    paths.insert(
        "/aggregate/{op}".to_string(),
        json!({
            "get": {
                "summary": "Aggregate a numeric field over all books",
                "tags": ["Books"],
                "parameters": [
                    {
                        "name": "op", "in": "path", "required": true,
                        "schema": { "type": "string", "enum": ["sum", "max", "min", "avg"] }
                    },
                    query_param("field", json!({ "type": "string", "enum": ["price", "id"] }), false)
                ],
                "responses": {
                    "200": {
                        "description": "Aggregate value, null when nothing to aggregate",
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/AggregateResponse" }
                            }
                        }
                    },
                    "422": error_response("Non-numeric field")
                }
            }
        }),
    );
    paths.insert(
        "/health".to_string(),
        json!({
            "get": {
                "summary": "Books health check",
                "tags": ["Books"],
                "responses": {
                    "200": {
                        "description": "OK",
                        "content": { "text/plain": { "schema": { "type": "string" } } }
                    }
                }
            }
        }),
    );

    json!({ "paths": paths, "components": { "schemas": schemas() } })
}

fn schemas() -> serde_json::Value {
    json!({
        "Book": {
            "type": "object",
            "properties": {
                "id": { "type": "integer", "format": "int64" },
                "isbn": { "type": "string" },
                "name": { "type": "string" },
                "price": { "type": "number", "minimum": 0 },
                "detail": { "type": ["string", "null"] },
                "registerDate": { "type": ["string", "null"], "format": "date" }
            },
            "required": ["id", "isbn", "name", "price", "detail", "registerDate"]
        },
        "BookFields": {
            "type": "object",
            "properties": {
                "isbn": { "type": "string" },
                "name": { "type": "string" },
                "price": { "type": "number", "minimum": 0 },
                "detail": { "type": ["string", "null"] },
                "registerDate": { "type": ["string", "null"], "format": "date" }
            },
            "additionalProperties": false
        },
        "SearchRequest": {
            "type": "object",
            "properties": {
                "keyword": { "type": "string" },
                "mode": { "type": "string", "enum": ["contains", "startsWith", "endsWith"] }
            },
            "required": ["keyword"]
        },
        "AggregateResponse": {
            "type": "object",
            "properties": {
                "op": { "type": "string" },
                "field": { "type": "string" },
                "value": { "type": ["number", "null"] }
            }
        }
    })
}

/// Create the books module over `store`.
pub fn create_module(store: Arc<dyn BookStore>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store))
}

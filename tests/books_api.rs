mod common;

use axum::http::StatusCode;
use axum::Router;
use serde_json::{json, Value};

use bookshelf_kernel::settings::StoreBackend;
use common::{delete, get, send, with_json};

const BACKENDS: [StoreBackend; 2] = [StoreBackend::Memory, StoreBackend::Sqlite];

async fn seed(router: &Router) -> Vec<Value> {
    let mut created = Vec::new();
    for body in [
        json!({"isbn": "1001", "name": "Node.js", "price": 800, "registerDate": "2024-05-08"}),
        json!({"isbn": "1002", "name": "React", "price": 900, "registerDate": "2024-05-31"}),
        json!({"isbn": "1003", "name": "Rust in Action", "price": 1200,
               "detail": "systems programming", "registerDate": "2024-12-01"}),
    ] {
        let (status, book) = send(router, with_json("POST", "/api/books", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        created.push(book);
    }
    created
}

fn names(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn create_list_order_remove_then_update_is_not_found() {
    for backend in BACKENDS {
        let app = common::app(backend).await;
        let router = app.router();

        let (status, flutter) = send(
            &router,
            with_json("POST", "/api/books", json!({"isbn": "1004", "name": "Flutter", "price": 850})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = flutter["id"].as_i64().unwrap();

        let (status, listed) = send(&router, get("/api/books")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0], flutter);

        let (_, ordered) = send(&router, get("/api/books/order-by-price")).await;
        assert_eq!(names(&ordered), vec!["Flutter"]);

        let (status, removed) = send(&router, delete(&format!("/api/books/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed, json!({"message": "success"}));

        let (status, body) = send(
            &router,
            with_json("PUT", &format!("/api/books/{id}"), json!({"price": 900})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{backend:?}");
        assert_eq!(body["error"]["code"], "not_found");

        app.stop().await.unwrap();
    }
}

#[tokio::test]
async fn update_merges_fields() {
    for backend in BACKENDS {
        let app = common::app(backend).await;
        let router = app.router();
        let seeded = seed(&router).await;
        let id = seeded[0]["id"].as_i64().unwrap();

        let (status, updated) = send(
            &router,
            with_json(
                "PUT",
                &format!("/api/books/{id}"),
                json!({"isbn": "10024", "price": 900, "detail": "runtime"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["isbn"], "10024");
        assert_eq!(updated["price"], 900.0);
        assert_eq!(updated["name"], "Node.js");
        assert_eq!(updated["registerDate"], "2024-05-08");

        let (_, fetched) = send(&router, get(&format!("/api/books/{id}"))).await;
        assert_eq!(fetched, updated, "{backend:?}");
    }
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let app = common::app(StoreBackend::Memory).await;
    let router = app.router();

    let (status, body) = send(
        &router,
        with_json("POST", "/api/books", json!({"name": "No isbn", "price": -1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["details"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &router,
        with_json("POST", "/api/books", json!({"id": 5, "isbn": "1", "name": "x", "price": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &router,
        with_json("POST", "/api/books", json!({"isbn": "1", "name": "x", "price": "cheap"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/books")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"isbn\": "))
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = send(&router, get("/api/books/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn canned_queries_agree_across_backends() {
    let queries = [
        "/api/books/order-by-price",
        "/api/books/order-by-price?direction=asc",
        "/api/books/price/gt?value=800",
        "/api/books/price/lt?value=1200",
        "/api/books/price/between?low=800&high=900",
        "/api/books/price/between?low=1000&high=100",
        "/api/books/detail/not-null",
        "/api/books/detail/is-null",
        "/api/books/registered/day?date=2024-05-31",
        "/api/books/registered/range?start=2024-05-01&end=2024-06-30",
        "/api/books/registered/month?year=2024&month=5",
        "/api/books/registered/year?year=2024",
    ];

    let mut results: Vec<Vec<Value>> = Vec::new();
    for backend in BACKENDS {
        let app = common::app(backend).await;
        let router = app.router();
        seed(&router).await;

        let mut answers = Vec::new();
        for uri in queries {
            let (status, body) = send(&router, get(uri)).await;
            assert_eq!(status, StatusCode::OK, "{uri} on {backend:?}");
            answers.push(body);
        }
        results.push(answers);
    }

    assert_eq!(results[0], results[1]);
    let memory = &results[0];
    assert_eq!(names(&memory[0]), vec!["Rust in Action", "React", "Node.js"]);
    assert_eq!(names(&memory[1]), vec!["Node.js", "React", "Rust in Action"]);
    assert_eq!(names(&memory[2]), vec!["React", "Rust in Action"]);
    assert_eq!(names(&memory[3]), vec!["Node.js", "React"]);
    assert_eq!(names(&memory[4]), vec!["Node.js", "React"]);
    assert!(names(&memory[5]).is_empty());
    assert_eq!(names(&memory[6]), vec!["Rust in Action"]);
    assert_eq!(names(&memory[8]), vec!["React"]);
    assert_eq!(names(&memory[10]), vec!["Node.js", "React"]);
    assert_eq!(memory[11].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn search_modes() {
    for backend in BACKENDS {
        let app = common::app(backend).await;
        let router = app.router();
        seed(&router).await;

        let search = |keyword: &str, mode: Option<&str>| {
            let mut body = json!({"keyword": keyword});
            if let Some(mode) = mode {
                body["mode"] = json!(mode);
            }
            with_json("POST", "/api/books/search", body)
        };

        let (_, found) = send(&router, search("eac", None)).await;
        assert_eq!(names(&found), vec!["React"]);
        let (_, found) = send(&router, search("react", None)).await;
        assert!(names(&found).is_empty(), "{backend:?} matched case-insensitively");
        let (_, found) = send(&router, search("R", Some("startsWith"))).await;
        assert_eq!(names(&found), vec!["React", "Rust in Action"]);
        let (_, found) = send(&router, search("js", Some("endsWith"))).await;
        assert_eq!(names(&found), vec!["Node.js"]);
        let (_, found) = send(&router, search("", Some("endsWith"))).await;
        assert_eq!(found.as_array().unwrap().len(), 3);

        let (status, _) = send(&router, search("x", Some("fuzzy"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn aggregates() {
    for backend in BACKENDS {
        let app = common::app(backend).await;
        let router = app.router();

        let (_, empty_sum) = send(&router, get("/api/books/aggregate/sum")).await;
        assert_eq!(empty_sum["value"], 0.0);
        let (_, empty_avg) = send(&router, get("/api/books/aggregate/avg")).await;
        assert_eq!(empty_avg["value"], Value::Null);

        seed(&router).await;
        for (op, expected) in [("sum", 2900.0), ("max", 1200.0), ("min", 800.0)] {
            let (status, body) =
                send(&router, get(&format!("/api/books/aggregate/{op}?field=price"))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["op"], op);
            assert_eq!(body["field"], "price");
            assert_eq!(body["value"], expected, "{op} on {backend:?}");
        }

        let (status, _) = send(&router, get("/api/books/aggregate/median")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = common::app(StoreBackend::Memory).await;
    let (status, doc) = send(&app.router(), get("/docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/books"]["post"].is_object());
    assert!(doc["paths"]["/api/books/{id}"]["delete"].is_object());
    assert!(doc["components"]["schemas"]["ErrorResponse"].is_object());
}

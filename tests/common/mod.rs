#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use bookshelf_app::Application;
use bookshelf_kernel::settings::{DatabaseSettings, Settings, StoreBackend};

pub async fn app(backend: StoreBackend) -> Application {
    let database = match backend {
        StoreBackend::Memory => DatabaseSettings {
            backend,
            ..DatabaseSettings::default()
        },
        StoreBackend::Sqlite => DatabaseSettings::sqlite_in_memory(),
    };
    let app = Application::build(Settings {
        database,
        ..Settings::default()
    })
    .await
    .unwrap();
    app.start().await.unwrap();
    app
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

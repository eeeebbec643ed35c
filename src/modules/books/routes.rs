use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use bookshelf_http::AppError;

use super::models::{Book, BookFields, BookId};
use super::query::{AggregateOp, Direction, Field, TextMatch};
use super::service::BookService;

type ApiResult<T> = Result<T, AppError>;

pub fn router(service: Arc<BookService>) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/health", get(health_check))
        .route("/search", post(search_books))
        .route("/order-by-price", get(order_by_price))
        .route("/price/gt", get(price_greater_than))
        .route("/price/lt", get(price_less_than))
        .route("/price/between", get(price_between))
        .route("/detail/not-null", get(detail_not_null))
        .route("/detail/is-null", get(detail_is_null))
        .route("/registered/day", get(registered_on))
        .route("/registered/range", get(registered_between))
        .route("/registered/month", get(registered_in_month))
        .route("/registered/year", get(registered_in_year))
        .route("/aggregate/{op}", get(aggregate))
        .route(
            "/{id}",
            get(get_book).put(update_book).delete(remove_book),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
    #[serde(default)]
    pub mode: TextMatch,
}

#[derive(Debug, Deserialize)]
pub struct OrderParams {
    #[serde(default = "descending")]
    pub direction: Direction,
}

fn descending() -> Direction {
    Direction::Desc
}

#[derive(Debug, Deserialize)]
pub struct ThresholdParams {
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct PriceRangeParams {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Deserialize)]
pub struct DayParams {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct MonthParams {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct YearParams {
    pub year: i32,
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub field: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AggregateResponse {
    pub op: AggregateOp,
    pub field: String,
    pub value: Option<f64>,
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(State(service): State<Arc<BookService>>) -> ApiResult<Json<Vec<Book>>> {
    Ok(Json(service.list_all().await?))
}

async fn get_book(
    State(service): State<Arc<BookService>>,
    id: Result<Path<BookId>, PathRejection>,
) -> ApiResult<Json<Book>> {
    let Path(id) = id?;
    Ok(Json(service.get(id).await?))
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    body: Result<Json<BookFields>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let Json(fields) = body?;
    let book = service.create(fields).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(service): State<Arc<BookService>>,
    id: Result<Path<BookId>, PathRejection>,
    body: Result<Json<BookFields>, JsonRejection>,
) -> ApiResult<Json<Book>> {
    let Path(id) = id?;
    let Json(fields) = body?;
    Ok(Json(service.update(id, fields).await?))
}

async fn remove_book(
    State(service): State<Arc<BookService>>,
    id: Result<Path<BookId>, PathRejection>,
) -> ApiResult<Json<JsonValue>> {
    let Path(id) = id?;
    service.remove(id).await?;
    Ok(Json(json!({ "message": "success" })))
}

async fn search_books(
    State(service): State<Arc<BookService>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Json(request) = body?;
    Ok(Json(service.search(&request.keyword, request.mode).await?))
}

async fn order_by_price(
    State(service): State<Arc<BookService>>,
    params: Result<Query<OrderParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(service.order_by_price(params.direction).await?))
}

async fn price_greater_than(
    State(service): State<Arc<BookService>>,
    params: Result<Query<ThresholdParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(service.filter_price_greater_than(params.value).await?))
}

async fn price_less_than(
    State(service): State<Arc<BookService>>,
    params: Result<Query<ThresholdParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(service.filter_price_less_than(params.value).await?))
}

async fn price_between(
    State(service): State<Arc<BookService>>,
    params: Result<Query<PriceRangeParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(
        service.filter_price_between(params.low, params.high).await?,
    ))
}

async fn detail_not_null(
    State(service): State<Arc<BookService>>,
) -> ApiResult<Json<Vec<Book>>> {
    Ok(Json(service.filter_detail_not_null().await?))
}

async fn detail_is_null(State(service): State<Arc<BookService>>) -> ApiResult<Json<Vec<Book>>> {
    Ok(Json(service.filter_detail_is_null().await?))
}

async fn registered_on(
    State(service): State<Arc<BookService>>,
    params: Result<Query<DayParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(service.filter_by_exact_date(params.date).await?))
}

async fn registered_between(
    State(service): State<Arc<BookService>>,
    params: Result<Query<DateRangeParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(
        service.filter_by_date_range(params.start, params.end).await?,
    ))
}

async fn registered_in_month(
    State(service): State<Arc<BookService>>,
    params: Result<Query<MonthParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(
        service.filter_by_month(params.year, params.month).await?,
    ))
}

async fn registered_in_year(
    State(service): State<Arc<BookService>>,
    params: Result<Query<YearParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Book>>> {
    let Query(params) = params?;
    Ok(Json(service.filter_by_year(params.year).await?))
}

async fn aggregate(
    State(service): State<Arc<BookService>>,
    op: Result<Path<AggregateOp>, PathRejection>,
    params: Result<Query<AggregateParams>, QueryRejection>,
) -> ApiResult<Json<AggregateResponse>> {
    let Path(op) = op?;
    let Query(params) = params?;
    let field = match params.field.as_deref() {
        Some(raw) => raw.parse::<Field>().map_err(AppError::bad_request)?,
        None => Field::Price,
    };

    let value = service.aggregate(op, field).await?;
    Ok(Json(AggregateResponse {
        op,
        field: field.to_string(),
        value,
    }))
}

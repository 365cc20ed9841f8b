//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use product_store::InMemoryProductStore;
use serde_json::{Value, json};
use service::handlers::DEFAULT_STOCK_DESTINATION;
use service::{InMemoryNotifications, InMemoryPublisher, StoreUnitOfWork};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let state = api::create_default_state(InMemoryProductStore::new()).unwrap();
    api::create_app(state, get_metrics_handle())
}

fn setup_with_recorders() -> (axum::Router, InMemoryPublisher, InMemoryNotifications) {
    let publisher = InMemoryPublisher::new();
    let notifications = InMemoryNotifications::new();
    let state = api::create_state(
        StoreUnitOfWork::new(InMemoryProductStore::new()),
        publisher.clone(),
        notifications.clone(),
    )
    .unwrap();
    (
        api::create_app(state, get_metrics_handle()),
        publisher,
        notifications,
    )
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
}

async fn post_batch(app: &axum::Router, reference: &str, sku: &str, qty: u32, eta: Option<&str>) {
    let (status, _) = post(
        app,
        "/batch",
        json!({ "ref": reference, "sku": sku, "qty": qty, "eta": eta }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_status_and_health() {
    let app = setup();

    let (status, json) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "on-line");

    let (status, json) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_happy_path_allocates_earliest_batch() {
    let app = setup();
    post_batch(&app, "later-batch", "LAMP", 100, Some("2011-01-02")).await;
    post_batch(&app, "early-batch", "LAMP", 100, Some("2011-01-01")).await;
    post_batch(&app, "other-batch", "TABLE", 100, None).await;

    let (status, json) = post(
        &app,
        "/allocate",
        json!({ "order_id": "order-1", "sku": "LAMP", "qty": 3 }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["batchref"], "early-batch");
}

#[tokio::test]
async fn test_unknown_sku_is_bad_request() {
    let app = setup();

    let (status, json) = post(
        &app,
        "/allocate",
        json!({ "order_id": "order-1", "sku": "NOPE", "qty": 3 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid sku NOPE");
}

#[tokio::test]
async fn test_out_of_stock_returns_no_batch_and_notifies() {
    let (app, _, notifications) = setup_with_recorders();
    post_batch(&app, "b1", "LAMP", 10, None).await;

    let (status, json) = post(
        &app,
        "/allocate",
        json!({ "order_id": "order-1", "sku": "LAMP", "qty": 20 }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(json["batchref"].is_null());
    assert_eq!(
        notifications.sent_to(DEFAULT_STOCK_DESTINATION).await,
        vec!["Out of stock for LAMP".to_string()]
    );
}

#[tokio::test]
async fn test_allocations_are_queryable() {
    let app = setup();
    post_batch(&app, "b1", "LAMP", 10, None).await;
    post(
        &app,
        "/allocate",
        json!({ "order_id": "order-1", "sku": "LAMP", "qty": 4 }),
    )
    .await;

    let (status, json) = get(&app, "/allocations/order-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!([{ "order_id": "order-1", "sku": "LAMP", "batch_reference": "b1", "qty": 4 }])
    );

    let (status, json) = get(&app, "/allocations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_order_is_not_found() {
    let app = setup();

    let (status, json) = get(&app, "/allocations/unknown-order").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["message"].as_str().unwrap().contains("unknown-order"));
}

#[tokio::test]
async fn test_deallocate_releases_from_latest_batch() {
    let (app, publisher, _) = setup_with_recorders();
    post_batch(&app, "b1", "LAMP", 10, None).await;
    post(
        &app,
        "/allocate",
        json!({ "order_id": "order-1", "sku": "LAMP", "qty": 4 }),
    )
    .await;

    let (status, json) = post(&app, "/deallocate", json!({ "sku": "LAMP" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order_id"], "order-1");

    let (status, json) = post(&app, "/deallocate", json!({ "sku": "LAMP" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["order_id"].is_null());

    assert_eq!(
        publisher.channels().await,
        vec!["BatchCreated", "Allocated", "Deallocated"]
    );
}

#[tokio::test]
async fn test_duplicate_batch_is_bad_request() {
    let app = setup();
    post_batch(&app, "b1", "LAMP", 10, None).await;

    let (status, json) = post(
        &app,
        "/batch",
        json!({ "ref": "b1", "sku": "TABLE", "qty": 10, "eta": null }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Batch b1 already exists");
}

#[tokio::test]
async fn test_change_quantity() {
    let app = setup();
    post_batch(&app, "b1", "LAMP", 10, None).await;
    post(
        &app,
        "/allocate",
        json!({ "order_id": "order-1", "sku": "LAMP", "qty": 8 }),
    )
    .await;

    let (status, json) = post(&app, "/change_quantity", json!({ "ref": "b1", "qty": 5 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");

    let (status, _) = get(&app, "/allocations/order-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/change_quantity", json!({ "ref": "nope", "qty": 5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    post_batch(&app, "b1", "LAMP", 10, None).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

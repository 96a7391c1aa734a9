//! HTTP surface tests
//!
//! Drive the router end to end over the in-memory store.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use stock_server::{create_app, AppState, Config};
use tower::ServiceExt;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = create_app(AppState::new(store(), Config::default()));

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "connected");
}

#[tokio::test]
async fn test_register_agent_and_list() {
    let app = create_app(AppState::new(store(), Config::default()));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/agents",
        Some(json!({ "name": "Ana", "email": "Ana@Example.com", "is_admin": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "ana@example.com");

    let (status, body) = send(&app, Method::GET, "/api/v1/agents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_sale_flow_over_http() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let phone = batch(&store, "iPhone 13", 5, "3000").await;
    let app = create_app(AppState::new(store.clone(), Config::default()));

    let (status, allocation) = send(
        &app,
        Method::POST,
        "/api/v1/distributions",
        Some(json!({ "batch_id": phone.id, "agent_id": ana.id, "quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let allocation_id = allocation["id"].as_i64().unwrap();

    let checkout = |quantity: Value| {
        json!({
            "customer": {
                "name": "Maria Souza",
                "phone": "11999990000",
                "address": "Rua das Flores, 42"
            },
            "lines": [{
                "allocation_id": allocation_id,
                "quantity": quantity,
                "custom_price": "R$ 2.900,00"
            }],
            "seller_id": ana.id,
            "payment": { "method": "pix" }
        })
    };

    let (status, body) = send(&app, Method::POST, "/api/v1/sales", Some(checkout(json!("3")))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["sale_group_id"].as_str().unwrap().starts_with("sale_"));
    assert_eq!(body["sale_total"], "8700.00");

    let (status, body) = send(&app, Method::POST, "/api/v1/sales", Some(checkout(json!(3)))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["error"]["kind"], "INSUFFICIENT_STOCK");
    assert!(body["error"]["message_pt"]
        .as_str()
        .unwrap()
        .starts_with("Estoque insuficiente"));

    let (status, body) = send(&app, Method::GET, "/api/v1/sales?sort=highest_value", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_items"], 1);
    assert_eq!(body["data"][0]["lines"][0]["quantity"], 3);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/stock?agent_id={}", ana.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_quantity"], 2);
}

#[tokio::test]
async fn test_validation_error_envelope() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let phone = batch(&store, "iPhone 13", 5, "3000").await;
    let app = create_app(AppState::new(store.clone(), Config::default()));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/distributions",
        Some(json!({ "batch_id": phone.id, "agent_id": ana.id, "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["kind"], "INVALID_INPUT");
    assert_eq!(body["error"]["field"], "quantity");
    assert_eq!(remaining(&store, phone.id).await, 5);
}

#[tokio::test]
async fn test_unknown_resources_are_not_found() {
    let app = create_app(AppState::new(store(), Config::default()));

    let (status, body) = send(&app, Method::GET, "/api/v1/catalog/batches/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "NOT_FOUND");

    let (status, _) = send(&app, Method::GET, "/api/v1/sales/lines/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/stock/allocations/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_registration_and_patch() {
    let app = create_app(AppState::new(store(), Config::default()));

    let (status, batch) = send(
        &app,
        Method::POST,
        "/api/v1/catalog/batches",
        Some(json!({
            "name": "Galaxy S23",
            "color": "Preto",
            "unit_cost_usd": "400",
            "exchange_rate": "5.25",
            "quantity": 3
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(batch["unit_price"], "2100.00");
    let id = batch["id"].as_i64().unwrap();

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/catalog/batches/{}", id),
        Some(json!({ "color": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["color"], Value::Null);
    assert_eq!(updated["name"], "Galaxy S23");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/catalog/batches/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

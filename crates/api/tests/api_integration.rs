//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Product;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::services::InMemoryInventoryService;
use saga::{InMemoryCollaborators, SagaConfig};
use serde_json::{Value, json};
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

fn setup_with(services: &InMemoryCollaborators) -> axum::Router {
    let state = Arc::new(AppState::new(
        services.collaborators(),
        SagaConfig::default(),
    ));
    api::create_app(state, get_metrics_handle())
}

fn setup() -> (axum::Router, InMemoryCollaborators) {
    let services = InMemoryCollaborators::new();
    (setup_with(&services), services)
}

async fn post_rpc(app: axum::Router, body: impl Into<Body>) -> Value {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc")
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn call(app: axum::Router, method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1});
    post_rpc(app, request.to_string()).await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_sale_flow_completes() {
    let (app, services) = setup();
    services.storefront.set_selection(vec![(2, 2)]);

    let response = call(app, "run_sale_flow", Value::Null).await;

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"], json!({}));
    assert!(response.get("error").is_none());
    assert_eq!(services.inventory.stock_of(2), Some(8));
}

#[tokio::test]
async fn test_sale_flow_reports_degraded_steps() {
    let (app, services) = setup();
    services.storefront.set_selection(vec![(2, 1)]);
    services.transport.set_fail(true);

    let response = call(app, "run_sale_flow", json!({})).await;

    assert_eq!(response["result"], json!({"degraded": ["request_shipment"]}));
}

#[tokio::test]
async fn test_sale_flow_shortage() {
    let (app, services) = setup();
    // showroom product 9 has 4 in stock
    services.storefront.set_selection(vec![(9, 6)]);

    let response = call(app, "run_sale_flow", Value::Null).await;

    assert_eq!(
        response["result"],
        json!({"shortages": [
            {"name": "Wardrobe", "stock_actual": 4, "cantidad_solicitada": 6}
        ]})
    );
    assert_eq!(services.billing.invoice_count(), 0);
}

#[tokio::test]
async fn test_sale_flow_validation_unavailable() {
    let (app, services) = setup();
    services.storefront.set_selection(vec![(2, 1)]);
    services.inventory.set_fail_on_validate(true);

    let response = call(app, "run_sale_flow", Value::Null).await;

    assert_eq!(response["result"]["shortages"], json!([]));
    assert!(
        response["result"]["reason"]
            .as_str()
            .unwrap()
            .contains("Validation unavailable")
    );
}

#[tokio::test]
async fn test_sale_flow_failure_is_saga_error() {
    let (app, services) = setup();
    services.storefront.set_selection(vec![(2, 1)]);
    services.billing.set_fail_on_generate(true);

    let response = call(app, "run_sale_flow", Value::Null).await;

    assert!(response.get("result").is_none());
    assert_eq!(response["error"]["code"], -32000);
    assert_eq!(response["error"]["data"]["step"], "generate_invoice");
    assert_eq!(response["error"]["data"]["state"], "FAILED");
    assert_eq!(response["error"]["data"]["class"], "transport");
}

#[tokio::test]
async fn test_replenishment_flow() {
    let services = InMemoryCollaborators {
        inventory: InMemoryInventoryService::with_products(vec![
            Product {
                id: 1,
                name: "Sofa".to_string(),
                category: "Living Room".to_string(),
                unit_price: 1200.0,
                stock: 3,
            },
            Product {
                id: 2,
                name: "Lamp".to_string(),
                category: "Lighting".to_string(),
                unit_price: 40.0,
                stock: 12,
            },
        ]),
        ..InMemoryCollaborators::default()
    };
    let app = setup_with(&services);

    let response = call(app, "run_replenishment_flow", json!({"origin": "warehouse"})).await;

    let result = &response["result"];
    assert_eq!(result["message"], "replenishment completed");
    let purchased = result["purchased"].as_array().unwrap();
    assert_eq!(purchased.len(), 1);
    assert_eq!(purchased[0]["id"], 1);
    assert_eq!(purchased[0]["quantity"], 17);
    assert_eq!(services.inventory.stock_of(1), Some(20));
}

#[tokio::test]
async fn test_replenishment_nothing_to_do() {
    let services = InMemoryCollaborators {
        inventory: InMemoryInventoryService::with_products(vec![]),
        ..InMemoryCollaborators::default()
    };
    let app = setup_with(&services);

    let response = call(app, "run_replenishment_flow", Value::Null).await;

    assert_eq!(
        response["result"],
        json!({"message": "no replenishment needed", "purchased": []})
    );
}

#[tokio::test]
async fn test_parse_error() {
    let (app, _) = setup();

    let response = post_rpc(app, "{not json").await;

    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_invalid_request() {
    let (app, _) = setup();

    let response = post_rpc(app, json!({"jsonrpc": "2.0", "id": 4}).to_string()).await;

    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 4);
}

#[tokio::test]
async fn test_method_not_found() {
    let (app, _) = setup();

    let response = call(app, "reserve_inventory", Value::Null).await;

    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_invalid_params() {
    let (app, services) = setup();

    let response = call(app, "run_replenishment_flow", json!({"origin": 42})).await;

    assert_eq!(response["error"]["code"], -32602);
    assert_eq!(services.inventory.catalog_load_count(), 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, services) = setup();
    services.storefront.set_selection(vec![(3, 1)]);
    call(app.clone(), "run_sale_flow", Value::Null).await;

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
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_executions_total"));
}

#[tokio::test]
async fn test_default_state_builds_rpc_collaborators() {
    let config = api::config::Config::default();
    assert!(api::create_default_state(&config).is_ok());
}

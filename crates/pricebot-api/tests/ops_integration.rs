//! Integration tests for health, metrics, and the admin gate

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tower::ServiceExt;

use pricebot_api::{AppState, build_router};
use pricebot_config::Config;
use pricebot_extraction::Capabilities;
use pricebot_store::Store;

async fn test_app(config_toml: &str) -> Router {
    let config: Config = config_toml.parse().unwrap();
    let store = Arc::new(Store::new_memory().await.unwrap());
    let state = AppState::assemble(config, store, Capabilities::disabled());
    build_router(state)
}

async fn get(app: &Router, uri: &str, auth: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(json!({})))
}

#[tokio::test]
async fn test_health() {
    let app = test_app("").await;
    let (status, body) = get(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_shape() {
    let app = test_app("").await;
    let (status, body) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ingest"].is_object());
    assert_eq!(body["ingest"]["documents_uploaded"], 0);
    assert!(body["whatsapp"]["totals"].is_object());
    assert!(body["whatsapp"]["recent_failures"].is_array());
}

#[tokio::test]
async fn test_admin_open_in_local_environment() {
    let app = test_app("").await;
    let (status, body) = get(&app, "/admin/diagnostics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counts"]["vendors"], 0);
}

#[tokio::test]
async fn test_admin_requires_basic_auth_outside_local() {
    let config = "[server]\nenvironment = \"staging\"\n\
                  [admin]\nusername = \"ops\"\npassword = \"hunter2\"\n";
    let app = test_app(config).await;

    let (status, _) = get(&app, "/admin/diagnostics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = format!("Basic {}", BASE64.encode("ops:wrong"));
    let (status, _) = get(&app, "/admin/diagnostics", Some(&wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let good = format!("Basic {}", BASE64.encode("ops:hunter2"));
    let (status, body) = get(&app, "/admin/diagnostics", Some(&good)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["environment"], "staging");
}

#[tokio::test]
async fn test_admin_unconfigured_outside_local_is_503() {
    let app = test_app("[server]\nenvironment = \"staging\"\n").await;
    let (status, _) = get(&app, "/admin/diagnostics", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_whatsapp_failures_show_up_in_metrics() {
    let config = "[whatsapp]\ningest_token = \"t0k\"\n";
    let app = test_app(config).await;

    // Rejected intake with a wrong token
    let request = Request::builder()
        .method(Method::POST)
        .uri("/integrations/whatsapp/ingest")
        .header("content-type", "application/json")
        .header("x-ingest-token", "wrong")
        .body(Body::from(
            json!({"client_id": "c1", "messages": [{"chat_title": "Deals", "text": "x"}]})
                .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (_, body) = get(&app, "/metrics", None).await;
    assert_eq!(body["whatsapp"]["totals"]["auth_failures"], 1);
    let failures = body["whatsapp"]["recent_failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["status_code"], 401);
    assert_eq!(failures[0]["client_id"], "c1");
}

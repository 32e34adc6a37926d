//! Integration tests for the chat tool endpoints

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::NaiveDate;
use pricebot_ingest::RawOffer;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use pricebot_api::{AppState, build_router};
use pricebot_config::Config;
use pricebot_extraction::Capabilities;
use pricebot_store::Store;

async fn test_app() -> (Router, AppState) {
    let config = Config::default();
    let store = Arc::new(Store::new_memory().await.unwrap());
    let state = AppState::assemble(config, store, Capabilities::disabled());
    (build_router(state.clone()), state)
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(json!({})))
}

fn at(day: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, day)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn offer_row(
    description: &str,
    price: &str,
    day: u32,
    condition: Option<&str>,
    location: Option<&str>,
) -> RawOffer {
    let mut row = RawOffer::new(description, price.parse::<Decimal>().unwrap());
    row.captured_at = Some(at(day));
    row.condition = condition.map(str::to_string);
    row.location = location.map(str::to_string);
    row
}

/// Seed: two products, two vendors, several offers
async fn seed(state: &AppState) {
    let conn = state.store.connect().unwrap();

    let acme = vec![
        offer_row("iPhone 11 64GB Black", "485.00", 10, Some("A"), Some("Dubai")),
        offer_row("iPhone 11 64GB Black", "470.00", 12, Some("A"), Some("Dubai")),
        offer_row("Pixel 9 128GB", "700", 11, Some("New"), Some("Hong Kong")),
    ];
    state
        .ingestion
        .ingest(&conn, &acme, Some("Acme"), None, None)
        .await
        .unwrap();

    let bolt = vec![offer_row(
        "iPhone 11 64GB Black",
        "455.00",
        14,
        Some("B"),
        Some("Miami"),
    )];
    state
        .ingestion
        .ingest(&conn, &bolt, Some("Bolt Trading"), None, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_resolve_products_substring() {
    let (app, state) = test_app().await;
    seed(&state).await;

    let (status, body) = post_json(
        &app,
        "/chat/tools/products/resolve",
        &json!({"query": "iphone 11"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["products"][0]["canonical_name"], "iPhone 11 64GB Black");
    assert_eq!(body["products"][0]["match_source"], "substring");
    assert!(body["next_offset"].is_null());
}

#[tokio::test]
async fn test_resolve_blank_query_is_422() {
    let (app, _) = test_app().await;
    let (status, _) = post_json(
        &app,
        "/chat/tools/products/resolve",
        &json!({"query": "   "}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_best_price_picks_lowest_with_alternates() {
    let (app, state) = test_app().await;
    seed(&state).await;

    let (status, body) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({"query": "iphone 11", "limit": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let bundle = &body["results"][0];
    assert_eq!(bundle["best_offer"]["price"], "455.00");
    let alternates = bundle["alternate_offers"].as_array().unwrap();
    assert_eq!(alternates.len(), 2);
    // Ascending price after the best
    assert_eq!(alternates[0]["price"], "470.00");
    assert_eq!(alternates[1]["price"], "485.00");
}

#[tokio::test]
async fn test_best_price_filters() {
    let (app, state) = test_app().await;
    seed(&state).await;

    // Condition narrows to the B-grade Miami unit
    let (_, body) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({"query": "iphone 11", "filters": {"condition": "b"}}),
    )
    .await;
    assert_eq!(body["results"][0]["best_offer"]["price"], "455.00");
    assert!(body["results"][0]["alternate_offers"].as_array().unwrap().is_empty());

    // Location substring match
    let (_, body) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({"query": "iphone 11", "filters": {"location": "dub"}}),
    )
    .await;
    assert_eq!(body["results"][0]["best_offer"]["price"], "470.00");

    // Price window
    let (_, body) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({"query": "iphone 11", "filters": {"min_price": 480.0, "max_price": 500.0}}),
    )
    .await;
    assert_eq!(body["results"][0]["best_offer"]["price"], "485.00");

    // captured_since cuts off the older captures
    let (_, body) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({"query": "iphone 11", "filters": {"captured_since": "2025-01-13T00:00:00Z"}}),
    )
    .await;
    assert_eq!(body["results"][0]["best_offer"]["price"], "455.00");
    assert!(body["results"][0]["alternate_offers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_best_price_inverted_range_is_422() {
    let (app, _) = test_app().await;
    let (status, body) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({"query": "iphone", "filters": {"min_price": 500.0, "max_price": 100.0}}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_best_price_unknown_vendor_is_404() {
    let (app, state) = test_app().await;
    seed(&state).await;

    let (status, _) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({
            "query": "iphone 11",
            "filters": {"vendor_id": "00000000-0000-0000-0000-000000000001"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_best_price_no_match_returns_empty_results() {
    let (app, state) = test_app().await;
    seed(&state).await;

    let (status, body) = post_json(
        &app,
        "/chat/tools/offers/search-best-price",
        &json!({"query": "walkie talkie"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body["results"].as_array().unwrap().is_empty());
}

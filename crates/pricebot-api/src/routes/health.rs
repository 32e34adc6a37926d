//! Liveness endpoint

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(healthcheck))
}

async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

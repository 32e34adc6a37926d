//! Operations endpoints: metrics and admin diagnostics

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/diagnostics", get(diagnostics))
}

/// Counters plus the recent-failure ring
async fn metrics(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ingest": state.ingest_metrics.snapshot(),
        "whatsapp": {
            "totals": state.whatsapp_metrics.totals(),
            "clients": state.whatsapp_metrics.snapshot(),
            "recent_failures": state.whatsapp_metrics.recent_failures(10),
        },
    }))
}

/// Entity counts and recent activity for operators
async fn diagnostics(State(state): State<AppState>) -> Result<Json<Value>> {
    let conn = state.store.connect()?;

    let vendors = pricebot_store::VendorRepo::new(&conn).count().await?;
    let products = pricebot_store::ProductRepo::new(&conn).count().await?;
    let offers = pricebot_store::OfferRepo::new(&conn).count().await?;
    let documents = pricebot_store::DocumentRepo::new(&conn).count().await?;

    let recent_documents: Vec<Value> = pricebot_store::DocumentRepo::new(&conn)
        .list(10, 0)
        .await?
        .into_iter()
        .map(|doc| {
            json!({
                "id": doc.id,
                "file_name": doc.file_name,
                "status": doc.status,
                "ingestion_errors": doc
                    .extra
                    .as_ref()
                    .and_then(|extra| extra.get("ingestion_errors"))
                    .cloned()
                    .unwrap_or(Value::Array(Vec::new())),
            })
        })
        .collect();

    Ok(Json(json!({
        "metadata": {
            "service": state.config.server.app_name,
            "environment": state.config.server.environment,
        },
        "counts": {
            "vendors": vendors,
            "products": products,
            "offers": offers,
            "documents": documents,
        },
        "recent_documents": recent_documents,
        "feature_flags": {
            "llm_extraction": state.capabilities.llm.is_some(),
            "vision": state.capabilities.vision.is_some(),
            "embeddings": state.capabilities.embeddings.is_some(),
            "default_currency": state.config.ingestion.default_currency,
        },
    })))
}

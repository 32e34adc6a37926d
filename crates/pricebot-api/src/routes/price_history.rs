//! Price-history read endpoints

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use pricebot_store::repos::history::HistoryRepo;
use pricebot_store::PriceSpan;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::state::AppState;
use crate::types::wire_time;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/price-history/product/{id}", get(history_for_product))
        .route("/price-history/vendor/{id}", get(history_for_vendor))
}

/// Wire shape for one span
#[derive(Debug, Serialize)]
pub struct SpanOut {
    pub product_id: Uuid,
    pub vendor_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    #[serde(with = "wire_time")]
    pub valid_from: chrono::NaiveDateTime,
    #[serde(with = "wire_time::option")]
    pub valid_to: Option<chrono::NaiveDateTime>,
}

impl From<PriceSpan> for SpanOut {
    fn from(span: PriceSpan) -> Self {
        Self {
            product_id: span.product_id,
            vendor_id: span.vendor_id,
            price: span.price,
            currency: span.currency,
            valid_from: span.valid_from,
            valid_to: span.valid_to,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HistoryList {
    spans: Vec<SpanOut>,
}

async fn history_for_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryList>> {
    let limit = query.limit.unwrap_or(200).clamp(1, 1000);
    let conn = state.store.connect()?;
    let spans = HistoryRepo::new(&conn)
        .list_for_product(&id, limit)
        .await?
        .into_iter()
        .map(SpanOut::from)
        .collect();
    Ok(Json(HistoryList { spans }))
}

async fn history_for_vendor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryList>> {
    let limit = query.limit.unwrap_or(200).clamp(1, 1000);
    let conn = state.store.connect()?;
    let spans = HistoryRepo::new(&conn)
        .list_for_vendor(&id, limit)
        .await?
        .into_iter()
        .map(SpanOut::from)
        .collect();
    Ok(Json(HistoryList { spans }))
}

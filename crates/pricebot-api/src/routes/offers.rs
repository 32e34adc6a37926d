//! Offer read endpoints

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use pricebot_store::{Offer, OfferFilter, OfferRepo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::state::AppState;
use crate::types::wire_time;

pub fn routes() -> Router<AppState> {
    Router::new().route("/offers", get(list_offers))
}

/// Wire shape for one offer
#[derive(Debug, Serialize)]
pub struct OfferOut {
    pub id: Uuid,
    pub product_id: Uuid,
    pub vendor_id: Uuid,
    pub source_document_id: Option<Uuid>,
    #[serde(with = "wire_time")]
    pub captured_at: chrono::NaiveDateTime,
    pub price: Decimal,
    pub currency: String,
    pub quantity: Option<i64>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl From<Offer> for OfferOut {
    fn from(offer: Offer) -> Self {
        Self {
            id: offer.id,
            product_id: offer.product_id,
            vendor_id: offer.vendor_id,
            source_document_id: offer.source_document_id,
            captured_at: offer.captured_at,
            price: offer.price,
            currency: offer.currency,
            quantity: offer.quantity,
            condition: offer.condition,
            location: offer.location,
            notes: offer.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OfferQuery {
    vendor_id: Option<Uuid>,
    product_id: Option<Uuid>,
    document_id: Option<Uuid>,
    #[serde(default, with = "wire_time::option")]
    since: Option<chrono::NaiveDateTime>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct OfferList {
    offers: Vec<OfferOut>,
}

async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<OfferQuery>,
) -> Result<Json<OfferList>> {
    let filter = OfferFilter {
        vendor_id: query.vendor_id,
        product_id: query.product_id,
        source_document_id: query.document_id,
        since: query.since,
        ..Default::default()
    };
    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let conn = state.store.connect()?;
    let offers = OfferRepo::new(&conn)
        .list(&filter, limit)
        .await?
        .into_iter()
        .map(OfferOut::from)
        .collect();

    Ok(Json(OfferList { offers }))
}

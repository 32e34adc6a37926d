//! Vendor read endpoints

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use pricebot_store::{Vendor, VendorRepo};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::Pagination;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendors", get(list_vendors))
        .route("/vendors/{id}", get(get_vendor))
}

/// Wire shape for one vendor
#[derive(Debug, Serialize)]
pub struct VendorOut {
    pub id: Uuid,
    pub name: String,
    pub contact_info: Option<serde_json::Value>,
}

impl From<Vendor> for VendorOut {
    fn from(vendor: Vendor) -> Self {
        Self {
            id: vendor.id,
            name: vendor.name,
            contact_info: vendor.contact_info,
        }
    }
}

#[derive(Debug, Serialize)]
struct VendorList {
    vendors: Vec<VendorOut>,
    total: u64,
}

async fn list_vendors(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<VendorList>> {
    let (limit, offset) = pagination.clamped(200);

    let conn = state.store.connect()?;
    let repo = VendorRepo::new(&conn);
    let vendors = repo
        .list(limit, offset)
        .await?
        .into_iter()
        .map(VendorOut::from)
        .collect();
    let total = repo.count().await?;

    Ok(Json(VendorList { vendors, total }))
}

async fn get_vendor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VendorOut>> {
    let conn = state.store.connect()?;
    let vendor = VendorRepo::new(&conn)
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("vendor", id))?;
    Ok(Json(VendorOut::from(vendor)))
}

//! Chat tool endpoints
//!
//! The retrieval surface behind the conversational UI: product resolution
//! (substring search with optional embedding augmentation) and best-price
//! lookup with filters.

use std::collections::HashSet;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use pricebot_catalog::cosine_similarity;
use pricebot_store::{AliasRepo, OfferFilter, OfferRepo, ProductRepo, VendorRepo};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::routes::offers::OfferOut;
use crate::routes::products::ProductOut;
use crate::state::AppState;
use crate::types::wire_time;

/// Substring hits below this trigger the embedding fallback
const EMBEDDING_AUGMENT_THRESHOLD: usize = 3;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/tools/products/resolve", post(resolve_products))
        .route(
            "/chat/tools/offers/search-best-price",
            post(search_best_price),
        )
}

// =============================================================================
// Product resolution
// =============================================================================

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    5
}

#[derive(Debug, Serialize)]
struct ProductCandidate {
    #[serde(flatten)]
    product: ProductOut,
    match_source: &'static str,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    products: Vec<ProductCandidate>,
    total: u64,
    limit: usize,
    offset: usize,
    next_offset: Option<usize>,
}

async fn resolve_products(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>> {
    let query = validate_query(&request.query)?;
    let limit = request.limit.clamp(1, 10);

    let conn = state.store.connect()?;
    let (candidates, total) =
        resolve_candidates(&state, &conn, &query, limit, request.offset).await?;

    let next_offset =
        (request.offset + candidates.len() < total as usize).then(|| request.offset + candidates.len());

    Ok(Json(ResolveResponse {
        products: candidates,
        total,
        limit,
        offset: request.offset,
        next_offset,
    }))
}

/// Shared resolution core: substring search, then embedding augmentation
/// when the result set is thin
async fn resolve_candidates(
    state: &AppState,
    conn: &turso::Connection,
    query: &str,
    limit: usize,
    offset: usize,
) -> Result<(Vec<ProductCandidate>, u64)> {
    let products = ProductRepo::new(conn);

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut candidates: Vec<ProductCandidate> = Vec::new();
    for product in products.search(query, limit, offset).await? {
        seen.insert(product.id);
        candidates.push(ProductCandidate {
            product: ProductOut::from(product),
            match_source: "substring",
        });
    }
    let mut total = products.search_count(query).await?;

    if candidates.len() < EMBEDDING_AUGMENT_THRESHOLD
        && let Some(embeddings) = state.capabilities.embeddings.as_ref()
        && let Ok(query_vector) = embeddings.embed(query).await
    {
        let aliases = AliasRepo::new(conn);
        let threshold = state.config.extraction.embedding_similarity_threshold;
        let cap = state.config.extraction.embedding_candidate_cap;

        let mut scored: Vec<(f32, Uuid)> = aliases
            .list_with_embeddings(cap)
            .await?
            .into_iter()
            .filter_map(|alias| {
                let vector = alias.embedding.as_deref()?;
                let score = cosine_similarity(&query_vector, vector);
                (score >= threshold && !seen.contains(&alias.product_id))
                    .then_some((score, alias.product_id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (_, product_id) in scored {
            if candidates.len() >= limit {
                break;
            }
            if !seen.insert(product_id) {
                continue;
            }
            if let Some(product) = products.get_by_id(&product_id).await? {
                candidates.push(ProductCandidate {
                    product: ProductOut::from(product),
                    match_source: "embedding",
                });
                total += 1;
            }
        }
    }

    Ok((candidates, total))
}

fn validate_query(raw: &str) -> Result<String> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(ApiError::validation("query", "must not be blank"));
    }
    if query.len() > 200 {
        return Err(ApiError::validation("query", "must be at most 200 characters"));
    }
    Ok(query.to_string())
}

// =============================================================================
// Best price
// =============================================================================

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
struct OfferSearchFilters {
    vendor_id: Option<Uuid>,
    condition: Option<String>,
    location: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    #[serde(default, with = "wire_time::option")]
    captured_since: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
struct BestPriceRequest {
    query: String,
    #[serde(default)]
    filters: OfferSearchFilters,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Serialize)]
struct ProductOfferBundle {
    product: ProductCandidate,
    best_offer: Option<OfferOut>,
    alternate_offers: Vec<OfferOut>,
}

#[derive(Debug, Serialize)]
struct BestPriceResponse {
    results: Vec<ProductOfferBundle>,
    total: u64,
    limit: usize,
    offset: usize,
    next_offset: Option<usize>,
    applied_filters: OfferSearchFilters,
}

async fn search_best_price(
    State(state): State<AppState>,
    Json(request): Json<BestPriceRequest>,
) -> Result<Json<BestPriceResponse>> {
    let query = validate_query(&request.query)?;
    let limit = request.limit.clamp(1, 10);
    let filter = build_filter(&request.filters)?;

    let conn = state.store.connect()?;

    if let Some(vendor_id) = request.filters.vendor_id {
        VendorRepo::new(&conn)
            .get_by_id(&vendor_id)
            .await?
            .ok_or_else(|| ApiError::not_found("vendor", vendor_id))?;
    }

    let (candidates, total) =
        resolve_candidates(&state, &conn, &query, limit, request.offset).await?;

    let offers = OfferRepo::new(&conn);
    let mut results = Vec::new();
    for candidate in candidates {
        let ranked = offers
            .ranked_for_product(&candidate.product.id, &filter, limit)
            .await?;
        let mut ranked: Vec<OfferOut> = ranked.into_iter().map(OfferOut::from).collect();
        let best_offer = if ranked.is_empty() {
            None
        } else {
            Some(ranked.remove(0))
        };
        results.push(ProductOfferBundle {
            product: candidate,
            best_offer,
            alternate_offers: ranked,
        });
    }

    let next_offset =
        (request.offset + results.len() < total as usize).then(|| request.offset + results.len());

    Ok(Json(BestPriceResponse {
        results,
        total,
        limit,
        offset: request.offset,
        next_offset,
        applied_filters: request.filters,
    }))
}

fn build_filter(filters: &OfferSearchFilters) -> Result<OfferFilter> {
    let min_price = filters
        .min_price
        .map(|value| {
            Decimal::from_f64(value)
                .filter(|price| *price >= Decimal::ZERO)
                .ok_or_else(|| ApiError::validation("filters.min_price", "must be a non-negative number"))
        })
        .transpose()?;
    let max_price = filters
        .max_price
        .map(|value| {
            Decimal::from_f64(value)
                .filter(|price| *price >= Decimal::ZERO)
                .ok_or_else(|| ApiError::validation("filters.max_price", "must be a non-negative number"))
        })
        .transpose()?;

    if let (Some(min), Some(max)) = (min_price, max_price)
        && min > max
    {
        return Err(ApiError::validation(
            "filters.min_price",
            "must not exceed max_price",
        ));
    }

    Ok(OfferFilter {
        vendor_id: filters.vendor_id,
        condition: filters
            .condition
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        location: filters
            .location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        min_price,
        max_price,
        since: filters.captured_since,
        ..Default::default()
    })
}

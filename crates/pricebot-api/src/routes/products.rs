//! Product read endpoints

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use pricebot_store::{AliasRepo, Product, ProductRepo};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::Pagination;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
}

/// Wire shape for one product
#[derive(Debug, Serialize)]
pub struct ProductOut {
    pub id: Uuid,
    pub canonical_name: String,
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub upc: Option<String>,
    pub category: Option<String>,
    pub spec: Option<serde_json::Value>,
}

impl From<Product> for ProductOut {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            canonical_name: product.canonical_name,
            brand: product.brand,
            model_number: product.model_number,
            upc: product.upc,
            category: product.category,
            spec: product.spec,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProductList {
    products: Vec<ProductOut>,
    total: u64,
}

async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ProductList>> {
    let (limit, offset) = pagination.clamped(200);

    let conn = state.store.connect()?;
    let repo = ProductRepo::new(&conn);
    let products = repo
        .list(limit, offset)
        .await?
        .into_iter()
        .map(ProductOut::from)
        .collect();
    let total = repo.count().await?;

    Ok(Json(ProductList { products, total }))
}

#[derive(Debug, Serialize)]
struct ProductDetail {
    #[serde(flatten)]
    product: ProductOut,
    aliases: Vec<String>,
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductDetail>> {
    let conn = state.store.connect()?;
    let product = ProductRepo::new(&conn)
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("product", id))?;
    let aliases = AliasRepo::new(&conn)
        .list_for_product(&id)
        .await?
        .into_iter()
        .map(|alias| alias.alias_text)
        .collect();

    Ok(Json(ProductDetail {
        product: ProductOut::from(product),
        aliases,
    }))
}

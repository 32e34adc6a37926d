//! API routes
//!
//! Domain-grouped HTTP route handlers.

pub mod chat_tools;
pub mod documents;
pub mod health;
pub mod offers;
pub mod ops;
pub mod price_history;
pub mod products;
pub mod vendors;
pub mod whatsapp;

use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::auth::admin_basic_auth;
use crate::state::AppState;

/// Build the complete API router
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .merge(ops::admin_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_basic_auth,
        ));

    Router::new()
        // Liveness + metrics (no auth)
        .merge(health::routes())
        .merge(ops::routes())
        // Upload pipeline and read paths
        .merge(documents::routes())
        .merge(offers::routes())
        .merge(products::routes())
        .merge(vendors::routes())
        .merge(price_history::routes())
        // Chat tool endpoints
        .merge(chat_tools::routes())
        // Collector intake
        .merge(whatsapp::routes())
        // Operator routes behind basic auth
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

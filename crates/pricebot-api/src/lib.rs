//! Pricebot API
//!
//! HTTP surface for the price-intelligence service.
//!
//! # Overview
//!
//! Built on Axum. Handlers receive every service handle through
//! [`AppState`]; there are no globals. The surface splits into:
//!
//! - the upload pipeline (`/documents/*`) answering 202 + job polling
//! - read paths (`/offers`, `/products`, `/vendors`, `/price-history/*`)
//! - chat tools (`/chat/tools/*`)
//! - the authenticated collector intake (`/integrations/whatsapp/ingest`)
//! - operations (`/health`, `/metrics`, basic-auth `/admin/*`)
//!
//! # Usage
//!
//! ```ignore
//! use pricebot_api::{AppState, build_router};
//!
//! let state = AppState::assemble(config, store, capabilities);
//! let app = build_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod types;
pub mod whatsapp;

pub use error::{ApiError, Result};
pub use ratelimit::{ClientRateLimiter, RateLimitConfig};
pub use routes::build_router;
pub use state::AppState;

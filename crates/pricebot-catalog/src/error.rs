//! Catalog error types

use thiserror::Error;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors from entity resolution, offer ingestion, and history planning
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Persistence failure
    #[error(transparent)]
    Store(#[from] pricebot_store::StoreError),

    /// A new observation cannot be reconciled with the stored span set
    #[error("price history conflict: {0}")]
    HistoryConflict(String),
}

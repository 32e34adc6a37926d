//! Extraction capability errors

use thiserror::Error;

/// Result type for capability calls
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Errors from the optional extraction backends.
///
/// Callers treat every variant as `dependency_unavailable`: the row or
/// document records a warning and processing continues.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The capability is disabled or missing configuration
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The remote call failed
    #[error("capability request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with something we cannot use
    #[error("capability returned malformed payload: {0}")]
    Malformed(String),

    /// The local outbound budget is exhausted
    #[error("outbound request budget exhausted")]
    Throttled,
}

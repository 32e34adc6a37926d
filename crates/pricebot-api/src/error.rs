//! API error types
//!
//! Provides structured error responses for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request parameters
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Schema-level validation failure
    #[error("validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Authentication required or token mismatch
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Bad or stale signature
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Per-client budget exhausted
    #[error("rate limited")]
    RateLimited {
        /// Seconds until the bucket refills
        retry_after: u64,
    },

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// No processor accepts the uploaded file
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Server-side configuration missing for this endpoint
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Artefact could not be written
    #[error("storage failure: {0}")]
    Storage(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "invalid_request",
            Self::Validation { .. } => "invalid_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::UnsupportedFileType(_) => "unsupported_file_type",
            Self::Unavailable(_) => "dependency_unavailable",
            Self::Storage(_) => "storage_failure",
            Self::Internal(_) => "internal_error",
        }
    }

    // Helper constructors

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} '{id}' not found"))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<pricebot_store::StoreError> for ApiError {
    fn from(e: pricebot_store::StoreError) -> Self {
        match e {
            pricebot_store::StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} '{id}' not found"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<pricebot_catalog::CatalogError> for ApiError {
    fn from(e: pricebot_catalog::CatalogError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<pricebot_ingest::ProcessorError> for ApiError {
    fn from(e: pricebot_ingest::ProcessorError) -> Self {
        match e {
            pricebot_ingest::ProcessorError::UnsupportedFileType { extension } => {
                Self::UnsupportedFileType(extension)
            }
            pricebot_ingest::ProcessorError::UnknownProcessor { name } => {
                Self::BadRequest(format!("unknown processor '{name}'"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub error: &'static str,
    /// Error message (human-readable)
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.code(),
            detail: self.to_string(),
        };

        tracing::warn!(
            error_code = body.error,
            detail = %body.detail,
            status = %status,
            "API error"
        );

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_str(&seconds.to_string())
                    .unwrap_or(axum::http::HeaderValue::from_static("60")),
            );
        }
        response
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

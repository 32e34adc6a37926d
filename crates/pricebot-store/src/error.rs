//! Store error types

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error
    #[error("database error: {0}")]
    Database(#[from] turso::Error),

    /// Row lookup came up empty
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity kind (e.g., "product")
        entity: &'static str,
        /// Identifier that missed
        id: String,
    },

    /// UNIQUE constraint violation mapped to the colliding entity
    #[error("{entity} '{key}' already exists")]
    AlreadyExists {
        /// Entity kind
        entity: &'static str,
        /// Conflicting key
        key: String,
    },

    /// A stored value failed to decode (timestamp, decimal, JSON column)
    #[error("invalid stored {field}: {message}")]
    Corrupt {
        /// Column name
        field: &'static str,
        /// Decode failure detail
        message: String,
    },

    /// Price-history invariants would be violated
    #[error("price history conflict: {0}")]
    HistoryConflict(String),
}

impl StoreError {
    /// Create a NotFound error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an AlreadyExists error
    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.into(),
        }
    }

    /// Create a Corrupt error
    pub fn corrupt(field: &'static str, message: impl ToString) -> Self {
        Self::Corrupt {
            field,
            message: message.to_string(),
        }
    }

    /// True when the underlying failure is a UNIQUE constraint violation
    pub fn is_unique_violation(err: &turso::Error) -> bool {
        err.to_string().contains("UNIQUE constraint")
    }
}

//! Job runner error types

use thiserror::Error;

/// Result type for job operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors surfaced by the background runner
#[derive(Debug, Error)]
pub enum JobError {
    /// Persistence failure
    #[error(transparent)]
    Store(#[from] pricebot_store::StoreError),

    /// Canonicalization failure
    #[error(transparent)]
    Catalog(#[from] pricebot_catalog::CatalogError),

    /// Extraction failure that sinks the artefact
    #[error(transparent)]
    Processor(#[from] pricebot_ingest::ProcessorError),

    /// The job queue is at capacity
    #[error("job queue full")]
    QueueFull,

    /// A row the job needs is gone
    #[error("{entity} '{id}' is missing")]
    Missing {
        /// Entity kind
        entity: &'static str,
        /// Identifier
        id: String,
    },

    /// The stored artefact file is gone
    #[error("stored artefact missing at '{0}'")]
    ArtefactMissing(String),
}

impl JobError {
    pub fn missing(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Missing {
            entity,
            id: id.into(),
        }
    }
}

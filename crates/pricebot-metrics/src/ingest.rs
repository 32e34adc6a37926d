//! Ingestion pipeline counters

use serde::Serialize;

use crate::Counter;

/// Totals for the upload pipeline and job runner
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Documents accepted through the upload endpoint
    pub documents_uploaded: Counter,
    /// Documents that reached `processed`
    pub documents_processed: Counter,
    /// Documents that reached `processed_with_warnings`
    pub documents_with_warnings: Counter,
    /// Documents that reached `failed`
    pub documents_failed: Counter,
    /// Offers persisted by the ingestion service
    pub offers_ingested: Counter,
    /// Row-level warnings recorded by processors
    pub rows_warned: Counter,
    /// Jobs currently enqueued or running (approximate, inc/dec)
    pub jobs_enqueued: Counter,
    /// Jobs that finished in any terminal state
    pub jobs_completed: Counter,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy for serialization
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            documents_uploaded: self.documents_uploaded.get(),
            documents_processed: self.documents_processed.get(),
            documents_with_warnings: self.documents_with_warnings.get(),
            documents_failed: self.documents_failed.get(),
            offers_ingested: self.offers_ingested.get(),
            rows_warned: self.rows_warned.get(),
            jobs_enqueued: self.jobs_enqueued.get(),
            jobs_completed: self.jobs_completed.get(),
        }
    }
}

/// Serializable snapshot of [`IngestMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct IngestSnapshot {
    pub documents_uploaded: u64,
    pub documents_processed: u64,
    pub documents_with_warnings: u64,
    pub documents_failed: u64,
    pub offers_ingested: u64,
    pub rows_warned: u64,
    pub jobs_enqueued: u64,
    pub jobs_completed: u64,
}

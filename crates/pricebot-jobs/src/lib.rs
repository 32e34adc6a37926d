//! Pricebot - Jobs
//!
//! Asynchronous document processing and the debounced WhatsApp extraction
//! path.
//!
//! # Architecture
//!
//! ```text
//! upload ──► enqueue(job_id) ──► bounded mpsc ──► worker pool ──► JobExecutor
//!
//! whatsapp batch ──► ExtractionScheduler (one timer per chat)
//!                          │ debounce elapses
//!                          ▼
//!                    WhatsAppExtractor ──► OfferIngestionService
//! ```
//!
//! Failures never retry automatically; terminal state plus structured logs
//! land on the job row and the startup reconciler sweeps anything a hard
//! shutdown abandoned.

pub mod debounce;
pub mod error;
pub mod executor;
pub mod extract;
pub mod reconcile;
pub mod runner;

pub use debounce::ExtractionScheduler;
pub use error::{JobError, Result};
pub use executor::JobExecutor;
pub use extract::{ChatExtractor, ExtractionSummary, WhatsAppExtractor};
pub use reconcile::reconcile_stale_jobs;
pub use runner::{JobRunner, RunnerConfig};

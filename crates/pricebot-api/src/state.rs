//! Application state
//!
//! One [`AppState`] owns every long-lived service handle: the store, the
//! processor registry, the offer ingestion service, the job runner, the
//! debounced WhatsApp extractor, metrics, and the per-client rate limiter.
//! Handlers receive it by axum state extraction; nothing is global.

use std::sync::Arc;
use std::time::Duration;

use pricebot_catalog::{OfferIngestionService, PairLocks, ResolverSettings};
use pricebot_config::Config;
use pricebot_extraction::Capabilities;
use pricebot_ingest::ProcessorRegistry;
use pricebot_jobs::{ExtractionScheduler, JobExecutor, JobRunner, RunnerConfig, WhatsAppExtractor};
use pricebot_metrics::{IngestMetrics, WhatsAppMetrics};
use pricebot_store::Store;

use crate::ratelimit::{ClientRateLimiter, RateLimitConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub registry: ProcessorRegistry,
    pub capabilities: Capabilities,
    pub ingestion: Arc<OfferIngestionService>,
    pub runner: Arc<JobRunner>,
    pub scheduler: Arc<ExtractionScheduler>,
    pub ingest_metrics: Arc<IngestMetrics>,
    pub whatsapp_metrics: Arc<WhatsAppMetrics>,
    pub limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    /// Wire every service from config + store + capabilities.
    ///
    /// Must run inside a tokio runtime (the job runner spawns workers).
    pub fn assemble(config: Config, store: Arc<Store>, capabilities: Capabilities) -> Self {
        let config = Arc::new(config);
        let registry = ProcessorRegistry::new();
        let ingest_metrics = Arc::new(IngestMetrics::new());
        let whatsapp_metrics = Arc::new(WhatsAppMetrics::new());

        let settings = ResolverSettings {
            similarity_threshold: config.extraction.embedding_similarity_threshold,
            candidate_cap: config.extraction.embedding_candidate_cap,
        };
        let ingestion = Arc::new(OfferIngestionService::new(
            settings,
            config.ingestion.default_currency.clone(),
            capabilities.embeddings.clone(),
            Arc::new(PairLocks::new()),
        ));

        let executor = Arc::new(JobExecutor::new(
            Arc::clone(&store),
            registry,
            Arc::clone(&ingestion),
            capabilities.clone(),
            Arc::clone(&ingest_metrics),
            config.ingestion.default_currency.clone(),
            config.ingestion.min_pdf_text_chars,
        ));
        let runner = Arc::new(JobRunner::start(
            executor,
            RunnerConfig {
                workers: config.ingestion.effective_job_workers(),
                queue_size: config.ingestion.job_queue_size,
            },
        ));

        let extractor = Arc::new(WhatsAppExtractor::new(
            Arc::clone(&store),
            Arc::clone(&ingestion),
            Arc::clone(&whatsapp_metrics),
            config.whatsapp.extract_max_messages,
        ));
        let scheduler = Arc::new(ExtractionScheduler::new(
            Duration::from_secs_f64(config.whatsapp.extract_debounce_seconds.max(0.0)),
            extractor,
        ));

        let limiter = Arc::new(ClientRateLimiter::new(RateLimitConfig::new(
            config.whatsapp.ingest_rate_limit_per_minute,
            config.whatsapp.ingest_rate_limit_burst,
        )));

        Self {
            config,
            store,
            registry,
            capabilities,
            ingestion,
            runner,
            scheduler,
            ingest_metrics,
            whatsapp_metrics,
            limiter,
        }
    }
}

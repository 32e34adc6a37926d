//! Single-job execution
//!
//! One job = one artefact: select the processor, extract rows, run the
//! offer ingestion service, and walk the document and job rows to their
//! terminal states. The offer batch and the document's terminal status
//! commit in one transaction; a mid-batch failure rolls everything back
//! and marks both rows `failed`.

use std::path::Path;
use std::sync::Arc;

use pricebot_catalog::OfferIngestionService;
use pricebot_extraction::Capabilities;
use pricebot_ingest::{IngestContext, ProcessorRegistry};
use pricebot_metrics::IngestMetrics;
use pricebot_store::{
    DocumentRepo, DocumentStatus, IngestionJob, JobRepo, JobStatus, SourceDocument, Store, db,
    time,
};
use serde_json::json;
use tracing::{error, info, warn};
use turso::Connection;
use uuid::Uuid;

use crate::error::{JobError, Result};

/// Shared dependencies for running jobs
pub struct JobExecutor {
    store: Arc<Store>,
    registry: ProcessorRegistry,
    ingestion: Arc<OfferIngestionService>,
    capabilities: Capabilities,
    metrics: Arc<IngestMetrics>,
    default_currency: String,
    min_pdf_text_chars: usize,
}

impl JobExecutor {
    pub fn new(
        store: Arc<Store>,
        registry: ProcessorRegistry,
        ingestion: Arc<OfferIngestionService>,
        capabilities: Capabilities,
        metrics: Arc<IngestMetrics>,
        default_currency: impl Into<String>,
        min_pdf_text_chars: usize,
    ) -> Self {
        Self {
            store,
            registry,
            ingestion,
            capabilities,
            metrics,
            default_currency: default_currency.into(),
            min_pdf_text_chars,
        }
    }

    /// Run one job to a terminal state; never panics the worker
    pub async fn run_job(&self, job_id: Uuid) {
        match self.execute(job_id).await {
            Ok(()) => {}
            Err(e) => {
                error!(job_id = %job_id, error = %e, "ingestion job failed");
                if let Err(mark_err) = self.mark_failed(job_id, &e.to_string()).await {
                    error!(job_id = %job_id, error = %mark_err, "could not persist failure state");
                }
                self.metrics.documents_failed.inc();
                self.metrics.jobs_completed.inc();
            }
        }
    }

    async fn execute(&self, job_id: Uuid) -> Result<()> {
        let conn = self.store.connect()?;

        let mut job = JobRepo::new(&conn)
            .get_by_id(&job_id)
            .await?
            .ok_or_else(|| JobError::missing("job", job_id.to_string()))?;
        let mut doc = DocumentRepo::new(&conn)
            .get_by_id(&job.source_document_id)
            .await?
            .ok_or_else(|| JobError::missing("document", job.source_document_id.to_string()))?;

        self.mark_running(&conn, &mut job, &mut doc).await?;

        let logs = job.logs.clone().unwrap_or_else(|| json!({}));
        let vendor_name = logs
            .get("vendor_name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                doc.extra
                    .as_ref()
                    .and_then(|extra| extra.get("declared_vendor"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            });
        let prefer_llm = logs
            .get("prefer_llm")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let path = Path::new(&doc.storage_uri);
        if !path.exists() {
            return Err(JobError::ArtefactMissing(doc.storage_uri.clone()));
        }

        let processor = self.registry.resolve(Some(job.processor.as_str()), path)?;
        let mut ctx = IngestContext::new(self.default_currency.clone());
        ctx.vendor_name = vendor_name.clone();
        ctx.prefer_llm = prefer_llm;
        ctx.min_pdf_text_chars = self.min_pdf_text_chars;
        ctx.capabilities = self.capabilities.clone();

        let output = processor.process(path, &ctx).await?;

        // Offer batch + terminal document status in one transaction
        db::begin(&conn).await?;
        let committed = async {
            let outcome = self
                .ingestion
                .ingest(
                    &conn,
                    &output.offers,
                    vendor_name.as_deref(),
                    Some(&doc),
                    None,
                )
                .await?;

            let mut warnings: Vec<String> = output.warnings.clone();
            warnings.extend(outcome.warnings.iter().cloned());

            if doc.vendor_id.is_none() {
                doc.vendor_id = outcome.offers.first().map(|offer| offer.vendor_id);
            }
            doc.status = if warnings.is_empty() {
                DocumentStatus::Processed
            } else {
                DocumentStatus::ProcessedWithWarnings
            };
            doc.ingest_completed_at = Some(time::now());
            let mut extra = match doc.extra.take() {
                Some(serde_json::Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            extra.insert("processor".into(), json!(job.processor));
            extra.insert("rows_seen".into(), json!(output.facts.rows_seen));
            extra.insert("offers".into(), json!(outcome.offers.len()));
            if warnings.is_empty() {
                extra.remove("ingestion_errors");
            } else {
                extra.insert("ingestion_errors".into(), json!(warnings));
            }
            if let Some(extraction_path) = &output.facts.extraction_path {
                extra.insert("extraction_path".into(), json!(extraction_path));
            }
            doc.extra = Some(serde_json::Value::Object(extra));
            DocumentRepo::new(&conn).update(&doc).await?;

            Ok::<_, JobError>((outcome, warnings))
        }
        .await;

        let (outcome, warnings) = match committed {
            Ok(result) => {
                db::commit(&conn).await?;
                result
            }
            Err(e) => {
                db::rollback(&conn).await;
                return Err(e);
            }
        };

        job.status = JobStatus::Succeeded;
        job.merge_logs(json!({
            "message": format!("Processed {} offers", outcome.offers.len()),
            "offers": outcome.offers.len(),
            "warnings": &warnings,
        }));
        JobRepo::new(&conn).update(&mut job).await?;

        match doc.status {
            DocumentStatus::Processed => self.metrics.documents_processed.inc(),
            _ => self.metrics.documents_with_warnings.inc(),
        }
        self.metrics.offers_ingested.add(outcome.offers.len() as u64);
        self.metrics.rows_warned.add(warnings.len() as u64);
        self.metrics.jobs_completed.inc();

        info!(
            job_id = %job.id,
            document_id = %doc.id,
            offers = outcome.offers.len(),
            warnings = warnings.len(),
            status = doc.status.as_str(),
            "ingestion job finished"
        );
        Ok(())
    }

    async fn mark_running(
        &self,
        conn: &Connection,
        job: &mut IngestionJob,
        doc: &mut SourceDocument,
    ) -> Result<()> {
        job.status = JobStatus::Running;
        JobRepo::new(conn).update(job).await?;

        doc.status = DocumentStatus::Processing;
        doc.ingest_started_at = Some(time::now());
        doc.ingest_completed_at = None;
        DocumentRepo::new(conn).update(doc).await?;
        Ok(())
    }

    /// Best-effort terminal failure writes, outside any transaction
    async fn mark_failed(&self, job_id: Uuid, message: &str) -> Result<()> {
        let conn = self.store.connect()?;
        let jobs = JobRepo::new(&conn);

        if let Some(mut job) = jobs.get_by_id(&job_id).await? {
            job.status = JobStatus::Failed;
            job.merge_logs(json!({ "error": message }));
            jobs.update(&mut job).await?;

            let documents = DocumentRepo::new(&conn);
            if let Some(mut doc) = documents.get_by_id(&job.source_document_id).await? {
                if !doc.status.is_terminal() {
                    doc.status = DocumentStatus::Failed;
                    doc.ingest_completed_at = Some(time::now());
                    let mut extra = match doc.extra.take() {
                        Some(serde_json::Value::Object(map)) => map,
                        _ => serde_json::Map::new(),
                    };
                    extra.insert("errors".into(), json!([message]));
                    doc.extra = Some(serde_json::Value::Object(extra));
                    documents.update(&doc).await?;
                }
            }
        } else {
            warn!(job_id = %job_id, "job vanished before failure could be recorded");
        }
        Ok(())
    }
}

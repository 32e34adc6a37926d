//! `pricebot ingest` - one-shot synchronous ingestion
//!
//! Runs the same pipeline as an upload, inline: processor selection,
//! extraction, offer ingestion, and a terminal document row. Useful for
//! backfills and smoke-testing a price sheet before wiring a vendor up.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use pricebot_catalog::{OfferIngestionService, PairLocks, ResolverSettings};
use pricebot_config::Config;
use pricebot_extraction::Capabilities;
use pricebot_ingest::{IngestContext, ProcessorRegistry};
use pricebot_store::{
    DocumentRepo, DocumentStatus, SourceDocument, Store, db, time,
};
use serde_json::json;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Artefact to ingest (.xlsx, .xls, .csv, .pdf, image, .txt)
    pub file: PathBuf,

    /// Vendor the sheet belongs to
    #[arg(long)]
    pub vendor: String,

    /// Processor override (spreadsheet, document_text, whatsapp_text)
    #[arg(long)]
    pub processor: Option<String>,

    /// Prefer LLM extraction over heuristics
    #[arg(long)]
    pub prefer_llm: bool,
}

pub async fn run(config: Config, args: IngestArgs) -> Result<()> {
    if !args.file.exists() {
        bail!("file not found: {}", args.file.display());
    }

    let store = Arc::new(
        Store::open(&config.database.url)
            .await
            .context("opening catalog database")?,
    );
    let capabilities =
        Capabilities::from_config(&config.extraction).unwrap_or_else(|_| Capabilities::disabled());

    let registry = ProcessorRegistry::new();
    let processor = registry.resolve(args.processor.as_deref(), &args.file)?;

    let mut ctx = IngestContext::new(config.ingestion.default_currency.clone());
    ctx.vendor_name = Some(args.vendor.clone());
    ctx.prefer_llm = args.prefer_llm;
    ctx.min_pdf_text_chars = config.ingestion.min_pdf_text_chars;
    ctx.capabilities = capabilities.clone();

    let output = processor.process(&args.file, &ctx).await?;

    let ingestion = OfferIngestionService::new(
        ResolverSettings {
            similarity_threshold: config.extraction.embedding_similarity_threshold,
            candidate_cap: config.extraction.embedding_candidate_cap,
        },
        config.ingestion.default_currency.clone(),
        capabilities.embeddings.clone(),
        Arc::new(PairLocks::new()),
    );

    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "artefact".to_string());
    let extension = args
        .file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let mut doc = SourceDocument::new(file_name.as_str(), extension, args.file.display().to_string())
        .with_extra(json!({
            "declared_vendor": args.vendor,
            "processor": processor.name(),
            "source": "cli",
        }));
    doc.status = DocumentStatus::Processing;
    doc.ingest_started_at = Some(time::now());

    let conn = store.connect()?;
    db::begin(&conn).await?;
    let result: Result<_> = async {
        DocumentRepo::new(&conn).create(&doc).await?;
        let outcome = ingestion
            .ingest(&conn, &output.offers, Some(&args.vendor), Some(&doc), None)
            .await?;
        Ok(outcome)
    }
    .await;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            db::rollback(&conn).await;
            return Err(e);
        }
    };

    let mut warnings = output.warnings.clone();
    warnings.extend(outcome.warnings.iter().cloned());
    doc.status = if warnings.is_empty() {
        DocumentStatus::Processed
    } else {
        DocumentStatus::ProcessedWithWarnings
    };
    doc.ingest_completed_at = Some(time::now());
    if !warnings.is_empty() {
        doc.extra = Some(json!({
            "declared_vendor": args.vendor,
            "processor": processor.name(),
            "source": "cli",
            "ingestion_errors": warnings,
        }));
    }
    DocumentRepo::new(&conn).update(&doc).await?;
    db::commit(&conn).await?;

    println!("document: {}", doc.id);
    println!("status:   {}", doc.status.as_str());
    println!("offers:   {}", outcome.offers.len());
    if !warnings.is_empty() {
        println!("warnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}

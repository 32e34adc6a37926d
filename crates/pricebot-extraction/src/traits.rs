//! Capability traits
//!
//! The pipeline depends on these seams, never on concrete backends, so a
//! deployment with everything disabled still produces correct (if smaller)
//! output.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::Result;

/// Hints handed to the LLM extractor alongside the raw lines
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    /// Vendor the caller believes the content belongs to
    pub vendor_hint: Option<String>,
    /// Currency to assume when a row carries none
    pub currency_hint: Option<String>,
    /// Artefact name, for logging on the remote side
    pub document_name: Option<String>,
    /// Artefact kind: "spreadsheet_rows", "whatsapp_transcript", ...
    pub document_kind: Option<String>,
}

/// One offer row returned by the LLM extractor
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedOffer {
    pub description: String,
    pub price: Decimal,
    pub currency: Option<String>,
    pub quantity: Option<i64>,
    pub condition: Option<String>,
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub upc: Option<String>,
    pub location: Option<String>,
    pub vendor: Option<String>,
}

/// LLM-assisted extraction of offers from raw text lines
#[async_trait]
pub trait OfferExtractor: Send + Sync {
    /// Extract structured offers; the second element is per-line warnings
    async fn extract_offers(
        &self,
        lines: &[String],
        context: &ExtractionContext,
    ) -> Result<(Vec<ExtractedOffer>, Vec<String>)>;
}

/// Vision-backed text extraction for images and scanned PDFs
#[async_trait]
pub trait VisionTextExtractor: Send + Sync {
    /// Extract plain text from a base64-encoded file
    async fn extract_text(&self, base64_payload: &str, media_kind: &str) -> Result<String>;
}

/// Dense embedding provider for alias similarity
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

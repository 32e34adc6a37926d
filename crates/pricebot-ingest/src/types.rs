//! Processor input/output types

use chrono::NaiveDateTime;
use pricebot_extraction::Capabilities;
use rust_decimal::Decimal;

/// A normalized offer row prior to persistence
#[derive(Debug, Clone)]
pub struct RawOffer {
    /// Vendor the row itself points at (sender, column, filename stem)
    pub vendor_hint: Option<String>,
    /// Raw product description; entity resolution maps it to a catalog row
    pub description: String,
    pub price: Decimal,
    /// None falls back to the context currency at ingestion time
    pub currency: Option<String>,
    pub quantity: Option<i64>,
    pub condition: Option<String>,
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub upc: Option<String>,
    pub location: Option<String>,
    /// None defaults to the document's ingest-start instant
    pub captured_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
    /// The row as extracted, for forensics
    pub raw_payload: Option<serde_json::Value>,
}

impl RawOffer {
    pub fn new(description: impl Into<String>, price: Decimal) -> Self {
        Self {
            vendor_hint: None,
            description: description.into(),
            price,
            currency: None,
            quantity: None,
            condition: None,
            brand: None,
            model_number: None,
            upc: None,
            location: None,
            captured_at: None,
            notes: None,
            raw_payload: None,
        }
    }
}

/// Document-level facts a processor learned along the way
#[derive(Debug, Clone, Default)]
pub struct DocumentFacts {
    /// Vendor declared by the artefact itself
    pub declared_vendor: Option<String>,
    /// Currency the artefact appears to use
    pub currency_hint: Option<String>,
    /// Data rows seen (before row-level skips)
    pub rows_seen: usize,
    /// Which extraction path ran ("embedded_text", "vision", ...)
    pub extraction_path: Option<String>,
}

/// Everything a processor produced for one artefact
#[derive(Debug, Default)]
pub struct ProcessorOutput {
    pub offers: Vec<RawOffer>,
    /// Row-level warnings; never fatal
    pub warnings: Vec<String>,
    pub facts: DocumentFacts,
}

impl ProcessorOutput {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Caller-supplied context for one extraction run
#[derive(Clone, Default)]
pub struct IngestContext {
    /// Vendor declared at upload time
    pub vendor_name: Option<String>,
    /// Fallback currency code
    pub default_currency: String,
    /// Prefer the LLM extractor over heuristics when both produce rows
    pub prefer_llm: bool,
    /// Embedded-PDF text shorter than this goes to the vision path
    pub min_pdf_text_chars: usize,
    /// Optional backends
    pub capabilities: Capabilities,
}

impl IngestContext {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            vendor_name: None,
            default_currency: default_currency.into(),
            prefer_llm: false,
            min_pdf_text_chars: 200,
            capabilities: Capabilities::disabled(),
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor_name = Some(vendor.into());
        self
    }
}

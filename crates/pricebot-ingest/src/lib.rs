//! Pricebot - Ingest
//!
//! Format-specific extraction: spreadsheets, PDFs/images, and WhatsApp
//! transcripts, all funneling into [`RawOffer`] rows.
//!
//! # Architecture
//!
//! ```text
//! artefact ──► ProcessorRegistry ──► Processor::{Spreadsheet, DocumentText, WhatsAppText}
//!                                         │
//!                                         ▼
//!                         ProcessorOutput { offers, warnings, facts }
//! ```
//!
//! Processors are deterministic per input and never fail on row-level
//! issues; those are recorded as warnings on the output. Optional LLM and
//! vision backends come in through [`IngestContext::capabilities`].

pub mod document;
pub mod error;
pub mod lines;
pub mod registry;
pub mod spreadsheet;
pub mod types;
pub mod whatsapp_text;

pub use error::{ProcessorError, Result};
pub use registry::{Processor, ProcessorRegistry};
pub use spreadsheet::VENDOR_PRICE_TEMPLATE;
pub use types::{DocumentFacts, IngestContext, ProcessorOutput, RawOffer};

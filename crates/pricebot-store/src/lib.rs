//! Pricebot - Store
//!
//! Relational persistence for the catalog: vendors, products, aliases,
//! source documents, offers, price-history spans, ingestion jobs, and the
//! WhatsApp chat/message tables.
//!
//! # Architecture
//!
//! - [`Store`] owns the database and creates the schema at startup.
//! - Each repository borrows one [`turso::Connection`], so every repo used
//!   by a unit of work shares the caller's transaction
//!   ([`db::begin`] / [`db::commit`] / [`db::rollback`]).
//! - Entities carry foreign-key ids only; callers resolve related rows
//!   through the owning repository. No object graphs cross transaction
//!   boundaries.

pub mod db;
pub mod error;
pub mod repos;
pub mod time;

pub use db::Store;
pub use error::{Result, StoreError};

pub use repos::documents::{DocumentRepo, DocumentStatus, SourceDocument};
pub use repos::history::{HistoryRepo, PriceSpan, SpanMutation};
pub use repos::jobs::{IngestionJob, JobRepo, JobStatus};
pub use repos::offers::{Offer, OfferFilter, OfferRepo};
pub use repos::products::{AliasRepo, Product, ProductAlias, ProductRepo};
pub use repos::vendors::{Vendor, VendorRepo};
pub use repos::whatsapp::{ChatType, WhatsAppChat, WhatsAppMessage, WhatsAppRepo};

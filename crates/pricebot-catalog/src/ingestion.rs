//! Offer ingestion service
//!
//! The shared tail of every ingestion path: raw rows in, persisted offers
//! and updated history spans out. The caller owns the transaction; a batch
//! belonging to one document either lands whole or not at all.

use std::sync::Arc;

use pricebot_ingest::RawOffer;
use pricebot_store::repos::history::HistoryRepo;
use pricebot_store::{Offer, OfferRepo, SourceDocument, time};
use tracing::{debug, warn};
use turso::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::history::{self, Observation};
use crate::locks::PairLocks;
use crate::resolver::{EntityResolver, ResolverSettings};

/// Outcome of one ingestion batch
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub offers: Vec<Offer>,
    /// Row-level skips and soft failures
    pub warnings: Vec<String>,
}

/// Long-lived service state shared across requests and jobs
pub struct OfferIngestionService {
    settings: ResolverSettings,
    default_currency: String,
    embeddings: Option<Arc<dyn pricebot_extraction::EmbeddingClient>>,
    pair_locks: Arc<PairLocks>,
}

impl OfferIngestionService {
    pub fn new(
        settings: ResolverSettings,
        default_currency: impl Into<String>,
        embeddings: Option<Arc<dyn pricebot_extraction::EmbeddingClient>>,
        pair_locks: Arc<PairLocks>,
    ) -> Self {
        Self {
            settings,
            default_currency: default_currency.into(),
            embeddings,
            pair_locks,
        }
    }

    /// Persist a batch of raw rows inside the caller's transaction.
    ///
    /// Vendor precedence per row: `declared_vendor`, then the row's own
    /// hint, then the document's declared vendor. Rows with no vendor at
    /// all are skipped with a `missing_vendor` warning.
    pub async fn ingest(
        &self,
        conn: &Connection,
        rows: &[RawOffer],
        declared_vendor: Option<&str>,
        document: Option<&SourceDocument>,
        source_message: Option<Uuid>,
    ) -> Result<IngestOutcome> {
        let resolver = EntityResolver::new(conn, self.settings.clone(), self.embeddings.clone());
        let offers = OfferRepo::new(conn);
        let history = HistoryRepo::new(conn);

        let document_vendor = document
            .and_then(|doc| doc.extra.as_ref())
            .and_then(|extra| extra.get("declared_vendor"))
            .and_then(|value| value.as_str())
            .map(str::to_string);

        let mut outcome = IngestOutcome::default();

        for (idx, row) in rows.iter().enumerate() {
            let row_number = idx + 1;

            let Some(vendor) = resolver
                .resolve_vendor(
                    declared_vendor,
                    row.vendor_hint.as_deref(),
                    document_vendor.as_deref(),
                )
                .await?
            else {
                outcome
                    .warnings
                    .push(format!("row {row_number}: missing_vendor"));
                continue;
            };

            let (product, source) = resolver.resolve_product(row, &vendor).await?;

            let captured_at = row
                .captured_at
                .or_else(|| document.and_then(|doc| doc.ingest_started_at))
                .unwrap_or_else(time::now);
            let currency = row
                .currency
                .clone()
                .unwrap_or_else(|| self.default_currency.clone());

            let mut offer = Offer::new(product.id, vendor.id, row.price, currency, captured_at);
            offer.source_document_id = document.map(|doc| doc.id);
            offer.source_whatsapp_message_id = source_message.or_else(|| {
                row.raw_payload
                    .as_ref()
                    .and_then(|p| p.get("source_whatsapp_message_id"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
            });
            offer.quantity = row.quantity;
            offer.condition = row.condition.clone();
            offer.location = row.location.clone();
            offer.notes = row.notes.clone();
            offer.raw_payload = row.raw_payload.clone();

            if let Err(e) = offers.create(&offer).await {
                warn!(row = row_number, error = %e, "offer rejected");
                outcome.warnings.push(format!("row {row_number}: {e}"));
                continue;
            }

            // Serialize span maintenance per (product, vendor) across
            // concurrent batches
            let lock = self.pair_locks.lock_for(&product.id, &vendor.id);
            let _guard = lock.lock().await;

            let spans = history.list_for_pair(&product.id, &vendor.id).await?;
            let mutations = history::plan(
                &spans,
                &Observation {
                    product_id: product.id,
                    vendor_id: vendor.id,
                    price: offer.price,
                    currency: offer.currency.clone(),
                    at: offer.captured_at,
                    source_offer_id: offer.id,
                },
            )?;
            history.apply(&mutations).await?;

            debug!(
                offer_id = %offer.id,
                product = %product.canonical_name,
                vendor = %vendor.name,
                source = ?source,
                "offer ingested"
            );
            outcome.offers.push(offer);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pricebot_store::repos::documents::DocumentRepo;
    use pricebot_store::{DocumentStatus, Store};
    use rust_decimal::Decimal;

    fn service() -> OfferIngestionService {
        OfferIngestionService::new(
            ResolverSettings::default(),
            "USD",
            None,
            Arc::new(PairLocks::new()),
        )
    }

    fn row(description: &str, price: &str, vendor: Option<&str>) -> RawOffer {
        let mut row = RawOffer::new(description, price.parse::<Decimal>().unwrap());
        row.vendor_hint = vendor.map(str::to_string);
        row
    }

    #[tokio::test]
    async fn test_batch_persists_offers_and_history() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let service = service();

        let rows = vec![
            row("iPhone 11 64GB Black", "485.00", None),
            row("iPhone 12 128GB", "600", None),
        ];
        let outcome = service
            .ingest(&conn, &rows, Some("Acme"), None, None)
            .await
            .unwrap();

        assert_eq!(outcome.offers.len(), 2);
        assert!(outcome.warnings.is_empty());

        // One open span per product
        let history = HistoryRepo::new(&conn);
        for offer in &outcome.offers {
            let spans = history
                .list_for_pair(&offer.product_id, &offer.vendor_id)
                .await
                .unwrap();
            assert_eq!(spans.len(), 1);
            assert!(spans[0].is_open());
            assert_eq!(spans[0].price, offer.price);
            assert_eq!(spans[0].source_offer_id, offer.id);
        }
    }

    #[tokio::test]
    async fn test_missing_vendor_skips_row() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let service = service();

        let rows = vec![row("iPhone 11", "485", None)];
        let outcome = service.ingest(&conn, &rows, None, None, None).await.unwrap();

        assert!(outcome.offers.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("missing_vendor"));
    }

    #[tokio::test]
    async fn test_declared_vendor_beats_row_hint() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let service = service();

        let rows = vec![row("iPhone 11", "485", Some("Side Seller"))];
        let outcome = service
            .ingest(&conn, &rows, Some("Acme"), None, None)
            .await
            .unwrap();

        let vendor = pricebot_store::VendorRepo::new(&conn)
            .get_by_id(&outcome.offers[0].vendor_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vendor.name, "Acme");
    }

    #[tokio::test]
    async fn test_row_hint_used_without_declared() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let service = service();

        let rows = vec![row("iPhone 11", "485", Some("John Deals"))];
        let outcome = service.ingest(&conn, &rows, None, None, None).await.unwrap();

        let vendor = pricebot_store::VendorRepo::new(&conn)
            .get_by_id(&outcome.offers[0].vendor_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vendor.name, "John Deals");
    }

    #[tokio::test]
    async fn test_captured_at_defaults_to_document_start() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let service = service();

        let started = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut doc = SourceDocument::new("a.csv", ".csv", "storage/a.csv");
        doc.status = DocumentStatus::Processing;
        doc.ingest_started_at = Some(started);
        DocumentRepo::new(&conn).create(&doc).await.unwrap();

        let rows = vec![row("iPhone 11", "485", None)];
        let outcome = service
            .ingest(&conn, &rows, Some("Acme"), Some(&doc), None)
            .await
            .unwrap();

        assert_eq!(outcome.offers[0].captured_at, started);
        assert_eq!(outcome.offers[0].source_document_id, Some(doc.id));
    }

    #[tokio::test]
    async fn test_same_upc_attaches_to_same_product() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let service = service();

        let mut first = row("iPhone 11 64GB", "485", None);
        first.upc = Some("190199220546".into());
        let mut second = row("totally different words", "490", None);
        second.upc = Some("190199220546".into());

        let outcome = service
            .ingest(&conn, &[first, second], Some("Acme"), None, None)
            .await
            .unwrap();
        assert_eq!(outcome.offers.len(), 2);
        assert_eq!(outcome.offers[0].product_id, outcome.offers[1].product_id);
    }
}

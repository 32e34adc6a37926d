//! Debounced WhatsApp chat extraction
//!
//! Re-parses a chat's recent messages into offers after the collector goes
//! quiet. Every run gets a synthetic source document
//! (`whatsapp://chat/<id>`) so extracted offers keep full traceability,
//! and the chat watermark advances so the next run only sees new messages.

use std::sync::Arc;

use async_trait::async_trait;
use pricebot_catalog::OfferIngestionService;
use pricebot_ingest::{RawOffer, lines};
use pricebot_metrics::WhatsAppMetrics;
use pricebot_store::{
    DocumentRepo, DocumentStatus, SourceDocument, Store, VendorRepo, WhatsAppRepo, db, time,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;

/// Seam the debounce scheduler drives; concrete below, stubbed in tests
#[async_trait]
pub trait ChatExtractor: Send + Sync {
    async fn extract_chat(&self, chat_id: Uuid, client_id: Option<&str>);
}

/// Outcome of one extraction run
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    pub offers: usize,
    pub warnings: usize,
    pub document_id: Option<Uuid>,
}

/// Chat-to-offers extractor
pub struct WhatsAppExtractor {
    store: Arc<Store>,
    ingestion: Arc<OfferIngestionService>,
    metrics: Arc<WhatsAppMetrics>,
    max_messages: usize,
}

impl WhatsAppExtractor {
    pub fn new(
        store: Arc<Store>,
        ingestion: Arc<OfferIngestionService>,
        metrics: Arc<WhatsAppMetrics>,
        max_messages: usize,
    ) -> Self {
        Self {
            store,
            ingestion,
            metrics,
            max_messages,
        }
    }

    /// Parse new messages since the watermark and persist the offers
    pub async fn run(&self, chat_id: Uuid, client_id: Option<&str>) -> Result<ExtractionSummary> {
        let conn = self.store.connect()?;
        let whatsapp = WhatsAppRepo::new(&conn);

        let Some(chat) = whatsapp.get_chat(&chat_id).await? else {
            return Ok(ExtractionSummary::default());
        };

        let messages = whatsapp
            .recent_messages(&chat_id, chat.last_extracted_at, self.max_messages)
            .await?;
        if messages.is_empty() {
            return Ok(ExtractionSummary::default());
        }

        // Offers from a live chat belong to the chat's mapped vendor
        let mapped_vendor = match chat.vendor_id {
            Some(vendor_id) => VendorRepo::new(&conn).get_by_id(&vendor_id).await?,
            None => None,
        };

        let mut rows: Vec<RawOffer> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        if mapped_vendor.is_none() {
            warnings.push(format!("unmapped_vendor: chat '{}'", chat.title));
        } else {
            for message in &messages {
                for line in message.text.lines() {
                    let (mut parsed, warning) = lines::parse_offer_line(line, None);
                    for offer in &mut parsed {
                        offer.captured_at = Some(message.observed_at);
                        let mut payload = match offer.raw_payload.take() {
                            Some(serde_json::Value::Object(map)) => map,
                            _ => serde_json::Map::new(),
                        };
                        payload.insert(
                            "source_whatsapp_message_id".into(),
                            json!(message.id.to_string()),
                        );
                        if let Some(sender) = &message.sender_name {
                            payload.insert("sender".into(), json!(sender));
                        }
                        offer.raw_payload = Some(serde_json::Value::Object(payload));
                    }
                    rows.extend(parsed);
                    if let Some(warning) = warning {
                        warnings.push(warning);
                    }
                }
            }
        }

        let now = time::now();
        let mut doc = SourceDocument::new(
            format!("{}.whatsapp", chat.title),
            "whatsapp_live",
            format!("whatsapp://chat/{}", chat.id),
        )
        .with_extra(json!({
            "source": "whatsapp_live",
            "chat_title": chat.title,
        }));
        doc.vendor_id = mapped_vendor.as_ref().map(|vendor| vendor.id);
        doc.status = DocumentStatus::Processing;
        doc.ingest_started_at = Some(now);

        db::begin(&conn).await?;
        let result = async {
            DocumentRepo::new(&conn).create(&doc).await?;

            let outcome = self
                .ingestion
                .ingest(
                    &conn,
                    &rows,
                    mapped_vendor.as_ref().map(|vendor| vendor.name.as_str()),
                    Some(&doc),
                    None,
                )
                .await?;

            warnings.extend(outcome.warnings.iter().cloned());
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
            extra.insert("offers".into(), json!(outcome.offers.len()));
            if !warnings.is_empty() {
                extra.insert("ingestion_errors".into(), json!(&warnings));
            }
            doc.extra = Some(serde_json::Value::Object(extra));
            DocumentRepo::new(&conn).update(&doc).await?;

            WhatsAppRepo::new(&conn).set_last_extracted(&chat.id, now).await?;

            Ok::<_, crate::error::JobError>(outcome)
        }
        .await;

        let outcome = match result {
            Ok(outcome) => {
                db::commit(&conn).await?;
                outcome
            }
            Err(e) => {
                db::rollback(&conn).await;
                return Err(e);
            }
        };

        self.metrics.record_extract(
            client_id,
            Some(&chat.id.to_string()),
            Some(&chat.title),
            outcome.offers.len() as u64,
            warnings.len() as u64,
        );

        info!(
            chat_id = %chat.id,
            offers = outcome.offers.len(),
            warnings = warnings.len(),
            "chat extraction finished"
        );
        Ok(ExtractionSummary {
            offers: outcome.offers.len(),
            warnings: warnings.len(),
            document_id: Some(doc.id),
        })
    }
}

#[async_trait]
impl ChatExtractor for WhatsAppExtractor {
    async fn extract_chat(&self, chat_id: Uuid, client_id: Option<&str>) {
        if let Err(e) = self.run(chat_id, client_id).await {
            warn!(chat_id = %chat_id, error = %e, "chat extraction failed");
            self.metrics
                .record_extract(client_id, Some(&chat_id.to_string()), None, 0, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricebot_catalog::{PairLocks, ResolverSettings};
    use pricebot_store::repos::offers::{OfferFilter, OfferRepo};
    use pricebot_store::{WhatsAppChat, WhatsAppMessage};

    async fn setup() -> (Arc<Store>, WhatsAppExtractor) {
        let store = Arc::new(Store::new_memory().await.unwrap());
        let ingestion = Arc::new(OfferIngestionService::new(
            ResolverSettings::default(),
            "USD",
            None,
            Arc::new(PairLocks::new()),
        ));
        let extractor = WhatsAppExtractor::new(
            Arc::clone(&store),
            ingestion,
            Arc::new(WhatsAppMetrics::new()),
            500,
        );
        (store, extractor)
    }

    async fn seed_chat(store: &Store, vendor: Option<&str>) -> Uuid {
        let conn = store.connect().unwrap();
        let mut chat = WhatsAppChat::new("Deals");
        if let Some(vendor_name) = vendor {
            let vendor = VendorRepo::new(&conn).get_or_create(vendor_name).await.unwrap();
            chat.vendor_id = Some(vendor.id);
        }
        WhatsAppRepo::new(&conn).create_chat(&chat).await.unwrap();
        chat.id
    }

    async fn seed_message(store: &Store, chat_id: Uuid, text: &str, hash: &str) {
        let conn = store.connect().unwrap();
        let message = WhatsAppMessage::new(chat_id, text, hash, time::now());
        WhatsAppRepo::new(&conn).create_message(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_extraction_produces_offers_under_mapped_vendor() {
        let (store, extractor) = setup().await;
        let chat_id = seed_chat(&store, Some("Acme")).await;
        seed_message(&store, chat_id, "iPhone 15 $900", "h1").await;
        seed_message(&store, chat_id, "Pixel 9 $700", "h2").await;

        let summary = extractor.run(chat_id, Some("c1")).await.unwrap();
        assert_eq!(summary.offers, 2);
        assert_eq!(summary.warnings, 0);

        let conn = store.connect().unwrap();
        let offers = OfferRepo::new(&conn)
            .list(&OfferFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].source_document_id, summary.document_id);

        // Watermark advanced: a rerun sees nothing new
        let rerun = extractor.run(chat_id, Some("c1")).await.unwrap();
        assert_eq!(rerun.offers, 0);
        assert!(rerun.document_id.is_none());
    }

    #[tokio::test]
    async fn test_unmapped_vendor_skips_with_warning() {
        let (store, extractor) = setup().await;
        let chat_id = seed_chat(&store, None).await;
        seed_message(&store, chat_id, "iPhone 15 $900", "h1").await;

        let summary = extractor.run(chat_id, None).await.unwrap();
        assert_eq!(summary.offers, 0);
        assert_eq!(summary.warnings, 1);

        let conn = store.connect().unwrap();
        let doc = DocumentRepo::new(&conn)
            .get_by_id(&summary.document_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::ProcessedWithWarnings);
        let errors = &doc.extra.unwrap()["ingestion_errors"];
        assert!(errors[0].as_str().unwrap().contains("unmapped_vendor"));
    }

    #[tokio::test]
    async fn test_unknown_chat_is_a_quiet_noop() {
        let (_store, extractor) = setup().await;
        let summary = extractor.run(Uuid::new_v4(), None).await.unwrap();
        assert_eq!(summary.offers, 0);
        assert!(summary.document_id.is_none());
    }
}

//! HTTP-backed capability clients
//!
//! Thin JSON clients for an extraction sidecar speaking three endpoints:
//! `POST {base}/offers/extract`, `POST {base}/vision/extract-text`, and
//! `POST {base}/embeddings`. Prompting happens server-side; this process
//! only ships content and hints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::throttle::OutboundBudget;
use crate::traits::{
    EmbeddingClient, ExtractedOffer, ExtractionContext, OfferExtractor, VisionTextExtractor,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared plumbing for the three endpoint clients
#[derive(Clone)]
pub struct ExtractionEndpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    budget: Arc<OutboundBudget>,
}

impl ExtractionEndpoint {
    pub fn new(base_url: &str, api_key: &str, requests_per_minute: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            budget: Arc::new(OutboundBudget::per_minute(requests_per_minute)),
        })
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        if !self.budget.try_acquire() {
            return Err(ExtractionError::Throttled);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "capability request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Malformed(format!(
                "{path} answered {status}"
            )));
        }
        Ok(response.json::<T>().await?)
    }
}

// =============================================================================
// Offer extraction
// =============================================================================

#[derive(Debug, Deserialize)]
struct OffersResponse {
    offers: Vec<ExtractedOffer>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// LLM offer extractor over the sidecar endpoint
pub struct HttpOfferExtractor {
    endpoint: ExtractionEndpoint,
}

impl HttpOfferExtractor {
    pub fn new(endpoint: ExtractionEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl OfferExtractor for HttpOfferExtractor {
    async fn extract_offers(
        &self,
        lines: &[String],
        context: &ExtractionContext,
    ) -> Result<(Vec<ExtractedOffer>, Vec<String>)> {
        let body = json!({
            "lines": lines,
            "vendor_hint": context.vendor_hint,
            "currency_hint": context.currency_hint,
            "document_name": context.document_name,
            "document_kind": context.document_kind,
        });
        let response: OffersResponse = self.endpoint.post_json("/offers/extract", body).await?;
        Ok((response.offers, response.warnings))
    }
}

// =============================================================================
// Vision text extraction
// =============================================================================

#[derive(Debug, Deserialize)]
struct VisionResponse {
    text: String,
}

/// Vision text extractor over the sidecar endpoint
pub struct HttpVisionExtractor {
    endpoint: ExtractionEndpoint,
}

impl HttpVisionExtractor {
    pub fn new(endpoint: ExtractionEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl VisionTextExtractor for HttpVisionExtractor {
    async fn extract_text(&self, base64_payload: &str, media_kind: &str) -> Result<String> {
        let body = json!({
            "content": base64_payload,
            "media_kind": media_kind,
        });
        let response: VisionResponse = self
            .endpoint
            .post_json("/vision/extract-text", body)
            .await?;
        Ok(response.text)
    }
}

// =============================================================================
// Embeddings
// =============================================================================

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding client over the sidecar endpoint
pub struct HttpEmbeddingClient {
    endpoint: ExtractionEndpoint,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: ExtractionEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "input": text });
        let response: EmbeddingResponse = self.endpoint.post_json("/embeddings", body).await?;
        if response.embedding.is_empty() {
            return Err(ExtractionError::Malformed("empty embedding".into()));
        }
        Ok(response.embedding)
    }
}

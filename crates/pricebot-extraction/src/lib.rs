//! Pricebot - Extraction capabilities
//!
//! Optional heavy dependencies (LLM extraction, vision OCR, embeddings)
//! behind capability traits with disabled defaults.
//!
//! # Overview
//!
//! Processors and the entity resolver hold a [`Capabilities`] value and call
//! whatever is present; `None` means the capability is off and the caller
//! records a warning instead of failing. A local token bucket caps outgoing
//! requests regardless of backend.

pub mod error;
pub mod http;
pub mod throttle;
pub mod traits;

pub use error::{ExtractionError, Result};
pub use http::{
    ExtractionEndpoint, HttpEmbeddingClient, HttpOfferExtractor, HttpVisionExtractor,
};
pub use throttle::OutboundBudget;
pub use traits::{
    EmbeddingClient, ExtractedOffer, ExtractionContext, OfferExtractor, VisionTextExtractor,
};

use std::sync::Arc;

use pricebot_config::ExtractionConfig;
use tracing::info;

/// The set of optional backends available to the pipeline
#[derive(Clone, Default)]
pub struct Capabilities {
    pub llm: Option<Arc<dyn OfferExtractor>>,
    pub vision: Option<Arc<dyn VisionTextExtractor>>,
    pub embeddings: Option<Arc<dyn EmbeddingClient>>,
}

impl Capabilities {
    /// Everything off; the pipeline's no-op default
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build the HTTP clients enabled by config
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let any_enabled =
            config.enable_llm_extraction || config.enable_vision || config.enable_embeddings;
        if !any_enabled {
            return Ok(Self::disabled());
        }

        let api_key = config.llm_api_key.as_deref().ok_or_else(|| {
            ExtractionError::Unavailable("extraction enabled without llm_api_key".into())
        })?;
        let endpoint = ExtractionEndpoint::new(
            &config.llm_api_url,
            api_key,
            config.outbound_requests_per_minute,
        )?;

        let capabilities = Self {
            llm: config
                .enable_llm_extraction
                .then(|| Arc::new(HttpOfferExtractor::new(endpoint.clone())) as Arc<dyn OfferExtractor>),
            vision: config
                .enable_vision
                .then(|| Arc::new(HttpVisionExtractor::new(endpoint.clone())) as Arc<dyn VisionTextExtractor>),
            embeddings: config
                .enable_embeddings
                .then(|| Arc::new(HttpEmbeddingClient::new(endpoint.clone())) as Arc<dyn EmbeddingClient>),
        };

        info!(
            llm = capabilities.llm.is_some(),
            vision = capabilities.vision.is_some(),
            embeddings = capabilities.embeddings.is_some(),
            "Extraction capabilities configured"
        );
        Ok(capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_builds_noop() {
        let capabilities = Capabilities::from_config(&ExtractionConfig::default()).unwrap();
        assert!(capabilities.llm.is_none());
        assert!(capabilities.vision.is_none());
        assert!(capabilities.embeddings.is_none());
    }

    #[test]
    fn test_enabled_without_key_is_unavailable() {
        let config = ExtractionConfig {
            enable_embeddings: true,
            ..Default::default()
        };
        assert!(matches!(
            Capabilities::from_config(&config),
            Err(ExtractionError::Unavailable(_))
        ));
    }

    #[test]
    fn test_enabled_with_key_builds_clients() {
        let config = ExtractionConfig {
            enable_llm_extraction: true,
            enable_vision: true,
            llm_api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let capabilities = Capabilities::from_config(&config).unwrap();
        assert!(capabilities.llm.is_some());
        assert!(capabilities.vision.is_some());
        assert!(capabilities.embeddings.is_none());
    }
}

//! WhatsApp live-ingest settings

use serde::Deserialize;

/// Settings for the authenticated WhatsApp batch intake endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Shared secret expected in `X-Ingest-Token`.
    /// Required in production; when unset there, the endpoint returns 503.
    pub ingest_token: Option<String>,

    /// HMAC-SHA256 secret for request signing. When set, `X-Signature`
    /// and `X-Signature-Timestamp` become mandatory.
    pub ingest_hmac_secret: Option<String>,

    /// Accepted clock skew for signed requests, in seconds
    /// Default: 300
    pub ingest_signature_ttl_seconds: i64,

    /// Token-bucket refill per client, per minute
    /// Default: 120
    pub ingest_rate_limit_per_minute: u32,

    /// Token-bucket burst capacity per client
    /// Default: 60
    pub ingest_rate_limit_burst: u32,

    /// Rolling window for content-hash dedupe, in hours
    /// Default: 24
    pub content_hash_window_hours: i64,

    /// Debounce before the extraction pass runs over a chat, in seconds
    /// Default: 3
    pub extract_debounce_seconds: f64,

    /// Messages pulled per extraction pass
    /// Default: 500
    pub extract_max_messages: usize,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            ingest_token: None,
            ingest_hmac_secret: None,
            ingest_signature_ttl_seconds: 300,
            ingest_rate_limit_per_minute: 120,
            ingest_rate_limit_burst: 60,
            content_hash_window_hours: 24,
            extract_debounce_seconds: 3.0,
            extract_max_messages: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WhatsAppConfig::default();
        assert!(config.ingest_token.is_none());
        assert_eq!(config.ingest_signature_ttl_seconds, 300);
        assert_eq!(config.content_hash_window_hours, 24);
        assert_eq!(config.extract_max_messages, 500);
    }
}

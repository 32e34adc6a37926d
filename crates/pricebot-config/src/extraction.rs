//! Optional extraction capability settings (LLM, vision, embeddings)

use serde::Deserialize;

/// Settings for the optional heavy extraction backends.
///
/// Every capability ships disabled; the pipeline produces correct (if
/// smaller) output with all of them off.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Enable the LLM row/line extraction fallback
    pub enable_llm_extraction: bool,

    /// API key for the LLM backend; required when enabled
    pub llm_api_key: Option<String>,

    /// Base URL of the LLM backend
    /// Default: "https://api.openai.com/v1"
    pub llm_api_url: String,

    /// Enable the vision text-extraction fallback for images and scanned PDFs
    pub enable_vision: bool,

    /// Enable embedding-based alias matching
    pub enable_embeddings: bool,

    /// Cosine similarity threshold for an embedding alias match
    /// Default: 0.86
    pub embedding_similarity_threshold: f32,

    /// Maximum alias candidates scored per lookup
    /// Default: 50
    pub embedding_candidate_cap: usize,

    /// Cap on outgoing capability requests per minute (local bucket)
    /// Default: 60
    pub outbound_requests_per_minute: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enable_llm_extraction: false,
            llm_api_key: None,
            llm_api_url: "https://api.openai.com/v1".into(),
            enable_vision: false,
            enable_embeddings: false,
            embedding_similarity_threshold: 0.86,
            embedding_candidate_cap: 50,
            outbound_requests_per_minute: 60,
        }
    }
}

//! Configuration validation
//!
//! Cross-field checks that serde defaults alone cannot express:
//! - storage directory / database url non-empty
//! - LLM enabled implies an API key
//! - WhatsApp signature TTL, rate-limit, and dedupe-window bounds
//! - embedding threshold inside (0, 1]

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_database(config)?;
    validate_ingestion(config)?;
    validate_extraction(config)?;
    validate_whatsapp(config)?;
    Ok(())
}

fn validate_database(config: &Config) -> Result<()> {
    if config.database.url.trim().is_empty() {
        return Err(ConfigError::missing_field("database", "url"));
    }
    if config.database.pool_size == 0 {
        return Err(ConfigError::invalid_value(
            "database",
            "pool_size",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_ingestion(config: &Config) -> Result<()> {
    let ingestion = &config.ingestion;
    if ingestion.storage_dir.trim().is_empty() {
        return Err(ConfigError::missing_field("ingestion", "storage_dir"));
    }
    if ingestion.default_currency.trim().is_empty() {
        return Err(ConfigError::missing_field("ingestion", "default_currency"));
    }
    if ingestion.job_queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "ingestion",
            "job_queue_size",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_extraction(config: &Config) -> Result<()> {
    let extraction = &config.extraction;
    if extraction.enable_llm_extraction
        && extraction.llm_api_key.as_deref().unwrap_or("").is_empty()
    {
        return Err(ConfigError::missing_field("extraction", "llm_api_key"));
    }
    let threshold = extraction.embedding_similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::invalid_value(
            "extraction",
            "embedding_similarity_threshold",
            "must be within (0, 1]",
        ));
    }
    if extraction.embedding_candidate_cap == 0 {
        return Err(ConfigError::invalid_value(
            "extraction",
            "embedding_candidate_cap",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_whatsapp(config: &Config) -> Result<()> {
    let whatsapp = &config.whatsapp;
    if whatsapp.ingest_signature_ttl_seconds <= 0 {
        return Err(ConfigError::invalid_value(
            "whatsapp",
            "ingest_signature_ttl_seconds",
            "must be > 0",
        ));
    }
    if whatsapp.ingest_rate_limit_per_minute == 0 {
        return Err(ConfigError::invalid_value(
            "whatsapp",
            "ingest_rate_limit_per_minute",
            "must be at least 1",
        ));
    }
    if whatsapp.ingest_rate_limit_burst == 0 {
        return Err(ConfigError::invalid_value(
            "whatsapp",
            "ingest_rate_limit_burst",
            "must be at least 1",
        ));
    }
    if whatsapp.content_hash_window_hours <= 0 {
        return Err(ConfigError::invalid_value(
            "whatsapp",
            "content_hash_window_hours",
            "must be > 0",
        ));
    }
    if whatsapp.extract_debounce_seconds < 0.0 {
        return Err(ConfigError::invalid_value(
            "whatsapp",
            "extract_debounce_seconds",
            "must be >= 0",
        ));
    }
    Ok(())
}

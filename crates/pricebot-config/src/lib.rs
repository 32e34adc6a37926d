//! Pricebot Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use pricebot_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[ingestion]\ndefault_currency = \"USD\"").unwrap();
//! assert_eq!(config.ingestion.default_currency, "USD");
//! ```
//!
//! # Example Minimal Config
//!
//! ```toml
//! [database]
//! url = "data/pricebot.db"
//!
//! [whatsapp]
//! ingest_token = "change-me"
//! ```
//!
//! Secrets can also arrive from the environment (`PRICEBOT_DATABASE_URL`,
//! `PRICEBOT_WHATSAPP_INGEST_TOKEN`, `PRICEBOT_WHATSAPP_HMAC_SECRET`,
//! `PRICEBOT_LLM_API_KEY`, `PRICEBOT_ADMIN_PASSWORD`), which override the
//! file so deployment manifests never need plaintext credentials.

mod admin;
mod database;
mod error;
mod extraction;
mod ingestion;
mod logging;
mod server;
mod validation;
mod whatsapp;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use admin::AdminConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, Result};
pub use extraction::ExtractionConfig;
pub use ingestion::IngestionConfig;
pub use logging::LogConfig;
pub use server::ServerConfig;
pub use whatsapp::WhatsAppConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server and environment settings
    pub server: ServerConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Upload ingestion and job-runner settings
    pub ingestion: IngestionConfig,

    /// Optional extraction capabilities (LLM, vision, embeddings)
    pub extraction: ExtractionConfig,

    /// WhatsApp live-ingest settings
    pub whatsapp: WhatsAppConfig,

    /// Admin basic-auth settings
    pub admin: AdminConfig,
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    fn parse(s: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Overlay secret-bearing fields from `PRICEBOT_*` environment variables
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PRICEBOT_DATABASE_URL")
            && !url.is_empty()
        {
            self.database.url = url;
        }
        if let Ok(token) = std::env::var("PRICEBOT_WHATSAPP_INGEST_TOKEN")
            && !token.is_empty()
        {
            self.whatsapp.ingest_token = Some(token);
        }
        if let Ok(secret) = std::env::var("PRICEBOT_WHATSAPP_HMAC_SECRET")
            && !secret.is_empty()
        {
            self.whatsapp.ingest_hmac_secret = Some(secret);
        }
        if let Ok(key) = std::env::var("PRICEBOT_LLM_API_KEY")
            && !key.is_empty()
        {
            self.extraction.llm_api_key = Some(key);
        }
        if let Ok(password) = std::env::var("PRICEBOT_ADMIN_PASSWORD")
            && !password.is_empty()
        {
            self.admin.password = Some(password);
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.ingestion.default_currency, "USD");
        assert_eq!(config.whatsapp.ingest_signature_ttl_seconds, 300);
        assert_eq!(config.database.pool_size, 20);
    }

    #[test]
    fn test_partial_section_override() {
        let config = Config::from_str(
            r#"
            [whatsapp]
            ingest_token = "secret"
            ingest_rate_limit_per_minute = 2
            ingest_rate_limit_burst = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.whatsapp.ingest_token.as_deref(), Some("secret"));
        assert_eq!(config.whatsapp.ingest_rate_limit_per_minute, 2);
        // Untouched fields keep defaults
        assert_eq!(config.whatsapp.content_hash_window_hours, 24);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_str("whatsapp = [").is_err());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricebot.toml");
        std::fs::write(&path, "[server]\nenvironment = \"prod\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.server.is_production());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::from_file("definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("not/here.toml"));
    }
}

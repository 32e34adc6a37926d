//! Server and environment settings

use serde::Deserialize;

/// HTTP server and deployment-environment settings
///
/// All fields have sensible defaults - you only need to specify what you want to change.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Service name used in diagnostics output
    /// Default: "Pricebot API"
    pub app_name: String,

    /// Deployment environment: "local", "staging", "prod"
    /// Default: "local"
    pub environment: String,

    /// Bind address for the HTTP listener
    /// Default: "0.0.0.0:8000"
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: "Pricebot API".into(),
            environment: "local".into(),
            bind_addr: "0.0.0.0:8000".into(),
        }
    }
}

impl ServerConfig {
    /// True when running in a production environment
    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "prod" | "production")
    }

    /// True when running locally (admin auth is disabled here)
    pub fn is_local(&self) -> bool {
        self.environment.eq_ignore_ascii_case("local")
    }
}

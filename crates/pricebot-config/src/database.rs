//! Database settings

use serde::Deserialize;

/// Relational database settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string. For the embedded engine this is a file path;
    /// ":memory:" opens an in-memory database (tests).
    /// Default: "data/pricebot.db"
    pub url: String,

    /// Connection handles kept warm by the pool
    /// Default: 20
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "data/pricebot.db".into(),
            pool_size: 20,
        }
    }
}

//! Logging settings

use serde::Deserialize;

/// Log output settings consumed by the binary's tracing setup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    /// Default: "info"
    pub level: String,

    /// Emit ANSI colors
    /// Default: true
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            ansi: true,
        }
    }
}

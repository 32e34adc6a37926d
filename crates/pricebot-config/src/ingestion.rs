//! Ingestion pipeline settings

use serde::Deserialize;

/// Upload ingestion and background job settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory where uploaded artefacts are persisted
    /// Default: "storage"
    pub storage_dir: String,

    /// Fallback currency code applied when a row carries none
    /// Default: "USD"
    pub default_currency: String,

    /// Minimum printable non-whitespace characters for embedded PDF text
    /// to be trusted without the vision fallback
    /// Default: 200
    pub min_pdf_text_chars: usize,

    /// Worker threads for the background job runner
    /// Default: None (auto = number of CPU cores)
    pub job_workers: Option<usize>,

    /// Capacity of the job queue; enqueue never blocks below this
    /// Default: 256
    pub job_queue_size: usize,

    /// Seconds granted to in-flight jobs on shutdown before abort
    /// Default: 30
    pub shutdown_grace_seconds: u64,

    /// A `running` job older than this at startup is reconciled to `failed`
    /// Default: 3600
    pub stale_running_seconds: i64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            storage_dir: "storage".into(),
            default_currency: "USD".into(),
            min_pdf_text_chars: 200,
            job_workers: None,
            job_queue_size: 256,
            shutdown_grace_seconds: 30,
            stale_running_seconds: 3600,
        }
    }
}

impl IngestionConfig {
    /// Effective worker count: configured value or the CPU count
    pub fn effective_job_workers(&self) -> usize {
        self.job_workers.unwrap_or_else(num_cpus).max(1)
    }
}

/// Number of available CPUs, defaulting to 4 if detection fails
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestionConfig::default();
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.min_pdf_text_chars, 200);
        assert_eq!(config.shutdown_grace_seconds, 30);
        assert!(config.effective_job_workers() >= 1);
    }
}

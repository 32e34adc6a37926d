//! Processor error types
//!
//! Row-level problems never surface here; they are recorded as warnings on
//! the processor output. These errors are for failures that sink the whole
//! artefact.

use std::io;
use thiserror::Error;

/// Result type for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Errors that fail an entire extraction run
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// No processor accepts the file extension
    #[error("unsupported file type '{extension}'")]
    UnsupportedFileType {
        /// The offending extension (may be empty)
        extension: String,
    },

    /// Caller named a processor that does not exist
    #[error("unknown processor '{name}'")]
    UnknownProcessor {
        /// The requested name
        name: String,
    },

    /// The artefact could not be read
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Path to the artefact
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The artefact could not be decoded as its declared format
    #[error("failed to load {format}: {message}")]
    Load {
        /// Format label (e.g., "spreadsheet")
        format: &'static str,
        /// Decode failure detail
        message: String,
    },
}

impl ProcessorError {
    pub fn unsupported(extension: impl Into<String>) -> Self {
        Self::UnsupportedFileType {
            extension: extension.into(),
        }
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownProcessor { name: name.into() }
    }

    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn load(format: &'static str, message: impl Into<String>) -> Self {
        Self::Load {
            format,
            message: message.into(),
        }
    }
}

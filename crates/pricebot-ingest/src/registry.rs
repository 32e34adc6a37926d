//! Processor registry
//!
//! A closed set of processors with a name-keyed lookup for caller-selected
//! processing and an extension table for automatic selection. Constructed at
//! startup and passed by handle; there is no global registry.

use std::path::Path;

use crate::document;
use crate::error::{ProcessorError, Result};
use crate::spreadsheet;
use crate::types::{IngestContext, ProcessorOutput};
use crate::whatsapp_text;

/// The closed set of extraction strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    Spreadsheet,
    DocumentText,
    WhatsAppText,
}

impl Processor {
    /// Stable wire name (upload forms, job rows, logs)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spreadsheet => "spreadsheet",
            Self::DocumentText => "document_text",
            Self::WhatsAppText => "whatsapp_text",
        }
    }

    /// Look up by wire name
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "spreadsheet" => Ok(Self::Spreadsheet),
            "document_text" => Ok(Self::DocumentText),
            "whatsapp_text" => Ok(Self::WhatsAppText),
            other => Err(ProcessorError::unknown(other)),
        }
    }

    /// True when this processor handles the extension
    pub fn accepts(&self, path: &Path) -> bool {
        let extension = extension_of(path);
        match self {
            Self::Spreadsheet => matches!(extension.as_str(), "xlsx" | "xls" | "csv"),
            Self::DocumentText => document::accepts(&extension),
            Self::WhatsAppText => extension == "txt",
        }
    }

    /// Run the processor over one artefact
    pub async fn process(&self, path: &Path, ctx: &IngestContext) -> Result<ProcessorOutput> {
        match self {
            Self::Spreadsheet => spreadsheet::process(path, ctx).await,
            Self::DocumentText => document::process(path, ctx).await,
            Self::WhatsAppText => whatsapp_text::process(path, ctx).await,
        }
    }
}

/// Registry handle: explicit selection plus the extension table
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorRegistry;

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self
    }

    /// All processors, in selection order
    pub fn all(&self) -> [Processor; 3] {
        [
            Processor::Spreadsheet,
            Processor::DocumentText,
            Processor::WhatsAppText,
        ]
    }

    /// Resolve a processor: caller-named when given (and "auto" means
    /// unset), otherwise by extension
    pub fn resolve(&self, name: Option<&str>, path: &Path) -> Result<Processor> {
        match name {
            Some(name) if !name.is_empty() && name != "auto" => Processor::by_name(name),
            _ => self.select_for(path),
        }
    }

    /// Extension-table selection
    pub fn select_for(&self, path: &Path) -> Result<Processor> {
        self.all()
            .into_iter()
            .find(|processor| processor.accepts(path))
            .ok_or_else(|| {
                let extension = extension_of(path);
                ProcessorError::unsupported(if extension.is_empty() {
                    String::new()
                } else {
                    format!(".{extension}")
                })
            })
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    #[test]
    fn test_extension_table() {
        let registry = ProcessorRegistry::new();
        assert_eq!(
            registry.select_for(&path("list.xlsx")).unwrap(),
            Processor::Spreadsheet
        );
        assert_eq!(
            registry.select_for(&path("list.XLS")).unwrap(),
            Processor::Spreadsheet
        );
        assert_eq!(
            registry.select_for(&path("list.csv")).unwrap(),
            Processor::Spreadsheet
        );
        assert_eq!(
            registry.select_for(&path("scan.pdf")).unwrap(),
            Processor::DocumentText
        );
        assert_eq!(
            registry.select_for(&path("photo.jpeg")).unwrap(),
            Processor::DocumentText
        );
        assert_eq!(
            registry.select_for(&path("chat.txt")).unwrap(),
            Processor::WhatsAppText
        );
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let registry = ProcessorRegistry::new();
        let err = registry.select_for(&path("archive.zip")).unwrap_err();
        assert!(matches!(err, ProcessorError::UnsupportedFileType { .. }));
        assert!(err.to_string().contains(".zip"));
    }

    #[test]
    fn test_explicit_name_wins_over_extension() {
        let registry = ProcessorRegistry::new();
        let processor = registry
            .resolve(Some("whatsapp_text"), &path("export.csv"))
            .unwrap();
        assert_eq!(processor, Processor::WhatsAppText);
    }

    #[test]
    fn test_auto_falls_back_to_extension() {
        let registry = ProcessorRegistry::new();
        let processor = registry.resolve(Some("auto"), &path("list.csv")).unwrap();
        assert_eq!(processor, Processor::Spreadsheet);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let registry = ProcessorRegistry::new();
        assert!(matches!(
            registry.resolve(Some("imaginary"), &path("a.csv")),
            Err(ProcessorError::UnknownProcessor { .. })
        ));
    }
}

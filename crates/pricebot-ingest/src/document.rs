//! Document processor (PDF and image artefacts)
//!
//! PDFs get an embedded-text pass first; when that yields too little
//! printable content - or the artefact is an image - the bytes go
//! base64-encoded to the vision capability. Either way the recovered text
//! runs through the shared line parser, since price sheets and chat
//! transcripts read the same once flattened to lines.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use crate::error::Result;
use crate::lines;
use crate::types::{IngestContext, ProcessorOutput};

/// Image extensions routed here by the registry
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "tif", "tiff"];

/// Process one PDF or image artefact
pub async fn process(path: &Path, ctx: &IngestContext) -> Result<ProcessorOutput> {
    let mut output = ProcessorOutput::default();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let text = if extension == "pdf" {
        match embedded_pdf_text(path, ctx.min_pdf_text_chars) {
            Some(text) => {
                output.facts.extraction_path = Some("embedded_text".into());
                Some(text)
            }
            None => {
                output.warn("embedded pdf text too sparse; using vision extraction");
                vision_text(path, "pdf", ctx, &mut output).await
            }
        }
    } else {
        vision_text(path, &extension, ctx, &mut output).await
    };

    let Some(text) = text else {
        // No text recovered; document completes as processed_with_warnings
        return Ok(output);
    };

    let vendor_hint = ctx.vendor_name.as_deref().or_else(|| {
        path.file_stem().and_then(|stem| stem.to_str())
    });
    let (offers, warnings) = lines::extract_offers_from_lines(text.lines(), vendor_hint);
    output.facts.rows_seen = text.lines().filter(|l| !l.trim().is_empty()).count();
    output.offers = offers;
    output.warnings.extend(warnings);

    if output.offers.is_empty() && output.warnings.is_empty() {
        output.warn("no pricing information recognized from document");
    }

    debug!(
        offers = output.offers.len(),
        path = ?output.facts.extraction_path,
        "document processed"
    );
    Ok(output)
}

/// Embedded text when it clears the printable-character bar
fn embedded_pdf_text(path: &Path, min_chars: usize) -> Option<String> {
    let text = pdf_extract::extract_text(path).ok()?;
    let printable = text.chars().filter(|c| !c.is_whitespace()).count();
    (printable >= min_chars).then_some(text)
}

/// Ship the raw bytes to the vision capability; absence or failure is a
/// warning, never an error
async fn vision_text(
    path: &Path,
    media_kind: &str,
    ctx: &IngestContext,
    output: &mut ProcessorOutput,
) -> Option<String> {
    let Some(vision) = ctx.capabilities.vision.as_ref() else {
        output.warn("vision extraction disabled; no text recovered");
        return None;
    };

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            output.warn(format!("could not read artefact for vision pass: {e}"));
            return None;
        }
    };
    let payload = BASE64.encode(&bytes);

    match vision.extract_text(&payload, media_kind).await {
        Ok(text) => {
            output.facts.extraction_path = Some("vision".into());
            Some(text)
        }
        Err(e) => {
            output.warn(format!("vision extraction failed: {e}"));
            None
        }
    }
}

/// Extensions this processor accepts
pub fn accepts(extension: &str) -> bool {
    extension == "pdf" || IMAGE_EXTENSIONS.contains(&extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait_shim::VisionStub;

    mod async_trait_shim {
        use pricebot_extraction::{ExtractionError, VisionTextExtractor};

        pub struct VisionStub(pub Option<String>);

        #[async_trait::async_trait]
        impl VisionTextExtractor for VisionStub {
            async fn extract_text(
                &self,
                _base64_payload: &str,
                _media_kind: &str,
            ) -> pricebot_extraction::Result<String> {
                match &self.0 {
                    Some(text) => Ok(text.clone()),
                    None => Err(ExtractionError::Unavailable("stub down".into())),
                }
            }
        }
    }

    fn image_fixture() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricelist.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_vision_disabled_yields_warning_not_error() {
        let (_dir, path) = image_fixture();
        let output = process(&path, &IngestContext::new("USD")).await.unwrap();
        assert!(output.offers.is_empty());
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("vision extraction disabled"));
    }

    #[tokio::test]
    async fn test_vision_text_flows_through_line_parser() {
        let (_dir, path) = image_fixture();
        let mut ctx = IngestContext::new("USD");
        ctx.capabilities.vision = Some(std::sync::Arc::new(VisionStub(Some(
            "iPhone 15 $900\nPixel 9 $700\n".to_string(),
        ))));

        let output = process(&path, &ctx).await.unwrap();
        assert_eq!(output.offers.len(), 2);
        assert_eq!(output.facts.extraction_path.as_deref(), Some("vision"));
        assert_eq!(output.offers[0].price, "900".parse().unwrap());
    }

    #[tokio::test]
    async fn test_vision_failure_is_a_warning() {
        let (_dir, path) = image_fixture();
        let mut ctx = IngestContext::new("USD");
        ctx.capabilities.vision = Some(std::sync::Arc::new(VisionStub(None)));

        let output = process(&path, &ctx).await.unwrap();
        assert!(output.offers.is_empty());
        assert!(output.warnings[0].contains("vision extraction failed"));
    }

    #[test]
    fn test_accepts_table() {
        assert!(accepts("pdf"));
        assert!(accepts("png"));
        assert!(accepts("webp"));
        assert!(!accepts("csv"));
    }
}

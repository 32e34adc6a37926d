//! WhatsApp transcript processor
//!
//! Parses exported chat transcripts (`.txt`). Lines are grouped under the
//! last observed sender prefix; the sender becomes the per-offer vendor
//! hint. System notices and reactions never reach the line parser.

use std::path::Path;
use std::sync::LazyLock;

use pricebot_extraction::ExtractionContext;
use regex::Regex;
use tracing::debug;

use crate::error::{ProcessorError, Result};
use crate::lines;
use crate::types::{IngestContext, ProcessorOutput, RawOffer};

/// `[12/01/2025, 10:31] John Deals: iPhone 15 $900`
static TIMESTAMPED_SENDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<ts>[^\]]{4,40})\]\s*(?P<sender>[^:]{1,60}):\s*(?P<text>.*)$")
        .expect("sender regex")
});

/// A bare `10:31` style line separates message groups in some exports
static TIME_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}").expect("time regex"));

/// UI chrome found at the top of phone screenshots exported as text
const CHROME_PREFIXES: [&str; 8] = [
    "groups", "business", "purchase", "wa business", "chats", "calls", "updates", "tools",
];

/// Process one transcript artefact
pub async fn process(path: &Path, ctx: &IngestContext) -> Result<ProcessorOutput> {
    let text = std::fs::read_to_string(path)
        .or_else(|_| {
            // Some exports are latin-1; recover what we can
            std::fs::read(path).map(|bytes| bytes.iter().map(|&b| b as char).collect())
        })
        .map_err(|e| ProcessorError::io(path.display().to_string(), e))?;

    let mut output = parse_transcript(&text, ctx.vendor_name.as_deref());

    let use_llm = ctx.prefer_llm || output.offers.is_empty();
    if use_llm && let Some(llm) = ctx.capabilities.llm.as_ref() {
        let raw_lines: Vec<String> = text.lines().map(str::to_string).collect();
        let context = ExtractionContext {
            vendor_hint: ctx.vendor_name.clone(),
            currency_hint: Some(ctx.default_currency.clone()),
            document_name: path.file_name().and_then(|n| n.to_str()).map(str::to_string),
            document_kind: Some("whatsapp_transcript".into()),
        };
        match llm.extract_offers(&raw_lines, &context).await {
            Ok((extracted, warnings)) if !extracted.is_empty() => {
                let llm_offers: Vec<RawOffer> = extracted
                    .into_iter()
                    .map(|item| {
                        let mut offer = RawOffer::new(item.description, item.price);
                        offer.currency = item.currency;
                        offer.quantity = item.quantity;
                        offer.condition = item.condition;
                        offer.brand = item.brand;
                        offer.model_number = item.model_number;
                        offer.vendor_hint = item.vendor.or_else(|| ctx.vendor_name.clone());
                        offer
                    })
                    .collect();
                // LLM output replaces heuristics when preferred or when
                // heuristics came up empty
                output.offers = llm_offers;
                output.warnings.extend(warnings);
                output.facts.extraction_path = Some("llm".into());
            }
            Ok((_, warnings)) => output.warnings.extend(warnings),
            Err(e) => output.warn(format!("llm extraction unavailable: {e}")),
        }
    }

    if output.offers.is_empty() && output.warnings.is_empty() {
        output.warn("no offers extracted from transcript");
    }

    debug!(
        offers = output.offers.len(),
        warnings = output.warnings.len(),
        "transcript processed"
    );
    Ok(output)
}

/// Heuristic transcript walk shared by the processor and its tests
pub fn parse_transcript(text: &str, declared_vendor: Option<&str>) -> ProcessorOutput {
    let mut output = ProcessorOutput::default();
    output.facts.extraction_path = Some("heuristic".into());

    let mut current_speaker: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let lowered = line.to_lowercase();
        if CHROME_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            continue;
        }
        if lines::is_noise_line(line) {
            continue;
        }

        // `[timestamp] Sender: text` sets the speaker and parses the payload
        if let Some(captures) = TIMESTAMPED_SENDER_RE.captures(line) {
            let sender = captures.name("sender").expect("sender group").as_str().trim();
            current_speaker = Some(sender.to_string());
            let payload = captures.name("text").expect("text group").as_str();
            parse_payload(payload, idx, declared_vendor, current_speaker.as_deref(), &mut output);
            continue;
        }

        // A bare time marker separates groups; the previous speaker no
        // longer owns what follows
        if TIME_ONLY_RE.is_match(line) {
            current_speaker = None;
            continue;
        }

        // `Sender:` on its own short line
        if let Some(name) = line.strip_suffix(':')
            && line.len() <= 40
        {
            current_speaker = Some(name.trim().to_string());
            continue;
        }

        parse_payload(line, idx, declared_vendor, current_speaker.as_deref(), &mut output);
    }

    output
}

fn parse_payload(
    payload: &str,
    line_idx: usize,
    declared_vendor: Option<&str>,
    speaker: Option<&str>,
    output: &mut ProcessorOutput,
) {
    output.facts.rows_seen += 1;
    let vendor_hint = declared_vendor.or(speaker);
    let (offers, warning) = lines::parse_offer_line(payload, vendor_hint);
    output.offers.extend(offers);
    if let Some(warning) = warning {
        let lowered = payload.to_lowercase();
        if lowered.contains('$') || lowered.contains("usd") {
            output.warn(format!("line {}: {}", line_idx + 1, warning));
        }
    }
}

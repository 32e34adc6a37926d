//! Free-form price-line parser
//!
//! The shared tail of the WhatsApp-text and document processors: turn one
//! line of chat or price-sheet prose into zero or more [`RawOffer`] rows.
//!
//! A "price token" is a 2-7 digit amount wearing a currency prefix or
//! suffix. A line qualifies when it has at least one price token and at
//! least one non-price word; every price token on the line yields its own
//! offer with the shared description (the line minus price tokens).

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::types::RawOffer;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Suffix form takes word currencies only; a bare `$` after a number is
    // almost always the prefix of the next price on the same line
    Regex::new(
        r"(?i)(?:(?P<prefix>\$|\b(?:usd|cad|eur|aed|gbp|sgd|aud|inr)\b)\s*(?P<amount>\d{2,7}(?:[.,]\d+)?))|(?:\b(?P<amount_only>\d{2,7}(?:[.,]\d+)?)\s*\b(?P<suffix>usd|cad|eur|aed|gbp|sgd|aud|inr)\b)",
    )
    .expect("price regex")
});

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<qty>\d{1,4})\s?(?:pcs|pc|units?|qty|ct|pieces?|packs?)\b|\b(?:x|qty)\s?(?P<qty2>\d{1,4})\b")
        .expect("quantity regex")
});

/// Closed condition vocabulary; grades stay case-sensitive
const CONDITION_WORDS: [&str; 4] = ["new", "used", "refurbished", "like new"];
const CONDITION_GRADES: [&str; 3] = ["A", "A-", "B"];

/// Marketplace chatter dropped from the front of a description
const LEADING_TOKENS: [&str; 20] = [
    "wtb", "wts", "wtt", "selling", "sell", "buy", "buying", "available", "need", "do", "you",
    "have", "there", "is", "looking", "for", "price", "any", "take", "taking",
];

/// Filler dropped from the tail of a description
const TRAILING_TOKENS: [&str; 9] = [
    "usd", "usd.", "each", "ea", "unit", "units", "firm", "obo", "net",
];

/// WhatsApp system notices and other lines that never carry an offer
const NOISE_PREFIXES: [&str; 16] = [
    "messages and calls are end-to-end encrypted",
    "this chat is with a business account",
    "missed voice call",
    "missed video call",
    "voice call",
    "video call",
    "security code changed",
    "you joined",
    "added you",
    "media omitted",
    "image omitted",
    "video omitted",
    "document omitted",
    "you reacted",
    "reacted to",
    "this message was deleted",
];

/// Bare digits this short at the head of a description are a quantity
const MAX_INLINE_QUANTITY_DIGITS: usize = 4;
/// Bare digits this long are identifiers (IMEI, UPC), never quantities
const MIN_IDENTIFIER_DIGITS: usize = 8;

/// One parsed price occurrence within a line
#[derive(Debug)]
struct PriceToken {
    start: usize,
    end: usize,
    amount: Decimal,
    currency: Option<String>,
}

/// True for reactions, system notices, and other non-offer lines
pub fn is_noise_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    if NOISE_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return true;
    }
    if matches!(lowered.as_str(), "photo" | "video" | "sticker" | "gif") {
        return true;
    }
    // A pure reaction: a couple of glyphs with no alphanumeric content
    trimmed.chars().count() <= 2 && !trimmed.chars().any(|c| c.is_ascii_alphanumeric())
}

/// Parse one line into offers
///
/// Returns the offers plus an optional warning for lines that looked like
/// price content but could not be parsed.
pub fn parse_offer_line(line: &str, vendor_hint: Option<&str>) -> (Vec<RawOffer>, Option<String>) {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_noise_line(trimmed) {
        return (Vec::new(), None);
    }

    let tokens = find_price_tokens(trimmed);
    if tokens.is_empty() {
        return (Vec::new(), None);
    }

    let remainder = strip_spans(trimmed, &tokens);
    let (description, inline_quantity, identifiers) = clean_description(&remainder);

    let Some(description) = description else {
        return (
            Vec::new(),
            Some(format!("could not determine product name from '{trimmed}'")),
        );
    };

    let quantity = inline_quantity.or_else(|| parse_quantity(&remainder));
    let condition = parse_condition(&remainder);

    let mut payload = serde_json::Map::new();
    payload.insert("line".into(), serde_json::Value::String(trimmed.to_string()));
    if !identifiers.is_empty() {
        payload.insert(
            "identifiers".into(),
            serde_json::Value::Array(
                identifiers
                    .into_iter()
                    .map(serde_json::Value::String)
                    .collect(),
            ),
        );
    }
    let payload = serde_json::Value::Object(payload);

    let offers = tokens
        .into_iter()
        .map(|token| {
            let mut offer = RawOffer::new(description.clone(), token.amount);
            offer.currency = token.currency;
            offer.quantity = quantity;
            offer.condition = condition.clone();
            offer.vendor_hint = vendor_hint.map(str::to_string);
            offer.raw_payload = Some(payload.clone());
            offer
        })
        .collect();

    (offers, None)
}

/// Parse a whole text block; warnings only for lines that carried price
/// markers yet failed to parse
pub fn extract_offers_from_lines(
    lines: impl IntoIterator<Item = impl AsRef<str>>,
    vendor_hint: Option<&str>,
) -> (Vec<RawOffer>, Vec<String>) {
    let mut offers = Vec::new();
    let mut warnings = Vec::new();

    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        let (parsed, warning) = parse_offer_line(line, vendor_hint);
        offers.extend(parsed);
        if let Some(warning) = warning {
            let lowered = line.to_lowercase();
            if lowered.contains('$') || lowered.contains("usd") {
                warnings.push(format!("line {}: {}", idx + 1, warning));
            }
        }
    }

    (offers, warnings)
}

fn find_price_tokens(line: &str) -> Vec<PriceToken> {
    let mut tokens = Vec::new();
    for captures in PRICE_RE.captures_iter(line) {
        let full = captures.get(0).expect("regex match");
        let amount_text = captures
            .name("amount")
            .or_else(|| captures.name("amount_only"))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let Some(amount) = parse_amount(amount_text) else {
            continue;
        };
        let currency = captures
            .name("prefix")
            .or_else(|| captures.name("suffix"))
            .map(|m| normalize_currency(m.as_str()));
        tokens.push(PriceToken {
            start: full.start(),
            end: full.end(),
            amount,
            currency,
        });
    }
    tokens
}

fn parse_amount(text: &str) -> Option<Decimal> {
    let normalized = text.replace(',', "").replace(' ', "");
    let amount = normalized.parse::<Decimal>().ok()?;
    (amount > Decimal::ZERO).then_some(amount)
}

fn normalize_currency(token: &str) -> String {
    let upper = token.trim().to_uppercase();
    if upper == "$" { "USD".to_string() } else { upper }
}

/// Remove matched spans and squeeze separators
fn strip_spans(line: &str, tokens: &[PriceToken]) -> String {
    let mut remainder = String::with_capacity(line.len());
    let mut cursor = 0;
    for token in tokens {
        if token.start > cursor {
            remainder.push_str(&line[cursor..token.start]);
            remainder.push(' ');
        }
        cursor = token.end;
    }
    if cursor < line.len() {
        remainder.push_str(&line[cursor..]);
    }
    remainder
}

/// Token-filter the description: drop chatter, pull a leading quantity,
/// set aside long digit runs as identifiers
fn clean_description(raw: &str) -> (Option<String>, Option<i64>, Vec<String>) {
    let mut filtered: Vec<String> = Vec::new();
    let mut quantity: Option<i64> = None;
    let mut identifiers: Vec<String> = Vec::new();

    for token in raw.split_whitespace() {
        let stripped = token.trim_matches(|c: char| matches!(c, ',' | '-' | '/' | ':' | '|')).trim();
        if stripped.is_empty() {
            continue;
        }
        let lowered = stripped.to_lowercase();
        if filtered.is_empty() && LEADING_TOKENS.contains(&lowered.as_str()) {
            continue;
        }
        if filtered.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            if quantity.is_none() && stripped.len() <= MAX_INLINE_QUANTITY_DIGITS {
                quantity = stripped.parse().ok();
                continue;
            }
            if stripped.len() >= MIN_IDENTIFIER_DIGITS {
                identifiers.push(stripped.to_string());
                continue;
            }
        }
        filtered.push(stripped.to_string());
    }

    while let Some(first) = filtered.first() {
        if LEADING_TOKENS.contains(&first.to_lowercase().as_str()) {
            filtered.remove(0);
        } else {
            break;
        }
    }
    while let Some(last) = filtered.last() {
        if TRAILING_TOKENS.contains(&last.to_lowercase().as_str()) {
            filtered.pop();
        } else {
            break;
        }
    }

    let description = filtered.join(" ");
    let description = description.trim_matches(|c: char| matches!(c, ' ' | ',' | '-' | '/'));
    if description.is_empty() {
        (None, quantity, identifiers)
    } else {
        (Some(description.to_string()), quantity, identifiers)
    }
}

fn parse_quantity(line: &str) -> Option<i64> {
    let captures = QUANTITY_RE.captures(line)?;
    captures
        .name("qty")
        .or_else(|| captures.name("qty2"))?
        .as_str()
        .parse()
        .ok()
}

/// Find a condition token in the price-stripped remainder
fn parse_condition(remainder: &str) -> Option<String> {
    let lowered = remainder.to_lowercase();
    let lowered_tokens: Vec<&str> = lowered.split_whitespace().collect();

    // Two-word form first
    for window in lowered_tokens.windows(2) {
        if window.join(" ") == "like new" {
            return Some("like new".to_string());
        }
    }
    for token in &lowered_tokens {
        let bare = token.trim_matches(|c: char| matches!(c, ',' | '.' | ';'));
        if CONDITION_WORDS.contains(&bare) && bare != "like" {
            return Some(bare.to_string());
        }
    }
    for token in remainder.split_whitespace() {
        let bare = token.trim_matches(|c: char| matches!(c, ',' | '.' | ';'));
        if CONDITION_GRADES.contains(&bare) {
            return Some(bare.to_string());
        }
    }
    None
}

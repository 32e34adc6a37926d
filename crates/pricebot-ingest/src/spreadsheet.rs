//! Spreadsheet processor
//!
//! Reads `.csv` via the csv crate and `.xlsx`/`.xls` via calamine, locates
//! the header row by dictionary match, coerces cells, and emits one
//! [`RawOffer`] per priced row. Row-level problems become warnings; the
//! output is deterministic per input.

use std::collections::BTreeMap;
use std::path::Path;

use pricebot_extraction::ExtractionContext;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{ProcessorError, Result};
use crate::types::{IngestContext, ProcessorOutput, RawOffer};

// =============================================================================
// Header dictionary (frozen; the test below is the published fixture)
// =============================================================================

pub const DESCRIPTION_KEYS: &[&str] = &["description", "item", "product", "model", "device", "name"];

pub const PRICE_KEYS: &[&str] = &[
    "price",
    "unit price",
    "sell price",
    "offer price",
    "amount",
    "usd",
    "cost",
    "net price",
];

pub const QUANTITY_KEYS: &[&str] = &[
    "qty",
    "quantity",
    "available",
    "stock",
    "qty available",
    "moq",
    "minimum order quantity",
    "min order",
    "min qty",
];

pub const SKU_KEYS: &[&str] = &["sku", "model sku", "model number", "model#", "mpn", "part number"];

pub const UPC_KEYS: &[&str] = &["upc", "ean"];

pub const CONDITION_KEYS: &[&str] = &["condition", "grade"];

pub const LOCATION_KEYS: &[&str] = &["warehouse", "location", "city", "hub", "region"];

pub const VENDOR_KEYS: &[&str] = &["vendor", "supplier"];

pub const NOTES_KEYS: &[&str] = &["notes", "comments", "remarks"];

/// Rows scanned while hunting for the header
const HEADER_SCAN_LIMIT: usize = 15;

/// Minimum dictionary hits for a row to count as the header
const HEADER_MATCH_THRESHOLD: usize = 2;

/// The complete header vocabulary
pub fn header_vocabulary() -> Vec<&'static str> {
    [
        DESCRIPTION_KEYS,
        PRICE_KEYS,
        QUANTITY_KEYS,
        SKU_KEYS,
        UPC_KEYS,
        CONDITION_KEYS,
        LOCATION_KEYS,
        VENDOR_KEYS,
        NOTES_KEYS,
    ]
    .concat()
}

/// Canonical upload template served by the documents API
pub const VENDOR_PRICE_TEMPLATE: &str = "\
MODEL/SKU,DESCRIPTION,PRICE,QTY,CONDITION,UPC,WAREHOUSE,NOTES\n\
A1,iPhone 11 64GB Black,485.00,150,A/A-,190199220546,Dubai,\n\
A2,iPhone 12 128GB,600,10,New,,Hong Kong,ships friday\n";

// =============================================================================
// Processor
// =============================================================================

/// Process one spreadsheet artefact
pub async fn process(path: &Path, ctx: &IngestContext) -> Result<ProcessorOutput> {
    let sheets = load_sheets(path)?;
    let mut output = ProcessorOutput::default();
    output.facts.currency_hint = Some(ctx.default_currency.clone());

    let mut failed_rows: Vec<String> = Vec::new();

    for (sheet_name, rows) in &sheets {
        process_sheet(sheet_name, rows, &mut output, &mut failed_rows);
    }

    if output.offers.is_empty() && output.warnings.is_empty() {
        output.warn("no offers extracted from spreadsheet");
    }

    let use_llm = ctx.prefer_llm || output.offers.is_empty();
    if use_llm && !failed_rows.is_empty() {
        llm_fallback(ctx, &failed_rows, &mut output).await;
    }

    debug!(
        offers = output.offers.len(),
        warnings = output.warnings.len(),
        "spreadsheet processed"
    );
    Ok(output)
}

fn process_sheet(
    sheet_name: &str,
    rows: &[Vec<String>],
    output: &mut ProcessorOutput,
    failed_rows: &mut Vec<String>,
) {
    let rows: Vec<&Vec<String>> = rows
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();
    if rows.is_empty() {
        return;
    }

    match find_header_row(&rows) {
        Some(header_idx) => {
            let keys: Vec<String> = rows[header_idx].iter().map(|c| normalize_key(c)).collect();
            for (offset, row) in rows[header_idx + 1..].iter().enumerate() {
                let row_number = header_idx + 2 + offset;
                output.facts.rows_seen += 1;
                if looks_like_header(row) {
                    continue;
                }
                let cells = keyed_cells(&keys, row);
                match row_to_offer(&cells) {
                    Some(offer) => output.offers.push(offer),
                    None => {
                        failed_rows.push(format_row(&cells));
                        output.warn(format!(
                            "{sheet_name} row {row_number}: missing price or description"
                        ));
                    }
                }
            }
        }
        None => headerless_sheet(sheet_name, &rows, output, failed_rows),
    }
}

/// Positional fallback: (description, price, quantity) once a text column
/// sits next to a numeric one
fn headerless_sheet(
    sheet_name: &str,
    rows: &[&Vec<String>],
    output: &mut ProcessorOutput,
    failed_rows: &mut Vec<String>,
) {
    let Some((desc_idx, price_idx)) = rows.iter().find_map(|row| {
        row.iter().enumerate().find_map(|(i, cell)| {
            let next = row.get(i + 1)?;
            (!cell.is_empty()
                && parse_price(cell).is_none()
                && parse_price(next).is_some())
            .then_some((i, i + 1))
        })
    }) else {
        output.warn(format!("{sheet_name}: no header row recognized"));
        return;
    };

    for (idx, row) in rows.iter().enumerate() {
        output.facts.rows_seen += 1;
        let description = row.get(desc_idx).filter(|c| !c.is_empty());
        let price = row.get(price_idx).and_then(|c| parse_price(c));
        match (description, price) {
            (Some(description), Some(price)) => {
                let mut offer = RawOffer::new(description.clone(), price);
                offer.quantity = row.get(price_idx + 1).and_then(|c| parse_int(c));
                offer.raw_payload = Some(serde_json::json!({ "cells": row }));
                output.offers.push(offer);
            }
            _ => {
                failed_rows.push(row.join(", "));
                output.warn(format!(
                    "{sheet_name} row {}: missing price or description",
                    idx + 1
                ));
            }
        }
    }
}

fn row_to_offer(cells: &BTreeMap<String, String>) -> Option<RawOffer> {
    let price = extract_price(cells)?;
    let description = extract_by_keys(cells, DESCRIPTION_KEYS)
        .or_else(|| first_non_numeric(cells))?;

    let mut offer = RawOffer::new(description, price);
    offer.quantity = extract_by_keys(cells, QUANTITY_KEYS).and_then(|v| parse_int(&v));
    offer.condition = extract_by_keys(cells, CONDITION_KEYS);
    offer.model_number = extract_by_keys(cells, SKU_KEYS);
    offer.upc = extract_by_keys(cells, UPC_KEYS)
        .map(|upc| normalize_upc(&upc))
        .filter(|upc| !upc.is_empty());
    offer.location = extract_by_keys(cells, LOCATION_KEYS);
    offer.vendor_hint = extract_by_keys(cells, VENDOR_KEYS);
    offer.notes = extract_by_keys(cells, NOTES_KEYS);
    offer.raw_payload = serde_json::to_value(cells).ok();
    Some(offer)
}

// =============================================================================
// Loading
// =============================================================================

type Sheet = (String, Vec<Vec<String>>);

fn load_sheets(path: &Path) -> Result<Vec<Sheet>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "csv" => load_csv(path),
        "xlsx" | "xls" => load_excel(path),
        other => Err(ProcessorError::unsupported(format!(".{other}"))),
    }
}

fn load_csv(path: &Path) -> Result<Vec<Sheet>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ProcessorError::load("spreadsheet", e.to_string()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ProcessorError::load("spreadsheet", e.to_string()))?;
        rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }
    Ok(vec![("sheet1".to_string(), rows)])
}

fn load_excel(path: &Path) -> Result<Vec<Sheet>> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| ProcessorError::load("spreadsheet", e.to_string()))?;

    let mut sheets = Vec::new();
    for (name, range) in workbook.worksheets() {
        let rows = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::Empty => String::new(),
                        other => other.to_string().trim().to_string(),
                    })
                    .collect()
            })
            .collect();
        sheets.push((name, rows));
    }
    Ok(sheets)
}

// =============================================================================
// Header detection & cell coercion
// =============================================================================

/// Lowercase and fold punctuation to spaces so "MODEL/SKU" and
/// "Unit Price" both hit the dictionary
pub fn normalize_key(key: &str) -> String {
    let mut folded = String::with_capacity(key.len());
    for c in key.trim().to_lowercase().chars() {
        match c {
            '/' | '-' | '#' | '.' | '(' | ')' | ':' | '&' | '@' | ',' | '\n' => folded.push(' '),
            other => folded.push(other),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_header_key(key: &str) -> bool {
    header_vocabulary().contains(&key)
}

fn find_header_row(rows: &[&Vec<String>]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, row) in rows.iter().take(HEADER_SCAN_LIMIT).enumerate() {
        let score = row
            .iter()
            .filter(|cell| !cell.is_empty())
            .filter(|cell| is_header_key(&normalize_key(cell)))
            .count();
        if score >= HEADER_MATCH_THRESHOLD && best.is_none_or(|(_, s)| score > s) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

fn looks_like_header(row: &[String]) -> bool {
    row.iter()
        .filter(|cell| !cell.is_empty())
        .filter(|cell| is_header_key(&normalize_key(cell)))
        .count()
        >= HEADER_MATCH_THRESHOLD
}

fn keyed_cells(keys: &[String], row: &[String]) -> BTreeMap<String, String> {
    keys.iter()
        .zip(row.iter())
        .filter(|(key, cell)| !key.is_empty() && !cell.is_empty())
        .map(|(key, cell)| (key.clone(), cell.clone()))
        .collect()
}

fn extract_by_keys(cells: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    // Exact key first, then substring (covers "qty available (pcs)")
    for key in keys {
        if let Some(value) = cells.get(*key) {
            return Some(value.clone());
        }
    }
    cells
        .iter()
        .find(|(cell_key, _)| keys.iter().any(|key| cell_key.contains(key)))
        .map(|(_, value)| value.clone())
}

fn extract_price(cells: &BTreeMap<String, String>) -> Option<Decimal> {
    for key in PRICE_KEYS {
        if let Some(value) = cells.get(*key)
            && let Some(price) = parse_price(value)
        {
            return Some(price);
        }
    }
    if let Some(price) = cells
        .iter()
        .filter(|(cell_key, _)| PRICE_KEYS.iter().any(|key| cell_key.contains(key)))
        .find_map(|(_, value)| parse_price(value))
    {
        return Some(price);
    }
    // Last resort: any numeric cell outside quantity-ish columns
    cells
        .iter()
        .filter(|(cell_key, _)| {
            !QUANTITY_KEYS.iter().any(|key| cell_key.contains(key))
                && !UPC_KEYS.iter().any(|key| cell_key.contains(key))
        })
        .find_map(|(_, value)| parse_price(value))
}

fn first_non_numeric(cells: &BTreeMap<String, String>) -> Option<String> {
    cells
        .values()
        .find(|value| parse_price(value).is_none())
        .cloned()
}

/// Strip currency decorations and parse a positive decimal
pub fn parse_price(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' '))
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    let price = cleaned.parse::<Decimal>().ok()?;
    (price > Decimal::ZERO).then_some(price)
}

fn parse_int(value: &str) -> Option<i64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().map(|f| f as i64))
}

/// Digits only; discard when too short to be a real code
pub fn normalize_upc(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn format_row(cells: &BTreeMap<String, String>) -> String {
    let mut parts: Vec<String> = cells.iter().map(|(k, v)| format!("{k}={v}")).collect();
    parts.sort();
    parts.join(", ")
}

// =============================================================================
// LLM fallback
// =============================================================================

async fn llm_fallback(ctx: &IngestContext, failed_rows: &[String], output: &mut ProcessorOutput) {
    let Some(llm) = ctx.capabilities.llm.as_ref() else {
        return;
    };

    let context = ExtractionContext {
        vendor_hint: ctx.vendor_name.clone(),
        currency_hint: Some(ctx.default_currency.clone()),
        document_name: None,
        document_kind: Some("spreadsheet_rows".into()),
    };
    let lines: Vec<String> = failed_rows.to_vec();

    match llm.extract_offers(&lines, &context).await {
        Ok((extracted, warnings)) => {
            for item in extracted {
                let mut offer = RawOffer::new(item.description, item.price);
                offer.currency = item.currency;
                offer.quantity = item.quantity;
                offer.condition = item.condition;
                offer.brand = item.brand;
                offer.model_number = item.model_number;
                offer.upc = item
                    .upc
                    .map(|upc| normalize_upc(&upc))
                    .filter(|upc| !upc.is_empty());
                offer.location = item.location;
                offer.vendor_hint = item.vendor;
                output.offers.push(offer);
            }
            output.warnings.extend(warnings);
            output.facts.extraction_path = Some("heuristic+llm".into());
        }
        Err(e) => output.warn(format!("llm fallback unavailable: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn process_csv(content: &str) -> ProcessorOutput {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();

        process(&path, &IngestContext::new("USD")).await.unwrap()
    }

    #[test]
    fn header_vocabulary_is_frozen() {
        // Published fixture: the full dictionary, grouped.
        let expected: Vec<&str> = vec![
            "description", "item", "product", "model", "device", "name",
            "price", "unit price", "sell price", "offer price", "amount", "usd", "cost", "net price",
            "qty", "quantity", "available", "stock", "qty available", "moq",
            "minimum order quantity", "min order", "min qty",
            "sku", "model sku", "model number", "model#", "mpn", "part number",
            "upc", "ean",
            "condition", "grade",
            "warehouse", "location", "city", "hub", "region",
            "vendor", "supplier",
            "notes", "comments", "remarks",
        ];
        assert_eq!(header_vocabulary(), expected);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("MODEL/SKU"), "model sku");
        assert_eq!(normalize_key(" Unit  Price "), "unit price");
        assert_eq!(normalize_key("Qty\nAvailable"), "qty available");
        assert_eq!(normalize_key("Model#"), "model");
    }

    #[tokio::test]
    async fn test_happy_path_two_rows() {
        let output = process_csv(
            "MODEL/SKU,DESCRIPTION,PRICE,QTY,CONDITION\n\
             A1,iPhone 11 64GB Black,485.00,150,A/A-\n\
             A2,iPhone 12 128GB,600,10,New\n",
        )
        .await;

        assert_eq!(output.offers.len(), 2);
        assert!(output.warnings.is_empty());

        let first = &output.offers[0];
        assert_eq!(first.description, "iPhone 11 64GB Black");
        assert_eq!(first.price, "485.00".parse().unwrap());
        assert_eq!(first.quantity, Some(150));
        assert_eq!(first.condition.as_deref(), Some("A/A-"));
        assert_eq!(first.model_number.as_deref(), Some("A1"));

        let second = &output.offers[1];
        assert_eq!(second.price, "600".parse().unwrap());
        assert_eq!(second.condition.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn test_malformed_rows_become_warnings() {
        let output = process_csv(
            "DESCRIPTION,PRICE,QTY\n\
             iPhone 11,485.00,150\n\
             ,,\n\
             no price here,,5\n\
             iPhone 12,600,\n",
        )
        .await;

        // Fully empty row is dropped; the priceless row warns
        assert_eq!(output.offers.len(), 2);
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("missing price or description"));
    }

    #[tokio::test]
    async fn test_currency_symbols_are_stripped() {
        let output = process_csv(
            "DESCRIPTION,PRICE\n\
             iPhone 11,\"$1,485.00\"\n",
        )
        .await;
        assert_eq!(output.offers.len(), 1);
        assert_eq!(output.offers[0].price, "1485.00".parse().unwrap());
    }

    #[tokio::test]
    async fn test_preamble_before_header_is_skipped() {
        let output = process_csv(
            "Acme Traders weekly list,,\n\
             ,,\n\
             DESCRIPTION,PRICE,QTY\n\
             iPhone 11,485,150\n",
        )
        .await;
        assert_eq!(output.offers.len(), 1);
        assert_eq!(output.offers[0].description, "iPhone 11");
    }

    #[tokio::test]
    async fn test_headerless_positional_fallback() {
        let output = process_csv(
            "iPhone 11 64GB,485.00,150\n\
             iPhone 12 128GB,600,10\n",
        )
        .await;
        assert_eq!(output.offers.len(), 2);
        assert_eq!(output.offers[0].description, "iPhone 11 64GB");
        assert_eq!(output.offers[0].quantity, Some(150));
    }

    #[tokio::test]
    async fn test_repeated_header_rows_are_skipped_silently() {
        let output = process_csv(
            "DESCRIPTION,PRICE\n\
             iPhone 11,485\n\
             DESCRIPTION,PRICE\n\
             iPhone 12,600\n",
        )
        .await;
        assert_eq!(output.offers.len(), 2);
        assert!(output.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_upc_is_normalized_to_digits() {
        let output = process_csv(
            "DESCRIPTION,PRICE,UPC\n\
             iPhone 11,485,190-199-220546\n",
        )
        .await;
        assert_eq!(output.offers[0].upc.as_deref(), Some("190199220546"));
    }

    #[test]
    fn test_template_parses_with_our_own_header_rules() {
        let keys: Vec<String> = VENDOR_PRICE_TEMPLATE
            .lines()
            .next()
            .unwrap()
            .split(',')
            .map(normalize_key)
            .collect();
        let hits = keys.iter().filter(|k| is_header_key(k)).count();
        assert!(hits >= HEADER_MATCH_THRESHOLD);
    }
}

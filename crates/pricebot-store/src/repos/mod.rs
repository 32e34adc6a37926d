//! Entity repositories
//!
//! Each repository borrows a [`turso::Connection`] so that every repo touched
//! by one unit of work shares the caller's transaction. Relationships are
//! foreign-key ids only; callers resolve related rows through the owning
//! repository when they need them.

pub mod documents;
pub mod history;
pub mod jobs;
pub mod offers;
pub mod products;
pub mod vendors;
pub mod whatsapp;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Map a stored TEXT cell to an optional value ("" means NULL)
pub(crate) fn opt_text(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Bind-side counterpart of [`opt_text`]
pub(crate) fn text_or_empty(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

pub(crate) fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::corrupt(field, format!("'{value}': {e}")))
}

pub(crate) fn parse_uuid_opt(field: &'static str, value: &str) -> Result<Option<Uuid>> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_uuid(field, value).map(Some)
    }
}

pub(crate) fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|e| StoreError::corrupt(field, format!("'{value}': {e}")))
}

pub(crate) fn parse_i64_opt(field: &'static str, value: &str) -> Result<Option<i64>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|e| StoreError::corrupt(field, format!("'{value}': {e}")))
}

pub(crate) fn parse_json_opt(
    field: &'static str,
    value: &str,
) -> Result<Option<serde_json::Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(value).map_err(|e| StoreError::corrupt(field, e.to_string()))
}

pub(crate) fn json_to_db(value: Option<&serde_json::Value>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Serialize an optional embedding vector for storage
pub(crate) fn embedding_to_db(value: Option<&[f32]>) -> String {
    match value {
        Some(vector) => serde_json::to_string(vector).unwrap_or_default(),
        None => String::new(),
    }
}

pub(crate) fn parse_embedding_opt(field: &'static str, value: &str) -> Result<Option<Vec<f32>>> {
    if value.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(value).map_err(|e| StoreError::corrupt(field, e.to_string()))
}

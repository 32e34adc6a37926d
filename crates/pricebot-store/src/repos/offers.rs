//! Offer repository
//!
//! An offer is one observed price. Rows are immutable after insert; the
//! interesting read paths are the filtered listings behind `/offers` and the
//! best-price ranking used by the chat tools.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use turso::Connection;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::repos::{
    json_to_db, opt_text, parse_decimal, parse_i64_opt, parse_json_opt, parse_uuid, parse_uuid_opt,
    text_or_empty,
};
use crate::time;

/// Stored offer record
#[derive(Debug, Clone, Serialize)]
pub struct Offer {
    pub id: Uuid,
    pub product_id: Uuid,
    pub vendor_id: Uuid,
    pub source_document_id: Option<Uuid>,
    pub source_whatsapp_message_id: Option<Uuid>,
    pub captured_at: NaiveDateTime,
    pub price: Decimal,
    pub currency: String,
    pub quantity: Option<i64>,
    pub condition: Option<String>,
    pub min_order_quantity: Option<i64>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub raw_payload: Option<serde_json::Value>,
}

impl Offer {
    /// Create a new offer (generates UUID)
    pub fn new(
        product_id: Uuid,
        vendor_id: Uuid,
        price: Decimal,
        currency: impl Into<String>,
        captured_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            vendor_id,
            source_document_id: None,
            source_whatsapp_message_id: None,
            captured_at,
            price,
            currency: currency.into(),
            quantity: None,
            condition: None,
            min_order_quantity: None,
            location: None,
            notes: None,
            raw_payload: None,
        }
    }
}

/// Filters accepted by [`OfferRepo::list`]
#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    pub vendor_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub source_document_id: Option<Uuid>,
    pub since: Option<NaiveDateTime>,
    /// Case-insensitive equality
    pub condition: Option<String>,
    /// Case-insensitive substring
    pub location: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

const OFFER_COLUMNS: &str = "id, product_id, vendor_id, source_document_id, \
     source_whatsapp_message_id, captured_at, price, currency, quantity, condition, \
     min_order_quantity, location, notes, raw_payload";

/// Offer repository
pub struct OfferRepo<'a> {
    conn: &'a Connection,
}

impl<'a> OfferRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert an offer; price must be positive and currency non-empty
    pub async fn create(&self, offer: &Offer) -> Result<()> {
        if offer.price <= Decimal::ZERO {
            return Err(StoreError::corrupt("offer.price", "must be > 0"));
        }
        if offer.currency.trim().is_empty() {
            return Err(StoreError::corrupt("offer.currency", "must be non-empty"));
        }

        self.conn
            .execute(
                &format!(
                    "INSERT INTO offers ({OFFER_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                [
                    offer.id.to_string().as_str(),
                    offer.product_id.to_string().as_str(),
                    offer.vendor_id.to_string().as_str(),
                    offer
                        .source_document_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    offer
                        .source_whatsapp_message_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    time::to_db(&offer.captured_at).as_str(),
                    offer.price.to_string().as_str(),
                    offer.currency.as_str(),
                    offer
                        .quantity
                        .map(|q| q.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    text_or_empty(offer.condition.as_deref()),
                    offer
                        .min_order_quantity
                        .map(|q| q.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    text_or_empty(offer.location.as_deref()),
                    text_or_empty(offer.notes.as_deref()),
                    json_to_db(offer.raw_payload.as_ref()).as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Get offer by id
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<Offer>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1"),
                [id.to_string().as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_offer(&row)?)),
            None => Ok(None),
        }
    }

    /// Filtered listing, newest capture first
    pub async fn list(&self, filter: &OfferFilter, limit: usize) -> Result<Vec<Offer>> {
        self.filtered(filter, limit, "captured_at DESC").await
    }

    /// Offers for one product ranked for best-price selection: ascending
    /// price, then most recent capture
    pub async fn ranked_for_product(
        &self,
        product_id: &Uuid,
        filter: &OfferFilter,
        limit: usize,
    ) -> Result<Vec<Offer>> {
        let mut scoped = filter.clone();
        scoped.product_id = Some(*product_id);
        self.filtered(&scoped, limit, "CAST(price AS REAL) ASC, captured_at DESC")
            .await
    }

    /// Shared filter query; unset filters bind as '' and collapse to TRUE
    async fn filtered(
        &self,
        filter: &OfferFilter,
        limit: usize,
        order_by: &str,
    ) -> Result<Vec<Offer>> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM offers \
             WHERE (?1 = '' OR vendor_id = ?1) \
               AND (?2 = '' OR product_id = ?2) \
               AND (?3 = '' OR source_document_id = ?3) \
               AND (?4 = '' OR captured_at >= ?4) \
               AND (?5 = '' OR LOWER(condition) = LOWER(?5)) \
               AND (?6 = '' OR LOWER(location) LIKE '%' || LOWER(?6) || '%') \
               AND (?7 = '' OR CAST(price AS REAL) >= CAST(?7 AS REAL)) \
               AND (?8 = '' OR CAST(price AS REAL) <= CAST(?8 AS REAL)) \
             ORDER BY {order_by} LIMIT ?9"
        );

        let mut rows = self
            .conn
            .query(
                &sql,
                [
                    filter
                        .vendor_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    filter
                        .product_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    filter
                        .source_document_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    filter
                        .since
                        .map(|t| time::to_db(&t))
                        .unwrap_or_default()
                        .as_str(),
                    filter.condition.as_deref().unwrap_or(""),
                    filter.location.as_deref().unwrap_or(""),
                    filter
                        .min_price
                        .map(|p| p.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    filter
                        .max_price
                        .map(|p| p.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    limit.to_string().as_str(),
                ],
            )
            .await?;

        let mut offers = Vec::new();
        while let Some(row) = rows.next().await? {
            offers.push(Self::row_to_offer(&row)?);
        }
        Ok(offers)
    }

    /// Count offers attached to a document
    pub async fn count_for_document(&self, document_id: &Uuid) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM offers WHERE source_document_id = ?1",
                [document_id.to_string().as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    /// Count all offers
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM offers", ()).await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    fn row_to_offer(row: &turso::Row) -> Result<Offer> {
        let id: String = row.get(0)?;
        let product_id: String = row.get(1)?;
        let vendor_id: String = row.get(2)?;
        let source_document_id: String = row.get(3)?;
        let source_whatsapp_message_id: String = row.get(4)?;
        let captured_at: String = row.get(5)?;
        let price: String = row.get(6)?;
        let currency: String = row.get(7)?;
        let quantity: String = row.get(8)?;
        let condition: String = row.get(9)?;
        let min_order_quantity: String = row.get(10)?;
        let location: String = row.get(11)?;
        let notes: String = row.get(12)?;
        let raw_payload: String = row.get(13)?;

        Ok(Offer {
            id: parse_uuid("offer.id", &id)?,
            product_id: parse_uuid("offer.product_id", &product_id)?,
            vendor_id: parse_uuid("offer.vendor_id", &vendor_id)?,
            source_document_id: parse_uuid_opt("offer.source_document_id", &source_document_id)?,
            source_whatsapp_message_id: parse_uuid_opt(
                "offer.source_whatsapp_message_id",
                &source_whatsapp_message_id,
            )?,
            captured_at: time::parse_db(&captured_at)?,
            price: parse_decimal("offer.price", &price)?,
            currency,
            quantity: parse_i64_opt("offer.quantity", &quantity)?,
            condition: opt_text(condition),
            min_order_quantity: parse_i64_opt("offer.min_order_quantity", &min_order_quantity)?,
            location: opt_text(location),
            notes: opt_text(notes),
            raw_payload: parse_json_opt("offer.raw_payload", &raw_payload)?,
        })
    }
}

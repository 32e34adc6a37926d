//! Price-history span repository
//!
//! Spans are closed-open intervals per `(product, vendor)` at a fixed price.
//! The planning logic lives in the catalog crate; this repository loads the
//! ordered span set and applies the resulting mutations inside the caller's
//! transaction.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use turso::Connection;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::repos::{parse_decimal, parse_uuid};
use crate::time;

/// One price-history interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSpan {
    pub id: Uuid,
    pub product_id: Uuid,
    pub vendor_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    pub valid_from: NaiveDateTime,
    /// None marks the currently active span
    pub valid_to: Option<NaiveDateTime>,
    pub source_offer_id: Uuid,
}

impl PriceSpan {
    /// Open a new span starting at `valid_from` (generates UUID)
    pub fn open(
        product_id: Uuid,
        vendor_id: Uuid,
        price: Decimal,
        currency: impl Into<String>,
        valid_from: NaiveDateTime,
        source_offer_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            vendor_id,
            price,
            currency: currency.into(),
            valid_from,
            valid_to: None,
            source_offer_id,
        }
    }

    /// True while the span has no upper bound
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// A single change to the stored span set
#[derive(Debug, Clone, PartialEq)]
pub enum SpanMutation {
    /// Insert a new span row
    Insert(PriceSpan),
    /// Re-bound an existing span (`valid_to`; None re-opens it)
    SetValidTo {
        id: Uuid,
        valid_to: Option<NaiveDateTime>,
    },
    /// Remove a span absorbed by a merge
    Delete { id: Uuid },
}

const SPAN_COLUMNS: &str =
    "id, product_id, vendor_id, price, currency, valid_from, valid_to, source_offer_id";

/// Price-history repository
pub struct HistoryRepo<'a> {
    conn: &'a Connection,
}

impl<'a> HistoryRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// All spans for a `(product, vendor)` pair ordered by `valid_from`
    pub async fn list_for_pair(
        &self,
        product_id: &Uuid,
        vendor_id: &Uuid,
    ) -> Result<Vec<PriceSpan>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SPAN_COLUMNS} FROM price_history \
                     WHERE product_id = ?1 AND vendor_id = ?2 ORDER BY valid_from"
                ),
                [
                    product_id.to_string().as_str(),
                    vendor_id.to_string().as_str(),
                ],
            )
            .await?;

        let mut spans = Vec::new();
        while let Some(row) = rows.next().await? {
            spans.push(Self::row_to_span(&row)?);
        }
        Ok(spans)
    }

    /// Chronological spans across all vendors of a product
    pub async fn list_for_product(&self, product_id: &Uuid, limit: usize) -> Result<Vec<PriceSpan>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SPAN_COLUMNS} FROM price_history \
                     WHERE product_id = ?1 ORDER BY valid_from LIMIT ?2"
                ),
                [
                    product_id.to_string().as_str(),
                    limit.to_string().as_str(),
                ],
            )
            .await?;

        let mut spans = Vec::new();
        while let Some(row) = rows.next().await? {
            spans.push(Self::row_to_span(&row)?);
        }
        Ok(spans)
    }

    /// Chronological spans across all products of a vendor
    pub async fn list_for_vendor(&self, vendor_id: &Uuid, limit: usize) -> Result<Vec<PriceSpan>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SPAN_COLUMNS} FROM price_history \
                     WHERE vendor_id = ?1 ORDER BY valid_from LIMIT ?2"
                ),
                [vendor_id.to_string().as_str(), limit.to_string().as_str()],
            )
            .await?;

        let mut spans = Vec::new();
        while let Some(row) = rows.next().await? {
            spans.push(Self::row_to_span(&row)?);
        }
        Ok(spans)
    }

    /// Apply planned mutations in order
    pub async fn apply(&self, mutations: &[SpanMutation]) -> Result<()> {
        for mutation in mutations {
            match mutation {
                SpanMutation::Insert(span) => self.insert(span).await?,
                SpanMutation::SetValidTo { id, valid_to } => {
                    let updated = self
                        .conn
                        .execute(
                            "UPDATE price_history SET valid_to = ?1 WHERE id = ?2",
                            [
                                valid_to.map(|t| time::to_db(&t)).unwrap_or_default().as_str(),
                                id.to_string().as_str(),
                            ],
                        )
                        .await?;
                    if updated == 0 {
                        return Err(StoreError::HistoryConflict(format!(
                            "span {id} vanished during update"
                        )));
                    }
                }
                SpanMutation::Delete { id } => {
                    let deleted = self
                        .conn
                        .execute(
                            "DELETE FROM price_history WHERE id = ?1",
                            [id.to_string().as_str()],
                        )
                        .await?;
                    if deleted == 0 {
                        return Err(StoreError::HistoryConflict(format!(
                            "span {id} vanished during merge"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    async fn insert(&self, span: &PriceSpan) -> Result<()> {
        let result = self
            .conn
            .execute(
                &format!(
                    "INSERT INTO price_history ({SPAN_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                [
                    span.id.to_string().as_str(),
                    span.product_id.to_string().as_str(),
                    span.vendor_id.to_string().as_str(),
                    span.price.to_string().as_str(),
                    span.currency.as_str(),
                    time::to_db(&span.valid_from).as_str(),
                    span.valid_to.map(|t| time::to_db(&t)).unwrap_or_default().as_str(),
                    span.source_offer_id.to_string().as_str(),
                ],
            )
            .await;

        if let Err(e) = result {
            if StoreError::is_unique_violation(&e) {
                return Err(StoreError::HistoryConflict(format!(
                    "duplicate valid_from for pair ({}, {})",
                    span.product_id, span.vendor_id
                )));
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn row_to_span(row: &turso::Row) -> Result<PriceSpan> {
        let id: String = row.get(0)?;
        let product_id: String = row.get(1)?;
        let vendor_id: String = row.get(2)?;
        let price: String = row.get(3)?;
        let currency: String = row.get(4)?;
        let valid_from: String = row.get(5)?;
        let valid_to: String = row.get(6)?;
        let source_offer_id: String = row.get(7)?;

        Ok(PriceSpan {
            id: parse_uuid("span.id", &id)?,
            product_id: parse_uuid("span.product_id", &product_id)?,
            vendor_id: parse_uuid("span.vendor_id", &vendor_id)?,
            price: parse_decimal("span.price", &price)?,
            currency,
            valid_from: time::parse_db(&valid_from)?,
            valid_to: time::parse_db_opt(&valid_to)?,
            source_offer_id: parse_uuid("span.source_offer_id", &source_offer_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_apply_insert_close_and_delete() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let repo = HistoryRepo::new(&conn);

        let product_id = Uuid::new_v4();
        let vendor_id = Uuid::new_v4();
        let offer_id = Uuid::new_v4();

        let first = PriceSpan::open(product_id, vendor_id, "100".parse().unwrap(), "USD", at(10), offer_id);
        let second = PriceSpan::open(product_id, vendor_id, "120".parse().unwrap(), "USD", at(20), offer_id);

        repo.apply(&[
            SpanMutation::Insert(first.clone()),
            SpanMutation::SetValidTo {
                id: first.id,
                valid_to: Some(at(20)),
            },
            SpanMutation::Insert(second.clone()),
        ])
        .await
        .unwrap();

        let spans = repo.list_for_pair(&product_id, &vendor_id).await.unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].valid_to, Some(at(20)));
        assert!(spans[1].is_open());

        repo.apply(&[SpanMutation::Delete { id: second.id }]).await.unwrap();
        let spans = repo.list_for_pair(&product_id, &vendor_id).await.unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_valid_from_is_a_conflict() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let repo = HistoryRepo::new(&conn);

        let product_id = Uuid::new_v4();
        let vendor_id = Uuid::new_v4();
        let offer_id = Uuid::new_v4();

        let span = PriceSpan::open(product_id, vendor_id, "100".parse().unwrap(), "USD", at(10), offer_id);
        let clash = PriceSpan::open(product_id, vendor_id, "110".parse().unwrap(), "USD", at(10), offer_id);

        repo.apply(&[SpanMutation::Insert(span)]).await.unwrap();
        let err = repo.apply(&[SpanMutation::Insert(clash)]).await.unwrap_err();
        assert!(matches!(err, StoreError::HistoryConflict(_)));
    }
}

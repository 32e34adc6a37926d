//! Vendor repository
//!
//! Vendors are unique by case-insensitive name and created lazily on first
//! reference; nothing deletes them automatically.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;
use turso::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::repos::{json_to_db, parse_json_opt, parse_uuid};
use crate::time;

/// Stored vendor record
#[derive(Debug, Clone, Serialize)]
pub struct Vendor {
    pub id: Uuid,
    /// Display name; lookups are case-insensitive
    pub name: String,
    pub contact_info: Option<serde_json::Value>,
    pub extra: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Vendor {
    /// Create a new vendor (generates UUID)
    pub fn new(name: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            contact_info: None,
            extra: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Vendor repository
pub struct VendorRepo<'a> {
    conn: &'a Connection,
}

impl<'a> VendorRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a vendor row
    pub async fn create(&self, vendor: &Vendor) -> Result<()> {
        self.conn
            .execute(
                r#"
            INSERT INTO vendors (id, name, contact_info, extra, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
                [
                    vendor.id.to_string().as_str(),
                    vendor.name.as_str(),
                    json_to_db(vendor.contact_info.as_ref()).as_str(),
                    json_to_db(vendor.extra.as_ref()).as_str(),
                    time::to_db(&vendor.created_at).as_str(),
                    time::to_db(&vendor.updated_at).as_str(),
                ],
            )
            .await?;

        debug!(name = %vendor.name, "Created vendor");
        Ok(())
    }

    /// Get vendor by id
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<Vendor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, contact_info, extra, created_at, updated_at FROM vendors WHERE id = ?1",
                [id.to_string().as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_vendor(&row)?)),
            None => Ok(None),
        }
    }

    /// Get vendor by case-insensitive name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Vendor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, contact_info, extra, created_at, updated_at FROM vendors WHERE LOWER(name) = LOWER(?1)",
                [name.trim()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_vendor(&row)?)),
            None => Ok(None),
        }
    }

    /// Look up by name, creating the vendor on a miss
    pub async fn get_or_create(&self, name: &str) -> Result<Vendor> {
        if let Some(existing) = self.get_by_name(name).await? {
            return Ok(existing);
        }
        let vendor = Vendor::new(name.trim());
        self.create(&vendor).await?;
        Ok(vendor)
    }

    /// List vendors, newest first
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Vendor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, contact_info, extra, created_at, updated_at FROM vendors
                 ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                [limit.to_string().as_str(), offset.to_string().as_str()],
            )
            .await?;

        let mut vendors = Vec::new();
        while let Some(row) = rows.next().await? {
            vendors.push(Self::row_to_vendor(&row)?);
        }
        Ok(vendors)
    }

    /// Count all vendors
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM vendors", ()).await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    fn row_to_vendor(row: &turso::Row) -> Result<Vendor> {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let contact_info: String = row.get(2)?;
        let extra: String = row.get(3)?;
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;

        Ok(Vendor {
            id: parse_uuid("vendor.id", &id)?,
            name,
            contact_info: parse_json_opt("vendor.contact_info", &contact_info)?,
            extra: parse_json_opt("vendor.extra", &extra)?,
            created_at: time::parse_db(&created_at)?,
            updated_at: time::parse_db(&updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[tokio::test]
    async fn test_get_or_create_is_case_insensitive() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let repo = VendorRepo::new(&conn);

        let first = repo.get_or_create("Acme").await.unwrap();
        let second = repo.get_or_create("acme").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_name_is_trimmed_on_create() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let repo = VendorRepo::new(&conn);

        let vendor = repo.get_or_create("  Acme Traders  ").await.unwrap();
        assert_eq!(vendor.name, "Acme Traders");

        let found = repo.get_by_name("acme traders").await.unwrap();
        assert_eq!(found.unwrap().id, vendor.id);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let repo = VendorRepo::new(&conn);

        for i in 0..5 {
            repo.get_or_create(&format!("vendor-{i}")).await.unwrap();
        }
        let page = repo.list(2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(repo.count().await.unwrap(), 5);
    }
}

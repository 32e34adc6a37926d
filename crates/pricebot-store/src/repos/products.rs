//! Product and alias repositories
//!
//! Products are the canonical catalog rows; aliases are the raw strings
//! vendors use for them. UPC uniqueness is enforced here (lookup before
//! insert inside the caller's transaction) because the empty-string NULL
//! convention rules out a schema-level UNIQUE.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;
use turso::Connection;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::repos::{
    embedding_to_db, json_to_db, opt_text, parse_embedding_opt, parse_json_opt, parse_uuid,
    parse_uuid_opt, text_or_empty,
};
use crate::time;

/// Canonical product record
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub canonical_name: String,
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub upc: Option<String>,
    pub category: Option<String>,
    pub spec: Option<serde_json::Value>,
    /// Vendor that first introduced the product
    pub default_vendor_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Product {
    /// Create a new product (generates UUID)
    pub fn new(canonical_name: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            id: Uuid::new_v4(),
            canonical_name: canonical_name.into(),
            brand: None,
            model_number: None,
            upc: None,
            category: None,
            spec: None,
            default_vendor_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_identifiers(
        mut self,
        brand: Option<String>,
        model_number: Option<String>,
        upc: Option<String>,
    ) -> Self {
        self.brand = brand;
        self.model_number = model_number;
        self.upc = upc;
        self
    }

    pub fn with_default_vendor(mut self, vendor_id: Uuid) -> Self {
        self.default_vendor_id = Some(vendor_id);
        self
    }
}

/// Raw string observed for a product, optionally scoped to a vendor
#[derive(Debug, Clone, Serialize)]
pub struct ProductAlias {
    pub id: Uuid,
    pub product_id: Uuid,
    pub alias_text: String,
    pub source_vendor_id: Option<Uuid>,
    /// Dense embedding of `alias_text`, when the capability is enabled
    pub embedding: Option<Vec<f32>>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ProductAlias {
    pub fn new(
        product_id: Uuid,
        alias_text: impl Into<String>,
        source_vendor_id: Option<Uuid>,
    ) -> Self {
        let now = time::now();
        Self {
            id: Uuid::new_v4(),
            product_id,
            alias_text: alias_text.into(),
            source_vendor_id,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Product Repository
// =============================================================================

const PRODUCT_COLUMNS: &str = "id, canonical_name, brand, model_number, upc, category, spec, \
     default_vendor_id, created_at, updated_at";

/// Product repository
pub struct ProductRepo<'a> {
    conn: &'a Connection,
}

impl<'a> ProductRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a product; rejects a duplicate non-empty UPC
    pub async fn create(&self, product: &Product) -> Result<()> {
        if let Some(upc) = product.upc.as_deref()
            && !upc.is_empty()
            && self.get_by_upc(upc).await?.is_some()
        {
            return Err(StoreError::already_exists("product upc", upc));
        }

        self.conn
            .execute(
                &format!(
                    "INSERT INTO products ({PRODUCT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                [
                    product.id.to_string().as_str(),
                    product.canonical_name.as_str(),
                    text_or_empty(product.brand.as_deref()),
                    text_or_empty(product.model_number.as_deref()),
                    text_or_empty(product.upc.as_deref()),
                    text_or_empty(product.category.as_deref()),
                    json_to_db(product.spec.as_ref()).as_str(),
                    product
                        .default_vendor_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    time::to_db(&product.created_at).as_str(),
                    time::to_db(&product.updated_at).as_str(),
                ],
            )
            .await?;

        debug!(name = %product.canonical_name, "Created product");
        Ok(())
    }

    /// Get product by id
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                [id.to_string().as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_product(&row)?)),
            None => Ok(None),
        }
    }

    /// Get product by normalized UPC
    pub async fn get_by_upc(&self, upc: &str) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE upc = ?1 AND upc != ''"),
                [upc],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_product(&row)?)),
            None => Ok(None),
        }
    }

    /// Get product by case-insensitive (brand, model_number)
    pub async fn get_by_brand_model(&self, brand: &str, model: &str) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE LOWER(brand) = LOWER(?1) AND LOWER(model_number) = LOWER(?2) \
                     AND brand != '' AND model_number != ''"
                ),
                [brand.trim(), model.trim()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_product(&row)?)),
            None => Ok(None),
        }
    }

    /// Get product by case-insensitive model number alone
    pub async fn get_by_model(&self, model: &str) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE LOWER(model_number) = LOWER(?1) AND model_number != ''"
                ),
                [model.trim()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_product(&row)?)),
            None => Ok(None),
        }
    }

    /// Case-insensitive substring search across canonical name, alias text,
    /// model number, and UPC; distinct by product, newest first.
    pub async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<Product>> {
        let term = format!("%{}%", query.trim().to_lowercase());
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT DISTINCT p.id, p.canonical_name, p.brand, p.model_number, p.upc, \
                            p.category, p.spec, p.default_vendor_id, p.created_at, p.updated_at \
                     FROM products p \
                     LEFT JOIN product_aliases a ON a.product_id = p.id \
                     WHERE LOWER(p.canonical_name) LIKE ?1 \
                        OR LOWER(p.model_number) LIKE ?1 \
                        OR LOWER(p.upc) LIKE ?1 \
                        OR LOWER(a.alias_text) LIKE ?1 \
                     ORDER BY p.updated_at DESC \
                     LIMIT ?2 OFFSET ?3"
                ),
                [
                    term.as_str(),
                    limit.to_string().as_str(),
                    offset.to_string().as_str(),
                ],
            )
            .await?;

        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            products.push(Self::row_to_product(&row)?);
        }
        Ok(products)
    }

    /// Total distinct products matching [`search`](Self::search)
    pub async fn search_count(&self, query: &str) -> Result<u64> {
        let term = format!("%{}%", query.trim().to_lowercase());
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(DISTINCT p.id) FROM products p \
                 LEFT JOIN product_aliases a ON a.product_id = p.id \
                 WHERE LOWER(p.canonical_name) LIKE ?1 \
                    OR LOWER(p.model_number) LIKE ?1 \
                    OR LOWER(p.upc) LIKE ?1 \
                    OR LOWER(a.alias_text) LIKE ?1",
                [term.as_str()],
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

    /// List products, newest first
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                ),
                [limit.to_string().as_str(), offset.to_string().as_str()],
            )
            .await?;

        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            products.push(Self::row_to_product(&row)?);
        }
        Ok(products)
    }

    /// Count all products
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM products", ()).await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    fn row_to_product(row: &turso::Row) -> Result<Product> {
        let id: String = row.get(0)?;
        let canonical_name: String = row.get(1)?;
        let brand: String = row.get(2)?;
        let model_number: String = row.get(3)?;
        let upc: String = row.get(4)?;
        let category: String = row.get(5)?;
        let spec: String = row.get(6)?;
        let default_vendor_id: String = row.get(7)?;
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;

        Ok(Product {
            id: parse_uuid("product.id", &id)?,
            canonical_name,
            brand: opt_text(brand),
            model_number: opt_text(model_number),
            upc: opt_text(upc),
            category: opt_text(category),
            spec: parse_json_opt("product.spec", &spec)?,
            default_vendor_id: parse_uuid_opt("product.default_vendor_id", &default_vendor_id)?,
            created_at: time::parse_db(&created_at)?,
            updated_at: time::parse_db(&updated_at)?,
        })
    }
}

// =============================================================================
// Alias Repository
// =============================================================================

const ALIAS_COLUMNS: &str =
    "id, product_id, alias_text, source_vendor_id, embedding, created_at, updated_at";

/// Product alias repository
pub struct AliasRepo<'a> {
    conn: &'a Connection,
}

impl<'a> AliasRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert an alias; duplicates of `(product, alias_text, source_vendor)`
    /// map to `AlreadyExists`
    pub async fn create(&self, alias: &ProductAlias) -> Result<()> {
        let result = self
            .conn
            .execute(
                &format!(
                    "INSERT INTO product_aliases ({ALIAS_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                [
                    alias.id.to_string().as_str(),
                    alias.product_id.to_string().as_str(),
                    alias.alias_text.as_str(),
                    alias
                        .source_vendor_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    embedding_to_db(alias.embedding.as_deref()).as_str(),
                    time::to_db(&alias.created_at).as_str(),
                    time::to_db(&alias.updated_at).as_str(),
                ],
            )
            .await;

        if let Err(e) = result {
            if StoreError::is_unique_violation(&e) {
                return Err(StoreError::already_exists("alias", &alias.alias_text));
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Insert unless the `(product, alias_text, source_vendor)` triple exists
    pub async fn create_if_absent(&self, alias: &ProductAlias) -> Result<bool> {
        match self.create(alias).await {
            Ok(()) => Ok(true),
            Err(StoreError::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Exact alias-text matches, vendor-scoped rows first, then most
    /// recently updated
    pub async fn find_exact(&self, alias_text: &str, vendor_id: Option<&Uuid>) -> Result<Vec<ProductAlias>> {
        let vendor = vendor_id.map(|id| id.to_string()).unwrap_or_default();
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ALIAS_COLUMNS} FROM product_aliases \
                     WHERE LOWER(alias_text) = LOWER(?1) \
                     ORDER BY CASE WHEN source_vendor_id = ?2 AND ?2 != '' THEN 0 ELSE 1 END, \
                              updated_at DESC"
                ),
                [alias_text.trim(), vendor.as_str()],
            )
            .await?;

        let mut aliases = Vec::new();
        while let Some(row) = rows.next().await? {
            aliases.push(Self::row_to_alias(&row)?);
        }
        Ok(aliases)
    }

    /// Aliases carrying embeddings, newest first, bounded by `cap`
    pub async fn list_with_embeddings(&self, cap: usize) -> Result<Vec<ProductAlias>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ALIAS_COLUMNS} FROM product_aliases \
                     WHERE embedding != '' ORDER BY updated_at DESC LIMIT ?1"
                ),
                [cap.to_string().as_str()],
            )
            .await?;

        let mut aliases = Vec::new();
        while let Some(row) = rows.next().await? {
            aliases.push(Self::row_to_alias(&row)?);
        }
        Ok(aliases)
    }

    /// All aliases for a product
    pub async fn list_for_product(&self, product_id: &Uuid) -> Result<Vec<ProductAlias>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ALIAS_COLUMNS} FROM product_aliases \
                     WHERE product_id = ?1 ORDER BY created_at"
                ),
                [product_id.to_string().as_str()],
            )
            .await?;

        let mut aliases = Vec::new();
        while let Some(row) = rows.next().await? {
            aliases.push(Self::row_to_alias(&row)?);
        }
        Ok(aliases)
    }

    /// Attach an embedding to a stored alias
    pub async fn set_embedding(&self, alias_id: &Uuid, embedding: &[f32]) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE product_aliases SET embedding = ?1, updated_at = ?2 WHERE id = ?3",
                [
                    embedding_to_db(Some(embedding)).as_str(),
                    time::to_db(&time::now()).as_str(),
                    alias_id.to_string().as_str(),
                ],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::not_found("alias", alias_id.to_string()));
        }
        Ok(())
    }

    fn row_to_alias(row: &turso::Row) -> Result<ProductAlias> {
        let id: String = row.get(0)?;
        let product_id: String = row.get(1)?;
        let alias_text: String = row.get(2)?;
        let source_vendor_id: String = row.get(3)?;
        let embedding: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(ProductAlias {
            id: parse_uuid("alias.id", &id)?,
            product_id: parse_uuid("alias.product_id", &product_id)?,
            alias_text,
            source_vendor_id: parse_uuid_opt("alias.source_vendor_id", &source_vendor_id)?,
            embedding: parse_embedding_opt("alias.embedding", &embedding)?,
            created_at: time::parse_db(&created_at)?,
            updated_at: time::parse_db(&updated_at)?,
        })
    }
}

//! Database connection and schema management
//!
//! Uses Turso (async SQLite-compatible) for the catalog database.
//!
//! # Conventions
//!
//! - Every column is TEXT; ids are UUID strings, timestamps use the
//!   `time` module format, prices are canonical decimal strings, JSON
//!   columns hold serialized objects.
//! - The empty string stands in for NULL so statements can bind plain
//!   string slices throughout.
//! - Uniqueness rules that would collide on the empty-string convention
//!   (product UPC, WhatsApp `(chat, message_id)`) are enforced by the
//!   repositories inside the owning transaction instead of by the schema.

use std::path::Path;

use tracing::info;
use turso::{Builder, Connection, Database};

use crate::error::Result;

/// Catalog database handle
///
/// Cheap to share; hand out one [`Connection`] per unit of work so a whole
/// document batch can ride a single transaction.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) a file-backed store and initialize the schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                crate::error::StoreError::corrupt("database path", e.to_string())
            })?;
        }

        let path_display = path.display().to_string();
        info!(path = %path_display, "Opening catalog database");
        let db = Builder::new_local(&path_display).build().await?;

        let store = Self { db };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let store = Self { db };
        store.init_schema().await?;
        Ok(store)
    }

    /// Get a connection for a unit of work
    pub fn connect(&self) -> Result<Connection> {
        Ok(self.db.connect()?)
    }

    /// Create all tables and indexes
    async fn init_schema(&self) -> Result<()> {
        let conn = self.db.connect()?;

        conn.execute(SCHEMA_VENDORS, ()).await?;
        conn.execute(SCHEMA_PRODUCTS, ()).await?;
        conn.execute(SCHEMA_PRODUCT_ALIASES, ()).await?;
        conn.execute(SCHEMA_SOURCE_DOCUMENTS, ()).await?;
        conn.execute(SCHEMA_OFFERS, ()).await?;
        conn.execute(SCHEMA_PRICE_HISTORY, ()).await?;
        conn.execute(SCHEMA_INGESTION_JOBS, ()).await?;
        conn.execute(SCHEMA_WHATSAPP_CHATS, ()).await?;
        conn.execute(SCHEMA_WHATSAPP_MESSAGES, ()).await?;

        conn.execute(INDEX_VENDORS_NAME, ()).await?;
        conn.execute(INDEX_PRODUCTS_UPC, ()).await?;
        conn.execute(INDEX_PRODUCTS_BRAND_MODEL, ()).await?;
        conn.execute(INDEX_ALIASES_TEXT, ()).await?;
        conn.execute(INDEX_ALIASES_PRODUCT, ()).await?;
        conn.execute(INDEX_DOCUMENTS_STATUS, ()).await?;
        conn.execute(INDEX_OFFERS_PRODUCT, ()).await?;
        conn.execute(INDEX_OFFERS_VENDOR, ()).await?;
        conn.execute(INDEX_OFFERS_DOCUMENT, ()).await?;
        conn.execute(INDEX_OFFERS_CAPTURED, ()).await?;
        conn.execute(INDEX_HISTORY_PAIR, ()).await?;
        conn.execute(INDEX_HISTORY_VENDOR, ()).await?;
        conn.execute(INDEX_JOBS_STATUS, ()).await?;
        conn.execute(INDEX_CHATS_TITLE, ()).await?;
        conn.execute(INDEX_CHATS_PLATFORM, ()).await?;
        conn.execute(INDEX_MESSAGES_CHAT, ()).await?;
        conn.execute(INDEX_MESSAGES_HASH, ()).await?;

        info!("Catalog database schema initialized");
        Ok(())
    }
}

/// Begin a transaction for a unit of work
pub async fn begin(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN", ()).await?;
    Ok(())
}

/// Commit the open transaction
pub async fn commit(conn: &Connection) -> Result<()> {
    conn.execute("COMMIT", ()).await?;
    Ok(())
}

/// Roll back the open transaction; swallows double-rollback noise
pub async fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute("ROLLBACK", ()).await {
        tracing::debug!(error = %e, "rollback after failure");
    }
}

// =============================================================================
// Schema
// =============================================================================

const SCHEMA_VENDORS: &str = r#"
CREATE TABLE IF NOT EXISTS vendors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    contact_info TEXT NOT NULL DEFAULT '',
    extra TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const SCHEMA_PRODUCTS: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    canonical_name TEXT NOT NULL,
    brand TEXT NOT NULL DEFAULT '',
    model_number TEXT NOT NULL DEFAULT '',
    upc TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    spec TEXT NOT NULL DEFAULT '',
    default_vendor_id TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const SCHEMA_PRODUCT_ALIASES: &str = r#"
CREATE TABLE IF NOT EXISTS product_aliases (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    alias_text TEXT NOT NULL,
    source_vendor_id TEXT NOT NULL DEFAULT '',
    embedding TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (product_id, alias_text, source_vendor_id),
    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
)
"#;

const SCHEMA_SOURCE_DOCUMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS source_documents (
    id TEXT PRIMARY KEY,
    vendor_id TEXT NOT NULL DEFAULT '',
    file_name TEXT NOT NULL,
    file_type TEXT NOT NULL,
    storage_uri TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    ingest_started_at TEXT NOT NULL DEFAULT '',
    ingest_completed_at TEXT NOT NULL DEFAULT '',
    extra TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const SCHEMA_OFFERS: &str = r#"
CREATE TABLE IF NOT EXISTS offers (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    vendor_id TEXT NOT NULL,
    source_document_id TEXT NOT NULL DEFAULT '',
    source_whatsapp_message_id TEXT NOT NULL DEFAULT '',
    captured_at TEXT NOT NULL,
    price TEXT NOT NULL,
    currency TEXT NOT NULL,
    quantity TEXT NOT NULL DEFAULT '',
    condition TEXT NOT NULL DEFAULT '',
    min_order_quantity TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    raw_payload TEXT NOT NULL DEFAULT '',
    FOREIGN KEY (product_id) REFERENCES products(id),
    FOREIGN KEY (vendor_id) REFERENCES vendors(id),
    FOREIGN KEY (source_document_id) REFERENCES source_documents(id) ON DELETE CASCADE
)
"#;

const SCHEMA_PRICE_HISTORY: &str = r#"
CREATE TABLE IF NOT EXISTS price_history (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    vendor_id TEXT NOT NULL,
    price TEXT NOT NULL,
    currency TEXT NOT NULL,
    valid_from TEXT NOT NULL,
    valid_to TEXT NOT NULL DEFAULT '',
    source_offer_id TEXT NOT NULL,
    UNIQUE (product_id, vendor_id, valid_from),
    FOREIGN KEY (source_offer_id) REFERENCES offers(id) ON DELETE CASCADE
)
"#;

const SCHEMA_INGESTION_JOBS: &str = r#"
CREATE TABLE IF NOT EXISTS ingestion_jobs (
    id TEXT PRIMARY KEY,
    source_document_id TEXT NOT NULL,
    processor TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    logs TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (source_document_id) REFERENCES source_documents(id) ON DELETE CASCADE
)
"#;

const SCHEMA_WHATSAPP_CHATS: &str = r#"
CREATE TABLE IF NOT EXISTS whatsapp_chats (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    chat_type TEXT NOT NULL DEFAULT 'unknown',
    platform_id TEXT NOT NULL DEFAULT '',
    vendor_id TEXT NOT NULL DEFAULT '',
    extra TEXT NOT NULL DEFAULT '',
    last_extracted_at TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const SCHEMA_WHATSAPP_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS whatsapp_messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    client_id TEXT NOT NULL DEFAULT '',
    message_id TEXT NOT NULL DEFAULT '',
    observed_at TEXT NOT NULL,
    sender_name TEXT NOT NULL DEFAULT '',
    sender_phone TEXT NOT NULL DEFAULT '',
    is_outgoing TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    media_document_id TEXT NOT NULL DEFAULT '',
    raw_payload TEXT NOT NULL DEFAULT '',
    FOREIGN KEY (chat_id) REFERENCES whatsapp_chats(id) ON DELETE CASCADE
)
"#;

// =============================================================================
// Indexes
// =============================================================================

const INDEX_VENDORS_NAME: &str = "CREATE INDEX IF NOT EXISTS idx_vendors_name ON vendors(name)";

const INDEX_PRODUCTS_UPC: &str = "CREATE INDEX IF NOT EXISTS idx_products_upc ON products(upc)";

const INDEX_PRODUCTS_BRAND_MODEL: &str =
    "CREATE INDEX IF NOT EXISTS idx_products_brand_model ON products(brand, model_number)";

const INDEX_ALIASES_TEXT: &str =
    "CREATE INDEX IF NOT EXISTS idx_aliases_text ON product_aliases(alias_text)";

const INDEX_ALIASES_PRODUCT: &str =
    "CREATE INDEX IF NOT EXISTS idx_aliases_product ON product_aliases(product_id)";

const INDEX_DOCUMENTS_STATUS: &str =
    "CREATE INDEX IF NOT EXISTS idx_documents_status ON source_documents(status)";

const INDEX_OFFERS_PRODUCT: &str =
    "CREATE INDEX IF NOT EXISTS idx_offers_product ON offers(product_id)";

const INDEX_OFFERS_VENDOR: &str =
    "CREATE INDEX IF NOT EXISTS idx_offers_vendor ON offers(vendor_id)";

const INDEX_OFFERS_DOCUMENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_offers_document ON offers(source_document_id)";

const INDEX_OFFERS_CAPTURED: &str =
    "CREATE INDEX IF NOT EXISTS idx_offers_captured ON offers(captured_at)";

const INDEX_HISTORY_PAIR: &str =
    "CREATE INDEX IF NOT EXISTS idx_history_pair ON price_history(product_id, vendor_id, valid_from)";

const INDEX_HISTORY_VENDOR: &str =
    "CREATE INDEX IF NOT EXISTS idx_history_vendor ON price_history(vendor_id, valid_from)";

const INDEX_JOBS_STATUS: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON ingestion_jobs(status)";

const INDEX_CHATS_TITLE: &str =
    "CREATE INDEX IF NOT EXISTS idx_chats_title ON whatsapp_chats(title)";

const INDEX_CHATS_PLATFORM: &str =
    "CREATE INDEX IF NOT EXISTS idx_chats_platform ON whatsapp_chats(platform_id)";

const INDEX_MESSAGES_CHAT: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_chat ON whatsapp_messages(chat_id, observed_at)";

const INDEX_MESSAGES_HASH: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_hash ON whatsapp_messages(chat_id, content_hash)";

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_initializes() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();

        // Schema is idempotent and queryable
        let mut rows = conn
            .query("SELECT COUNT(*) FROM vendors", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_writes() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();

        begin(&conn).await.unwrap();
        conn.execute(
            "INSERT INTO vendors (id, name, created_at, updated_at) VALUES ('v1', 'Acme', 't', 't')",
            (),
        )
        .await
        .unwrap();
        rollback(&conn).await;

        let mut rows = conn
            .query("SELECT COUNT(*) FROM vendors", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        assert_eq!(count, 0);
    }
}

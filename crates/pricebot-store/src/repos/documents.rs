//! Source document repository
//!
//! Every ingested artefact gets a `SourceDocument` row. The job runner walks
//! it through the status lifecycle; once a terminal status is written the row
//! is never mutated again.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;
use turso::Connection;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::repos::{json_to_db, parse_json_opt, parse_uuid, parse_uuid_opt};
use crate::time;

/// Document lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    ProcessedWithWarnings,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::ProcessedWithWarnings => "processed_with_warnings",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "processed_with_warnings" => Ok(Self::ProcessedWithWarnings),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::corrupt("document.status", other)),
        }
    }

    /// Terminal states are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Processed | Self::ProcessedWithWarnings | Self::Failed
        )
    }
}

/// Stored source document record
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    pub id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub storage_uri: String,
    pub status: DocumentStatus,
    pub ingest_started_at: Option<NaiveDateTime>,
    pub ingest_completed_at: Option<NaiveDateTime>,
    /// Hashes, processor name, declared vendor, warnings, row counts
    pub extra: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl SourceDocument {
    /// Create a pending document (generates UUID)
    pub fn new(
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        storage_uri: impl Into<String>,
    ) -> Self {
        let now = time::now();
        Self {
            id: Uuid::new_v4(),
            vendor_id: None,
            file_name: file_name.into(),
            file_type: file_type.into(),
            storage_uri: storage_uri.into(),
            status: DocumentStatus::Pending,
            ingest_started_at: None,
            ingest_completed_at: None,
            extra: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

const DOCUMENT_COLUMNS: &str = "id, vendor_id, file_name, file_type, storage_uri, status, \
     ingest_started_at, ingest_completed_at, extra, created_at, updated_at";

/// Source document repository
pub struct DocumentRepo<'a> {
    conn: &'a Connection,
}

impl<'a> DocumentRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a document row
    pub async fn create(&self, doc: &SourceDocument) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO source_documents ({DOCUMENT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                [
                    doc.id.to_string().as_str(),
                    doc.vendor_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    doc.file_name.as_str(),
                    doc.file_type.as_str(),
                    doc.storage_uri.as_str(),
                    doc.status.as_str(),
                    doc.ingest_started_at
                        .map(|t| time::to_db(&t))
                        .unwrap_or_default()
                        .as_str(),
                    doc.ingest_completed_at
                        .map(|t| time::to_db(&t))
                        .unwrap_or_default()
                        .as_str(),
                    json_to_db(doc.extra.as_ref()).as_str(),
                    time::to_db(&doc.created_at).as_str(),
                    time::to_db(&doc.updated_at).as_str(),
                ],
            )
            .await?;

        debug!(document_id = %doc.id, file = %doc.file_name, "Created source document");
        Ok(())
    }

    /// Get document by id
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<SourceDocument>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM source_documents WHERE id = ?1"),
                [id.to_string().as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    /// Persist the mutable lifecycle fields of a document
    pub async fn update(&self, doc: &SourceDocument) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE source_documents SET vendor_id = ?1, status = ?2, \
                 ingest_started_at = ?3, ingest_completed_at = ?4, extra = ?5, updated_at = ?6 \
                 WHERE id = ?7",
                [
                    doc.vendor_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    doc.status.as_str(),
                    doc.ingest_started_at
                        .map(|t| time::to_db(&t))
                        .unwrap_or_default()
                        .as_str(),
                    doc.ingest_completed_at
                        .map(|t| time::to_db(&t))
                        .unwrap_or_default()
                        .as_str(),
                    json_to_db(doc.extra.as_ref()).as_str(),
                    time::to_db(&time::now()).as_str(),
                    doc.id.to_string().as_str(),
                ],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::not_found("document", doc.id.to_string()));
        }
        Ok(())
    }

    /// Delete a document (cascades to offers); used when the artefact write fails
    pub async fn delete(&self, id: &Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM source_documents WHERE id = ?1",
                [id.to_string().as_str()],
            )
            .await?;
        if deleted == 0 {
            return Err(StoreError::not_found("document", id.to_string()));
        }
        debug!(document_id = %id, "Deleted source document");
        Ok(())
    }

    /// List documents, newest first
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SourceDocument>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM source_documents \
                     ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                ),
                [limit.to_string().as_str(), offset.to_string().as_str()],
            )
            .await?;

        let mut docs = Vec::new();
        while let Some(row) = rows.next().await? {
            docs.push(Self::row_to_document(&row)?);
        }
        Ok(docs)
    }

    /// Count all documents
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM source_documents", ())
            .await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    fn row_to_document(row: &turso::Row) -> Result<SourceDocument> {
        let id: String = row.get(0)?;
        let vendor_id: String = row.get(1)?;
        let file_name: String = row.get(2)?;
        let file_type: String = row.get(3)?;
        let storage_uri: String = row.get(4)?;
        let status: String = row.get(5)?;
        let ingest_started_at: String = row.get(6)?;
        let ingest_completed_at: String = row.get(7)?;
        let extra: String = row.get(8)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;

        Ok(SourceDocument {
            id: parse_uuid("document.id", &id)?,
            vendor_id: parse_uuid_opt("document.vendor_id", &vendor_id)?,
            file_name,
            file_type,
            storage_uri,
            status: DocumentStatus::parse(&status)?,
            ingest_started_at: time::parse_db_opt(&ingest_started_at)?,
            ingest_completed_at: time::parse_db_opt(&ingest_completed_at)?,
            extra: parse_json_opt("document.extra", &extra)?,
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
    async fn test_lifecycle_roundtrip() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let repo = DocumentRepo::new(&conn);

        let mut doc = SourceDocument::new("prices.csv", ".csv", "storage/2025/01/x.csv");
        repo.create(&doc).await.unwrap();

        doc.status = DocumentStatus::Processing;
        doc.ingest_started_at = Some(time::now());
        repo.update(&doc).await.unwrap();

        doc.status = DocumentStatus::Processed;
        doc.ingest_completed_at = Some(time::now());
        doc.extra = Some(serde_json::json!({"row_count": 2}));
        repo.update(&doc).await.unwrap();

        let stored = repo.get_by_id(&doc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Processed);
        assert!(stored.status.is_terminal());
        assert!(stored.ingest_completed_at.is_some());
        assert_eq!(stored.extra.unwrap()["row_count"], 2);
    }

    #[tokio::test]
    async fn test_status_parse_rejects_unknown() {
        assert!(DocumentStatus::parse("sideways").is_err());
        assert_eq!(
            DocumentStatus::parse("processed_with_warnings").unwrap(),
            DocumentStatus::ProcessedWithWarnings
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();
        let repo = DocumentRepo::new(&conn);

        let err = repo.delete(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}

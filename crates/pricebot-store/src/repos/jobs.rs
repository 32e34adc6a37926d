//! Ingestion job repository
//!
//! Bookkeeping rows for the background runner. Structured logs live in a
//! JSON column (`vendor_name`, `prefer_llm`, `filename` on the way in;
//! `offers`, `warnings`, `errors`, `message` on the way out).

use chrono::NaiveDateTime;
use serde::Serialize;
use turso::Connection;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::repos::{json_to_db, parse_json_opt, parse_uuid};
use crate::time;

/// Job lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::corrupt("job.status", other)),
        }
    }
}

/// Stored ingestion job record
#[derive(Debug, Clone, Serialize)]
pub struct IngestionJob {
    pub id: Uuid,
    pub source_document_id: Uuid,
    pub processor: String,
    pub status: JobStatus,
    pub logs: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl IngestionJob {
    /// Create a queued job (generates UUID)
    pub fn new(source_document_id: Uuid, processor: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            id: Uuid::new_v4(),
            source_document_id,
            processor: processor.into(),
            status: JobStatus::Queued,
            logs: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_logs(mut self, logs: serde_json::Value) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Merge keys into the JSON log object
    pub fn merge_logs(&mut self, patch: serde_json::Value) {
        let mut logs = match self.logs.take() {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        if let serde_json::Value::Object(patch) = patch {
            for (key, value) in patch {
                logs.insert(key, value);
            }
        }
        self.logs = Some(serde_json::Value::Object(logs));
    }
}

const JOB_COLUMNS: &str =
    "id, source_document_id, processor, status, logs, created_at, updated_at";

/// Ingestion job repository
pub struct JobRepo<'a> {
    conn: &'a Connection,
}

impl<'a> JobRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a job row
    pub async fn create(&self, job: &IngestionJob) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO ingestion_jobs ({JOB_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                [
                    job.id.to_string().as_str(),
                    job.source_document_id.to_string().as_str(),
                    job.processor.as_str(),
                    job.status.as_str(),
                    json_to_db(job.logs.as_ref()).as_str(),
                    time::to_db(&job.created_at).as_str(),
                    time::to_db(&job.updated_at).as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Get job by id
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<IngestionJob>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE id = ?1"),
                [id.to_string().as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    /// Persist status and logs; bumps `updated_at`
    pub async fn update(&self, job: &mut IngestionJob) -> Result<()> {
        job.updated_at = time::now();
        let updated = self
            .conn
            .execute(
                "UPDATE ingestion_jobs SET status = ?1, logs = ?2, updated_at = ?3 WHERE id = ?4",
                [
                    job.status.as_str(),
                    json_to_db(job.logs.as_ref()).as_str(),
                    time::to_db(&job.updated_at).as_str(),
                    job.id.to_string().as_str(),
                ],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::not_found("job", job.id.to_string()));
        }
        Ok(())
    }

    /// Jobs stuck in `running` since before `cutoff` (startup reconciliation)
    pub async fn list_running_older_than(&self, cutoff: NaiveDateTime) -> Result<Vec<IngestionJob>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM ingestion_jobs \
                     WHERE status = 'running' AND updated_at < ?1"
                ),
                [time::to_db(&cutoff).as_str()],
            )
            .await?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(Self::row_to_job(&row)?);
        }
        Ok(jobs)
    }

    fn row_to_job(row: &turso::Row) -> Result<IngestionJob> {
        let id: String = row.get(0)?;
        let source_document_id: String = row.get(1)?;
        let processor: String = row.get(2)?;
        let status: String = row.get(3)?;
        let logs: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(IngestionJob {
            id: parse_uuid("job.id", &id)?,
            source_document_id: parse_uuid("job.source_document_id", &source_document_id)?,
            processor,
            status: JobStatus::parse(&status)?,
            logs: parse_json_opt("job.logs", &logs)?,
            created_at: time::parse_db(&created_at)?,
            updated_at: time::parse_db(&updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::repos::documents::{DocumentRepo, SourceDocument};

    #[tokio::test]
    async fn test_job_lifecycle() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();

        let doc = SourceDocument::new("a.csv", ".csv", "storage/a.csv");
        DocumentRepo::new(&conn).create(&doc).await.unwrap();

        let repo = JobRepo::new(&conn);
        let mut job = IngestionJob::new(doc.id, "spreadsheet")
            .with_logs(serde_json::json!({"vendor_name": "Acme"}));
        repo.create(&job).await.unwrap();

        job.status = JobStatus::Running;
        repo.update(&mut job).await.unwrap();

        job.status = JobStatus::Succeeded;
        job.merge_logs(serde_json::json!({"offers": 2, "warnings": []}));
        repo.update(&mut job).await.unwrap();

        let stored = repo.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
        let logs = stored.logs.unwrap();
        assert_eq!(logs["vendor_name"], "Acme");
        assert_eq!(logs["offers"], 2);
    }

    #[tokio::test]
    async fn test_stale_running_scan() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();

        let doc = SourceDocument::new("a.csv", ".csv", "storage/a.csv");
        DocumentRepo::new(&conn).create(&doc).await.unwrap();

        let repo = JobRepo::new(&conn);
        let mut job = IngestionJob::new(doc.id, "spreadsheet");
        repo.create(&job).await.unwrap();
        job.status = JobStatus::Running;
        repo.update(&mut job).await.unwrap();

        let future = time::now() + chrono::Duration::hours(2);
        let stale = repo.list_running_older_than(future).await.unwrap();
        assert_eq!(stale.len(), 1);

        let past = time::now() - chrono::Duration::hours(2);
        assert!(repo.list_running_older_than(past).await.unwrap().is_empty());
    }
}

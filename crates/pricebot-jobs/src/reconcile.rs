//! Startup reconciliation
//!
//! Jobs abandoned by a hard shutdown stay `running` forever. At boot, any
//! `running` job older than the threshold flips to `failed` along with its
//! document, so the status endpoint never reports phantom progress.

use chrono::Duration;
use pricebot_store::{DocumentRepo, DocumentStatus, JobRepo, JobStatus, Store, time};
use serde_json::json;
use tracing::{info, warn};

use crate::error::Result;

/// Sweep stale `running` jobs; returns how many were failed
pub async fn reconcile_stale_jobs(store: &Store, older_than: Duration) -> Result<u64> {
    let conn = store.connect()?;
    let jobs = JobRepo::new(&conn);
    let documents = DocumentRepo::new(&conn);

    let cutoff = time::now() - older_than;
    let stale = jobs.list_running_older_than(cutoff).await?;
    let mut swept = 0;

    for mut job in stale {
        warn!(job_id = %job.id, updated_at = %job.updated_at, "reconciling stale running job");
        job.status = JobStatus::Failed;
        job.merge_logs(json!({ "error": "abandoned by shutdown; reconciled at startup" }));
        jobs.update(&mut job).await?;

        if let Some(mut doc) = documents.get_by_id(&job.source_document_id).await?
            && !doc.status.is_terminal()
        {
            doc.status = DocumentStatus::Failed;
            doc.ingest_completed_at = Some(time::now());
            documents.update(&doc).await?;
        }
        swept += 1;
    }

    if swept > 0 {
        info!(count = swept, "reconciled stale jobs");
    }
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricebot_store::{IngestionJob, SourceDocument};

    #[tokio::test]
    async fn test_stale_running_jobs_are_failed() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();

        let doc = SourceDocument::new("a.csv", ".csv", "storage/a.csv");
        DocumentRepo::new(&conn).create(&doc).await.unwrap();
        let mut job = IngestionJob::new(doc.id, "spreadsheet");
        JobRepo::new(&conn).create(&job).await.unwrap();
        job.status = JobStatus::Running;
        JobRepo::new(&conn).update(&mut job).await.unwrap();
        drop(conn);

        // Negative threshold pushes the cutoff into the future, so the
        // just-updated job counts as stale
        let swept = reconcile_stale_jobs(&store, Duration::seconds(-60)).await.unwrap();
        assert_eq!(swept, 1);

        let conn = store.connect().unwrap();
        let job = JobRepo::new(&conn).get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let doc = DocumentRepo::new(&conn).get_by_id(&doc.id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_fresh_running_jobs_survive() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.connect().unwrap();

        let doc = SourceDocument::new("a.csv", ".csv", "storage/a.csv");
        DocumentRepo::new(&conn).create(&doc).await.unwrap();
        let mut job = IngestionJob::new(doc.id, "spreadsheet");
        JobRepo::new(&conn).create(&job).await.unwrap();
        job.status = JobStatus::Running;
        JobRepo::new(&conn).update(&mut job).await.unwrap();
        drop(conn);

        let swept = reconcile_stale_jobs(&store, Duration::hours(1)).await.unwrap();
        assert_eq!(swept, 0);
    }
}

//! Document upload and status endpoints
//!
//! Upload answers 202 as soon as the artefact is on disk and the job is
//! queued; clients poll the job endpoint. Artefacts land under
//! `<storage_dir>/<yyyy>/<mm>/<uuid>-<sanitized_filename>`.

use std::path::{Path, PathBuf};

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Datelike;
use pricebot_store::{
    DocumentRepo, IngestionJob, JobRepo, JobStatus, OfferFilter, OfferRepo, SourceDocument, time,
};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::routes::offers::OfferOut;
use crate::state::AppState;
use crate::types::{Pagination, wire_time};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const MAX_FILENAME_BYTES: usize = 120;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/documents/upload",
            post(upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/documents", get(list_documents))
        .route("/documents/{id}", get(get_document))
        .route("/documents/jobs/{id}", get(get_job))
        .route("/documents/templates/vendor-price", get(vendor_price_template))
}

// =============================================================================
// Upload
// =============================================================================

#[derive(Debug, Serialize)]
struct UploadResponse {
    document_id: Uuid,
    job_id: Uuid,
}

async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut vendor_name: Option<String> = None;
    let mut processor: Option<String> = None;
    let mut prefer_llm = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read file field: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            "vendor_name" => {
                vendor_name = Some(read_text_field(field).await?);
            }
            "processor" => {
                processor = Some(read_text_field(field).await?);
            }
            "prefer_llm" => {
                prefer_llm = read_text_field(field).await?.eq_ignore_ascii_case("true");
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| ApiError::validation("file", "file is required"))?;
    let file_name = file_name.unwrap_or_else(|| "upload".to_string());
    let vendor_name = vendor_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::validation("vendor_name", "vendor_name is required"))?;

    // Processor selection up front so unsupported types never hit disk
    let processor = state
        .registry
        .resolve(processor.as_deref(), Path::new(&file_name))?;

    let document_id = Uuid::new_v4();
    let storage_path = storage_path_for(
        &state.config.ingestion.storage_dir,
        &document_id,
        &file_name,
    );
    write_artefact(&storage_path, &file_bytes)?;

    let content_sha256 = hex::encode(Sha256::digest(&file_bytes));
    let extension = Path::new(&file_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let mut doc = SourceDocument::new(file_name.as_str(), extension, storage_path.display().to_string())
        .with_extra(json!({
            "declared_vendor": vendor_name,
            "processor": processor.name(),
            "content_sha256": content_sha256,
            "size_bytes": file_bytes.len(),
        }));
    doc.id = document_id;

    let job = IngestionJob::new(doc.id, processor.name()).with_logs(json!({
        "vendor_name": vendor_name,
        "filename": file_name,
        "prefer_llm": prefer_llm,
    }));

    let conn = state.store.connect()?;
    DocumentRepo::new(&conn).create(&doc).await?;
    JobRepo::new(&conn).create(&job).await?;

    if let Err(e) = state.runner.enqueue(job.id) {
        // Keep the artefact for forensic review; surface the backlog
        error!(job_id = %job.id, error = %e, "could not enqueue ingestion job");
        return Err(ApiError::Unavailable("ingestion queue full".into()));
    }

    state.ingest_metrics.documents_uploaded.inc();
    state.ingest_metrics.jobs_enqueued.inc();
    info!(document_id = %doc.id, job_id = %job.id, processor = processor.name(), "upload accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id: doc.id,
            job_id: job.id,
        }),
    ))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart field: {e}")))
}

/// `<storage_dir>/<yyyy>/<mm>/<uuid>-<sanitized>`
fn storage_path_for(storage_dir: &str, document_id: &Uuid, file_name: &str) -> PathBuf {
    let now = time::now();
    PathBuf::from(storage_dir)
        .join(format!("{:04}", now.year()))
        .join(format!("{:02}", now.month()))
        .join(format!("{document_id}-{}", sanitize_filename(file_name)))
}

/// Replace everything outside `[A-Za-z0-9._-]` and cap the length
pub fn sanitize_filename(raw: &str) -> String {
    let mut sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        sanitized = "upload".to_string();
    }
    while sanitized.len() > MAX_FILENAME_BYTES {
        sanitized.pop();
    }
    sanitized
}

fn write_artefact(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ApiError::Storage(format!("create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, bytes)
        .map_err(|e| ApiError::Storage(format!("write {}: {e}", path.display())))
}

// =============================================================================
// Listings & status
// =============================================================================

#[derive(Debug, Serialize)]
pub struct DocumentOut {
    pub id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub status: pricebot_store::DocumentStatus,
    #[serde(with = "wire_time::option")]
    pub ingest_started_at: Option<chrono::NaiveDateTime>,
    #[serde(with = "wire_time::option")]
    pub ingest_completed_at: Option<chrono::NaiveDateTime>,
    pub offers_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl DocumentOut {
    fn from_doc(doc: SourceDocument, offers_count: u64) -> Self {
        Self {
            id: doc.id,
            vendor_id: doc.vendor_id,
            file_name: doc.file_name,
            file_type: doc.file_type,
            status: doc.status,
            ingest_started_at: doc.ingest_started_at,
            ingest_completed_at: doc.ingest_completed_at,
            offers_count,
            extra: doc.extra,
        }
    }
}

#[derive(Debug, Serialize)]
struct DocumentList {
    documents: Vec<DocumentOut>,
    total: u64,
}

async fn list_documents(
    State(state): State<AppState>,
    axum::extract::Query(pagination): axum::extract::Query<Pagination>,
) -> Result<Json<DocumentList>> {
    let (limit, offset) = pagination.clamped(200);

    let conn = state.store.connect()?;
    let repo = DocumentRepo::new(&conn);
    let offers = OfferRepo::new(&conn);

    let mut documents = Vec::new();
    for doc in repo.list(limit, offset).await? {
        let count = offers.count_for_document(&doc.id).await?;
        documents.push(DocumentOut::from_doc(doc, count));
    }
    let total = repo.count().await?;

    Ok(Json(DocumentList { documents, total }))
}

#[derive(Debug, Serialize)]
struct DocumentDetail {
    #[serde(flatten)]
    document: DocumentOut,
    offers: Vec<OfferOut>,
}

async fn get_document(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Json<DocumentDetail>> {
    let conn = state.store.connect()?;
    let doc = DocumentRepo::new(&conn)
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("document", id))?;

    let offer_rows = OfferRepo::new(&conn)
        .list(
            &OfferFilter {
                source_document_id: Some(id),
                ..Default::default()
            },
            1000,
        )
        .await?;
    let offers_count = offer_rows.len() as u64;
    let offers = offer_rows.into_iter().map(OfferOut::from).collect();

    Ok(Json(DocumentDetail {
        document: DocumentOut::from_doc(doc, offers_count),
        offers,
    }))
}

#[derive(Debug, Serialize)]
struct JobStatusOut {
    status: JobStatus,
    #[serde(with = "wire_time")]
    created_at: chrono::NaiveDateTime,
    #[serde(with = "wire_time")]
    updated_at: chrono::NaiveDateTime,
    summary: JobSummary,
}

#[derive(Debug, Serialize)]
struct JobSummary {
    offers: u64,
    warnings: u64,
    errors: u64,
}

async fn get_job(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Json<JobStatusOut>> {
    let conn = state.store.connect()?;
    let job = JobRepo::new(&conn)
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("job", id))?;

    let logs = job.logs.unwrap_or(serde_json::Value::Null);
    let summary = JobSummary {
        offers: logs.get("offers").and_then(|v| v.as_u64()).unwrap_or(0),
        warnings: logs
            .get("warnings")
            .and_then(|v| v.as_array())
            .map(|warnings| warnings.len() as u64)
            .unwrap_or(0),
        errors: u64::from(logs.get("error").is_some()),
    };

    Ok(Json(JobStatusOut {
        status: job.status,
        created_at: job.created_at,
        updated_at: job.updated_at,
        summary,
    }))
}

/// Canonical spreadsheet template for vendor price sheets
async fn vendor_price_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"vendor-price-template.csv\"",
            ),
        ],
        pricebot_ingest::VENDOR_PRICE_TEMPLATE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("price list (v2).xlsx"), "price_list__v2_.xlsx");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("simple.csv"), "simple.csv");
        assert_eq!(sanitize_filename(""), "upload");

        let long = "a".repeat(300) + ".csv";
        assert!(sanitize_filename(&long).len() <= MAX_FILENAME_BYTES);
    }

    #[test]
    fn test_storage_path_shape() {
        let id = Uuid::new_v4();
        let path = storage_path_for("storage", &id, "list.csv");
        let rendered = path.display().to_string();
        assert!(rendered.starts_with("storage/"));
        assert!(rendered.ends_with(&format!("{id}-list.csv")));
        // yyyy/mm levels present
        assert_eq!(path.components().count(), 4);
    }
}

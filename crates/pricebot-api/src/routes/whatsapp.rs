//! WhatsApp collector intake endpoint
//!
//! `POST /integrations/whatsapp/ingest`: token gate, optional HMAC
//! signature over the raw body, per-client rate limiting, then the batch
//! intake service inside one transaction. Chats that gained messages get a
//! debounced extraction scheduled before the response leaves.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use pricebot_store::db;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{check_ingest_token, check_signature};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::whatsapp::{Decision, WhatsAppIngestBatch, WhatsAppIntake};

/// Largest accepted batch
const MAX_BATCH_MESSAGES: usize = 500;
const MAX_TEXT_CHARS: usize = 5000;
const MAX_TITLE_CHARS: usize = 200;

pub fn routes() -> Router<AppState> {
    Router::new().route("/integrations/whatsapp/ingest", post(ingest))
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    request_id: Uuid,
    accepted: usize,
    created: usize,
    deduped: usize,
    created_chats: usize,
    decisions: Vec<Decision>,
}

async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>> {
    let client_hint = client_id_hint(&body);
    match gated_ingest(&state, &headers, &body).await {
        Ok(response) => Ok(response),
        Err(e) => {
            let status = e.status_code().as_u16();
            if status >= 400 {
                state.whatsapp_metrics.record_http_event(
                    client_hint.as_deref(),
                    status,
                    Some(rejection_reason(&e)),
                );
            }
            Err(e)
        }
    }
}

async fn gated_ingest(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Json<IngestResponse>> {
    let whatsapp_config = &state.config.whatsapp;

    // 1. Shared-secret token
    check_ingest_token(
        whatsapp_config.ingest_token.as_deref(),
        header_str(headers, "x-ingest-token"),
        state.config.server.is_production(),
    )?;

    // 2. HMAC signature when configured
    if let Some(secret) = whatsapp_config.ingest_hmac_secret.as_deref() {
        check_signature(
            secret,
            header_str(headers, "x-signature-timestamp"),
            header_str(headers, "x-signature"),
            body,
            whatsapp_config.ingest_signature_ttl_seconds,
        )
        .map_err(|rejection| ApiError::Forbidden(rejection.reason().to_string()))?;
    }

    // 3. Body schema
    let batch: WhatsAppIngestBatch = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("malformed JSON body: {e}")))?;
    validate_batch(&batch)?;

    // 4. Per-client budget
    state
        .limiter
        .check(&batch.client_id)
        .map_err(|retry_after| ApiError::RateLimited { retry_after })?;

    // 5. Dedupe + persist, one transaction, batch order
    let conn = state.store.connect()?;
    db::begin(&conn).await?;
    let intake = WhatsAppIntake::new(&conn, whatsapp_config.content_hash_window_hours);
    let outcome = match intake.ingest_batch(&batch.client_id, &batch.messages).await {
        Ok(outcome) => {
            db::commit(&conn).await?;
            outcome
        }
        Err(e) => {
            db::rollback(&conn).await;
            return Err(e.into());
        }
    };

    // 6. Metrics per chat, then debounced extraction for changed chats
    record_batch_metrics(state, &batch.client_id, &outcome.decisions);
    for chat_id in outcome.chats_with_new_messages() {
        state.scheduler.schedule(chat_id, Some(batch.client_id.clone()));
    }

    let response = IngestResponse {
        request_id: Uuid::new_v4(),
        accepted: batch.messages.len(),
        created: outcome.created,
        deduped: outcome.deduped,
        created_chats: outcome.created_chats,
        decisions: outcome.decisions,
    };
    info!(
        client_id = %batch.client_id,
        accepted = response.accepted,
        created = response.created,
        deduped = response.deduped,
        "whatsapp batch ingested"
    );
    Ok(Json(response))
}

fn validate_batch(batch: &WhatsAppIngestBatch) -> Result<()> {
    if batch.client_id.trim().len() < 3 || batch.client_id.len() > 200 {
        return Err(ApiError::validation("client_id", "must be 3-200 characters"));
    }
    if batch.messages.is_empty() {
        return Err(ApiError::validation("messages", "must not be empty"));
    }
    if batch.messages.len() > MAX_BATCH_MESSAGES {
        return Err(ApiError::validation(
            "messages",
            format!("at most {MAX_BATCH_MESSAGES} messages per batch"),
        ));
    }
    for (idx, message) in batch.messages.iter().enumerate() {
        let title = message.chat_title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(ApiError::validation(
                format!("messages[{idx}].chat_title"),
                format!("must be 1-{MAX_TITLE_CHARS} characters"),
            ));
        }
        if message.text.is_empty() || message.text.chars().count() > MAX_TEXT_CHARS {
            return Err(ApiError::validation(
                format!("messages[{idx}].text"),
                format!("must be 1-{MAX_TEXT_CHARS} characters"),
            ));
        }
    }
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Best-effort client id for failure metrics, without full validation
fn client_id_hint(body: &Bytes) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()?
        .get("client_id")?
        .as_str()
        .map(str::to_string)
}

fn rejection_reason(error: &ApiError) -> &'static str {
    match error {
        ApiError::Unauthorized(_) => "invalid_token",
        ApiError::Unavailable(_) => "missing_token_config",
        ApiError::Forbidden(detail) if detail.contains("stale") => "stale_signature",
        ApiError::Forbidden(_) => "invalid_signature",
        ApiError::RateLimited { .. } => "rate_limited",
        ApiError::Validation { .. } => "invalid_request",
        ApiError::BadRequest(_) => "malformed_body",
        _ => "error",
    }
}

fn record_batch_metrics(state: &AppState, client_id: &str, decisions: &[Decision]) {
    use std::collections::HashMap;

    let mut per_chat: HashMap<Uuid, (String, u64, u64, u64, u64)> = HashMap::new();
    for decision in decisions {
        let entry = per_chat
            .entry(decision.chat_id)
            .or_insert_with(|| (decision.chat_title.clone(), 0, 0, 0, 0));
        entry.1 += 1;
        match decision.status {
            "created" => entry.2 += 1,
            "deduped" => entry.3 += 1,
            _ => entry.4 += 1,
        }
    }

    for (chat_id, (title, accepted, created, deduped, skipped)) in per_chat {
        state.whatsapp_metrics.record_ingest(
            Some(client_id),
            Some(&chat_id.to_string()),
            Some(&title),
            accepted,
            created,
            deduped,
            skipped,
        );
    }
}

//! WhatsApp intake and extraction counters
//!
//! Counters are keyed by `(client_id, chat_id)` so operators can see which
//! collector instance and which conversation is producing traffic, dedupe
//! noise, or auth failures. A bounded ring of recent failure events backs
//! the diagnostics section of `/metrics`.

use std::collections::HashMap;
use std::collections::VecDeque;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::Serialize;

/// Maximum retained failure events
const FAILURE_RING_CAPACITY: usize = 50;

/// Mutable counter cell for one `(client, chat)` pair
#[derive(Debug, Clone, Default, Serialize)]
pub struct WhatsAppCounterSnapshot {
    pub client_id: String,
    pub chat_id: String,
    pub chat_title: Option<String>,
    pub accepted: u64,
    pub created: u64,
    pub deduped: u64,
    pub skipped: u64,
    pub extracted_offers: u64,
    pub extraction_errors: u64,
    pub http_4xx: u64,
    pub http_5xx: u64,
    pub auth_failures: u64,
    pub forbidden: u64,
    pub rate_limited: u64,
    pub signature_failures: u64,
    pub last_event_at: Option<NaiveDateTime>,
}

/// A rejected or failed intake request
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvent {
    pub timestamp: NaiveDateTime,
    pub client_id: String,
    pub status_code: u16,
    pub reason: Option<String>,
}

/// Aggregate totals across all `(client, chat)` pairs
#[derive(Debug, Clone, Default, Serialize)]
pub struct WhatsAppTotals {
    pub accepted: u64,
    pub created: u64,
    pub deduped: u64,
    pub skipped: u64,
    pub extracted_offers: u64,
    pub extraction_errors: u64,
    pub http_4xx: u64,
    pub http_5xx: u64,
    pub auth_failures: u64,
    pub forbidden: u64,
    pub rate_limited: u64,
    pub signature_failures: u64,
}

#[derive(Debug, Default)]
struct Inner {
    counters: HashMap<(String, String), WhatsAppCounterSnapshot>,
    recent_failures: VecDeque<FailureEvent>,
}

/// In-memory counters for WhatsApp ingest and extraction activity
#[derive(Debug, Default)]
pub struct WhatsAppMetrics {
    inner: Mutex<Inner>,
}

fn utc_now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

impl WhatsAppMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(client_id: Option<&str>, chat_id: Option<&str>) -> (String, String) {
        (
            client_id.unwrap_or("unknown").to_string(),
            chat_id.unwrap_or("unknown").to_string(),
        )
    }

    /// Record the per-message decisions of one accepted batch
    pub fn record_ingest(
        &self,
        client_id: Option<&str>,
        chat_id: Option<&str>,
        chat_title: Option<&str>,
        accepted: u64,
        created: u64,
        deduped: u64,
        skipped: u64,
    ) {
        let mut inner = self.inner.lock();
        let now = utc_now();
        let counter = entry(&mut inner, Self::key(client_id, chat_id));
        counter.accepted += accepted;
        counter.created += created;
        counter.deduped += deduped;
        counter.skipped += skipped;
        if let Some(title) = chat_title {
            counter.chat_title = Some(title.to_string());
        }
        counter.last_event_at = Some(now);
    }

    /// Record the outcome of one debounced extraction run
    pub fn record_extract(
        &self,
        client_id: Option<&str>,
        chat_id: Option<&str>,
        chat_title: Option<&str>,
        offers: u64,
        errors: u64,
    ) {
        let mut inner = self.inner.lock();
        let now = utc_now();
        let counter = entry(&mut inner, Self::key(client_id, chat_id));
        counter.extracted_offers += offers;
        counter.extraction_errors += errors;
        if let Some(title) = chat_title {
            counter.chat_title = Some(title.to_string());
        }
        counter.last_event_at = Some(now);
    }

    /// Record a rejected request (4xx/5xx) and append to the failure ring
    pub fn record_http_event(
        &self,
        client_id: Option<&str>,
        status_code: u16,
        reason: Option<&str>,
    ) {
        let mut inner = self.inner.lock();
        let now = utc_now();
        let key = Self::key(client_id, None);
        {
            let counter = entry(&mut inner, key.clone());
            if (400..500).contains(&status_code) {
                counter.http_4xx += 1;
            }
            if (500..600).contains(&status_code) {
                counter.http_5xx += 1;
            }
            match status_code {
                401 => counter.auth_failures += 1,
                403 => counter.forbidden += 1,
                429 => counter.rate_limited += 1,
                _ => {}
            }
            if matches!(reason, Some("invalid_signature" | "stale_signature")) {
                counter.signature_failures += 1;
            }
            counter.last_event_at = Some(now);
        }

        if inner.recent_failures.len() == FAILURE_RING_CAPACITY {
            inner.recent_failures.pop_front();
        }
        inner.recent_failures.push_back(FailureEvent {
            timestamp: now,
            client_id: key.0,
            status_code,
            reason: reason.map(str::to_string),
        });
    }

    /// Counters sorted newest-activity first
    pub fn snapshot(&self) -> Vec<WhatsAppCounterSnapshot> {
        let inner = self.inner.lock();
        let mut counters: Vec<_> = inner.counters.values().cloned().collect();
        counters.sort_by(|a, b| b.last_event_at.cmp(&a.last_event_at));
        counters
    }

    /// Most recent failures, newest first
    pub fn recent_failures(&self, limit: usize) -> Vec<FailureEvent> {
        let inner = self.inner.lock();
        inner
            .recent_failures
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sum of every counter across all pairs
    pub fn totals(&self) -> WhatsAppTotals {
        let inner = self.inner.lock();
        let mut totals = WhatsAppTotals::default();
        for counter in inner.counters.values() {
            totals.accepted += counter.accepted;
            totals.created += counter.created;
            totals.deduped += counter.deduped;
            totals.skipped += counter.skipped;
            totals.extracted_offers += counter.extracted_offers;
            totals.extraction_errors += counter.extraction_errors;
            totals.http_4xx += counter.http_4xx;
            totals.http_5xx += counter.http_5xx;
            totals.auth_failures += counter.auth_failures;
            totals.forbidden += counter.forbidden;
            totals.rate_limited += counter.rate_limited;
            totals.signature_failures += counter.signature_failures;
        }
        totals
    }
}

fn entry<'a>(inner: &'a mut Inner, key: (String, String)) -> &'a mut WhatsAppCounterSnapshot {
    inner
        .counters
        .entry(key.clone())
        .or_insert_with(|| WhatsAppCounterSnapshot {
            client_id: key.0,
            chat_id: key.1,
            ..Default::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_counts_accumulate() {
        let metrics = WhatsAppMetrics::new();
        metrics.record_ingest(Some("c1"), Some("chat-a"), Some("Deals"), 3, 2, 1, 0);
        metrics.record_ingest(Some("c1"), Some("chat-a"), None, 2, 0, 2, 0);

        let snap = metrics.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].accepted, 5);
        assert_eq!(snap[0].created, 2);
        assert_eq!(snap[0].deduped, 3);
        assert_eq!(snap[0].chat_title.as_deref(), Some("Deals"));
    }

    #[test]
    fn test_http_events_classify_status() {
        let metrics = WhatsAppMetrics::new();
        metrics.record_http_event(Some("c1"), 401, Some("invalid_token"));
        metrics.record_http_event(Some("c1"), 403, Some("invalid_signature"));
        metrics.record_http_event(Some("c1"), 429, None);

        let totals = metrics.totals();
        assert_eq!(totals.http_4xx, 3);
        assert_eq!(totals.auth_failures, 1);
        assert_eq!(totals.forbidden, 1);
        assert_eq!(totals.rate_limited, 1);
        assert_eq!(totals.signature_failures, 1);
    }

    #[test]
    fn test_failure_ring_caps_and_orders() {
        let metrics = WhatsAppMetrics::new();
        for i in 0..60 {
            metrics.record_http_event(Some("c1"), 429, Some(&format!("r{i}")));
        }
        let failures = metrics.recent_failures(10);
        assert_eq!(failures.len(), 10);
        // Newest first
        assert_eq!(failures[0].reason.as_deref(), Some("r59"));
        // Ring never exceeds capacity
        assert_eq!(metrics.recent_failures(usize::MAX).len(), 50);
    }

    #[test]
    fn test_unknown_client_bucket() {
        let metrics = WhatsAppMetrics::new();
        metrics.record_http_event(None, 400, None);
        let snap = metrics.snapshot();
        assert_eq!(snap[0].client_id, "unknown");
    }
}

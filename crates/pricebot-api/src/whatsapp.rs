//! WhatsApp batch intake
//!
//! The dedupe-and-persist half of the ingest endpoint: chat resolution,
//! per-message decisions, and the content-hash window. Auth, rate limiting,
//! and scheduling live in the route handler; this service runs inside the
//! request's transaction and processes messages strictly in batch order.

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use pricebot_ingest::lines;
use pricebot_store::{
    ChatType, StoreError, WhatsAppChat, WhatsAppMessage, WhatsAppRepo, time,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use turso::Connection;
use uuid::Uuid;

use crate::types::wire_time;

/// One incoming message from the collector
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppMessageIn {
    pub chat_title: String,
    pub text: String,
    pub chat_type: Option<String>,
    pub platform_id: Option<String>,
    pub message_id: Option<String>,
    #[serde(default, with = "wire_time::option")]
    pub observed_at: Option<chrono::NaiveDateTime>,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub is_outgoing: Option<bool>,
    pub media: Option<serde_json::Value>,
    pub raw_payload: Option<serde_json::Value>,
}

/// The request body of `POST /integrations/whatsapp/ingest`
#[derive(Debug, Deserialize)]
pub struct WhatsAppIngestBatch {
    pub client_id: String,
    pub messages: Vec<WhatsAppMessageIn>,
}

/// Outcome for one message, in batch order
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub chat_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub content_hash: String,
    /// "created", "deduped", or "skipped"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_message_id: Option<Uuid>,
    /// For metrics grouping and extraction scheduling; not on the wire
    #[serde(skip)]
    pub chat_id: Uuid,
}

/// Batch totals plus the ordered decision list
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub created: usize,
    pub deduped: usize,
    pub skipped: usize,
    pub created_chats: usize,
    pub decisions: Vec<Decision>,
}

impl BatchOutcome {
    /// Chats that received at least one new message this batch
    pub fn chats_with_new_messages(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.decisions
            .iter()
            .filter(|decision| decision.status == "created")
            .filter_map(|decision| seen.insert(decision.chat_id).then_some(decision.chat_id))
            .collect()
    }
}

/// `sha256(chat_title + "\n" + sender_name + "\n" + trimmed_text)`
pub fn content_hash(chat_title: &str, sender_name: Option<&str>, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chat_title.as_bytes());
    hasher.update(b"\n");
    hasher.update(sender_name.unwrap_or_default().as_bytes());
    hasher.update(b"\n");
    hasher.update(text.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Intake service over one connection/transaction
pub struct WhatsAppIntake<'a> {
    conn: &'a Connection,
    /// Rolling content-hash dedupe window
    window: Duration,
}

impl<'a> WhatsAppIntake<'a> {
    pub fn new(conn: &'a Connection, window_hours: i64) -> Self {
        Self {
            conn,
            window: Duration::hours(window_hours.max(1)),
        }
    }

    /// Process messages in order, returning one decision per message
    pub async fn ingest_batch(
        &self,
        client_id: &str,
        messages: &[WhatsAppMessageIn],
    ) -> Result<BatchOutcome, StoreError> {
        let repo = WhatsAppRepo::new(self.conn);
        let mut outcome = BatchOutcome::default();

        let mut chat_cache: HashMap<String, WhatsAppChat> = HashMap::new();
        let mut seen_ids: HashSet<(Uuid, String)> = HashSet::new();
        let mut seen_hashes: HashSet<(Uuid, String)> = HashSet::new();
        let window_start = time::now() - self.window;

        for message in messages {
            let chat = self
                .resolve_chat(&repo, &mut chat_cache, message, &mut outcome.created_chats)
                .await?;
            let hash = content_hash(
                &message.chat_title,
                message.sender_name.as_deref(),
                &message.text,
            );

            let mut decision = Decision {
                chat_title: message.chat_title.clone(),
                platform_id: message.platform_id.clone(),
                message_id: message.message_id.clone(),
                content_hash: hash.clone(),
                status: "skipped",
                reason: None,
                whatsapp_message_id: None,
                chat_id: chat.id,
            };

            // (b) strict dedupe on (chat, message_id)
            if let Some(message_id) = message.message_id.as_deref().filter(|id| !id.is_empty()) {
                let key = (chat.id, message_id.to_string());
                if seen_ids.contains(&key) || repo.message_id_exists(&chat.id, message_id).await? {
                    decision.status = "deduped";
                    decision.reason = Some("duplicate_message_id");
                    outcome.deduped += 1;
                    outcome.decisions.push(decision);
                    continue;
                }
                seen_ids.insert(key);
            }

            // (c) content hash within the rolling window
            let hash_key = (chat.id, hash.clone());
            if seen_hashes.contains(&hash_key)
                || repo
                    .content_hash_exists_since(&chat.id, &hash, window_start)
                    .await?
            {
                decision.status = "deduped";
                decision.reason = Some("duplicate_content_hash_within_window");
                outcome.deduped += 1;
                outcome.decisions.push(decision);
                continue;
            }

            // (d) empty or filtered content never persists
            let trimmed = message.text.trim();
            if trimmed.is_empty() {
                decision.reason = Some("empty_text");
                outcome.skipped += 1;
                outcome.decisions.push(decision);
                continue;
            }
            if lines::is_noise_line(trimmed) {
                decision.reason = Some("filtered_event");
                outcome.skipped += 1;
                outcome.decisions.push(decision);
                continue;
            }

            // (e) persist
            seen_hashes.insert(hash_key);
            let mut row = WhatsAppMessage::new(
                chat.id,
                message.text.clone(),
                hash,
                message.observed_at.unwrap_or_else(time::now),
            );
            row.client_id = Some(client_id.to_string());
            row.message_id = message.message_id.clone();
            row.sender_name = message.sender_name.clone();
            row.sender_phone = message.sender_phone.clone();
            row.is_outgoing = message.is_outgoing;
            row.raw_payload = merge_payload(message);
            repo.create_message(&row).await?;

            decision.status = "created";
            decision.whatsapp_message_id = Some(row.id);
            outcome.created += 1;
            outcome.decisions.push(decision);
        }

        Ok(outcome)
    }

    async fn resolve_chat(
        &self,
        repo: &WhatsAppRepo<'_>,
        cache: &mut HashMap<String, WhatsAppChat>,
        message: &WhatsAppMessageIn,
        created_chats: &mut usize,
    ) -> Result<WhatsAppChat, StoreError> {
        let cache_key = message
            .platform_id
            .clone()
            .unwrap_or_else(|| message.chat_title.to_lowercase());
        if let Some(chat) = cache.get(&cache_key) {
            return Ok(chat.clone());
        }

        // Platform JID first, case-insensitive title second
        let existing = match message.platform_id.as_deref() {
            Some(platform_id) => match repo.get_chat_by_platform_id(platform_id).await? {
                Some(chat) => Some(chat),
                None => repo.get_chat_by_title(&message.chat_title).await?,
            },
            None => repo.get_chat_by_title(&message.chat_title).await?,
        };

        let chat = match existing {
            Some(chat) => chat,
            None => {
                let mut chat = WhatsAppChat::new(message.chat_title.trim());
                chat.chat_type = message
                    .chat_type
                    .as_deref()
                    .map(ChatType::parse)
                    .unwrap_or(ChatType::Unknown);
                chat.platform_id = message.platform_id.clone();
                repo.create_chat(&chat).await?;
                *created_chats += 1;
                chat
            }
        };

        cache.insert(cache_key, chat.clone());
        Ok(chat)
    }
}

/// Fold the optional media descriptor into the stored raw payload
fn merge_payload(message: &WhatsAppMessageIn) -> Option<serde_json::Value> {
    match (&message.raw_payload, &message.media) {
        (None, None) => None,
        (Some(payload), None) => Some(payload.clone()),
        (payload, Some(media)) => {
            let mut map = match payload {
                Some(serde_json::Value::Object(map)) => map.clone(),
                _ => serde_json::Map::new(),
            };
            map.insert("media".into(), media.clone());
            Some(serde_json::Value::Object(map))
        }
    }
}

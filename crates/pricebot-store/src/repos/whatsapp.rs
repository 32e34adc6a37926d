//! WhatsApp chat and message repositories
//!
//! Chats resolve by platform JID first, then case-insensitive title.
//! Message dedupe keys - `(chat, message_id)` and `(chat, content_hash)`
//! within a window - are checked here because the empty-string NULL
//! convention precludes schema-level uniqueness on `message_id`.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;
use turso::Connection;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::repos::{
    json_to_db, opt_text, parse_json_opt, parse_uuid, parse_uuid_opt, text_or_empty,
};
use crate::time;

/// Conversation kind reported by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Group,
    Direct,
    Unknown,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Direct => "direct",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse; anything unrecognized maps to `Unknown`
    pub fn parse(value: &str) -> Self {
        match value {
            "group" => Self::Group,
            "direct" => Self::Direct,
            _ => Self::Unknown,
        }
    }
}

/// Stored WhatsApp conversation
#[derive(Debug, Clone, Serialize)]
pub struct WhatsAppChat {
    pub id: Uuid,
    pub title: String,
    pub chat_type: ChatType,
    pub platform_id: Option<String>,
    /// Vendor that offers extracted from this chat are attributed to
    pub vendor_id: Option<Uuid>,
    pub extra: Option<serde_json::Value>,
    /// Watermark for the debounced extractor
    pub last_extracted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl WhatsAppChat {
    pub fn new(title: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            chat_type: ChatType::Unknown,
            platform_id: None,
            vendor_id: None,
            extra: None,
            last_extracted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Stored WhatsApp message
#[derive(Debug, Clone, Serialize)]
pub struct WhatsAppMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub client_id: Option<String>,
    pub message_id: Option<String>,
    pub observed_at: NaiveDateTime,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub is_outgoing: Option<bool>,
    pub text: String,
    pub content_hash: String,
    /// Source document for an attached media file
    pub media_document_id: Option<Uuid>,
    pub raw_payload: Option<serde_json::Value>,
}

impl WhatsAppMessage {
    pub fn new(
        chat_id: Uuid,
        text: impl Into<String>,
        content_hash: impl Into<String>,
        observed_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            client_id: None,
            message_id: None,
            observed_at,
            sender_name: None,
            sender_phone: None,
            is_outgoing: None,
            text: text.into(),
            content_hash: content_hash.into(),
            media_document_id: None,
            raw_payload: None,
        }
    }
}

const CHAT_COLUMNS: &str = "id, title, chat_type, platform_id, vendor_id, extra, \
     last_extracted_at, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, chat_id, client_id, message_id, observed_at, sender_name, \
     sender_phone, is_outgoing, text, content_hash, media_document_id, raw_payload";

/// WhatsApp repository (chats + messages)
pub struct WhatsAppRepo<'a> {
    conn: &'a Connection,
}

impl<'a> WhatsAppRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // =========================================================================
    // Chats
    // =========================================================================

    /// Insert a chat row
    pub async fn create_chat(&self, chat: &WhatsAppChat) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO whatsapp_chats ({CHAT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                [
                    chat.id.to_string().as_str(),
                    chat.title.as_str(),
                    chat.chat_type.as_str(),
                    text_or_empty(chat.platform_id.as_deref()),
                    chat.vendor_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    json_to_db(chat.extra.as_ref()).as_str(),
                    chat.last_extracted_at
                        .map(|t| time::to_db(&t))
                        .unwrap_or_default()
                        .as_str(),
                    time::to_db(&chat.created_at).as_str(),
                    time::to_db(&chat.updated_at).as_str(),
                ],
            )
            .await?;

        debug!(chat_id = %chat.id, title = %chat.title, "Created WhatsApp chat");
        Ok(())
    }

    /// Get chat by id
    pub async fn get_chat(&self, id: &Uuid) -> Result<Option<WhatsAppChat>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CHAT_COLUMNS} FROM whatsapp_chats WHERE id = ?1"),
                [id.to_string().as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_chat(&row)?)),
            None => Ok(None),
        }
    }

    /// Get chat by platform JID
    pub async fn get_chat_by_platform_id(&self, platform_id: &str) -> Result<Option<WhatsAppChat>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CHAT_COLUMNS} FROM whatsapp_chats \
                     WHERE platform_id = ?1 AND platform_id != ''"
                ),
                [platform_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_chat(&row)?)),
            None => Ok(None),
        }
    }

    /// Get chat by case-insensitive title
    pub async fn get_chat_by_title(&self, title: &str) -> Result<Option<WhatsAppChat>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CHAT_COLUMNS} FROM whatsapp_chats WHERE LOWER(title) = LOWER(?1)"
                ),
                [title.trim()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_chat(&row)?)),
            None => Ok(None),
        }
    }

    /// List all chats, newest first
    pub async fn list_chats(&self, limit: usize, offset: usize) -> Result<Vec<WhatsAppChat>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CHAT_COLUMNS} FROM whatsapp_chats \
                     ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                ),
                [limit.to_string().as_str(), offset.to_string().as_str()],
            )
            .await?;

        let mut chats = Vec::new();
        while let Some(row) = rows.next().await? {
            chats.push(Self::row_to_chat(&row)?);
        }
        Ok(chats)
    }

    /// Move the extraction watermark forward
    pub async fn set_last_extracted(&self, chat_id: &Uuid, at: NaiveDateTime) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE whatsapp_chats SET last_extracted_at = ?1, updated_at = ?2 WHERE id = ?3",
                [
                    time::to_db(&at).as_str(),
                    time::to_db(&time::now()).as_str(),
                    chat_id.to_string().as_str(),
                ],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::not_found("chat", chat_id.to_string()));
        }
        Ok(())
    }

    /// Map a chat to a vendor for offer attribution
    pub async fn set_chat_vendor(&self, chat_id: &Uuid, vendor_id: &Uuid) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE whatsapp_chats SET vendor_id = ?1, updated_at = ?2 WHERE id = ?3",
                [
                    vendor_id.to_string().as_str(),
                    time::to_db(&time::now()).as_str(),
                    chat_id.to_string().as_str(),
                ],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::not_found("chat", chat_id.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Insert a message row
    pub async fn create_message(&self, message: &WhatsAppMessage) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO whatsapp_messages ({MESSAGE_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                [
                    message.id.to_string().as_str(),
                    message.chat_id.to_string().as_str(),
                    text_or_empty(message.client_id.as_deref()),
                    text_or_empty(message.message_id.as_deref()),
                    time::to_db(&message.observed_at).as_str(),
                    text_or_empty(message.sender_name.as_deref()),
                    text_or_empty(message.sender_phone.as_deref()),
                    message
                        .is_outgoing
                        .map(|b| if b { "true" } else { "false" })
                        .unwrap_or(""),
                    message.text.as_str(),
                    message.content_hash.as_str(),
                    message
                        .media_document_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                        .as_str(),
                    json_to_db(message.raw_payload.as_ref()).as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    /// True when `(chat, message_id)` is already stored
    pub async fn message_id_exists(&self, chat_id: &Uuid, message_id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM whatsapp_messages \
                 WHERE chat_id = ?1 AND message_id = ?2 AND message_id != '' LIMIT 1",
                [chat_id.to_string().as_str(), message_id],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// True when `(chat, content_hash)` was stored at or after `since`
    pub async fn content_hash_exists_since(
        &self,
        chat_id: &Uuid,
        content_hash: &str,
        since: NaiveDateTime,
    ) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM whatsapp_messages \
                 WHERE chat_id = ?1 AND content_hash = ?2 AND observed_at >= ?3 LIMIT 1",
                [
                    chat_id.to_string().as_str(),
                    content_hash,
                    time::to_db(&since).as_str(),
                ],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Most recent messages, returned oldest-first for parsing; optionally
    /// bounded below by the extraction watermark
    pub async fn recent_messages(
        &self,
        chat_id: &Uuid,
        since: Option<NaiveDateTime>,
        limit: usize,
    ) -> Result<Vec<WhatsAppMessage>> {
        let since_db = since.map(|t| time::to_db(&t)).unwrap_or_default();
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM whatsapp_messages \
                     WHERE chat_id = ?1 AND (?2 = '' OR observed_at >= ?2) \
                     ORDER BY observed_at DESC LIMIT ?3"
                ),
                [
                    chat_id.to_string().as_str(),
                    since_db.as_str(),
                    limit.to_string().as_str(),
                ],
            )
            .await?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            messages.push(Self::row_to_message(&row)?);
        }
        messages.reverse();
        Ok(messages)
    }

    /// Count messages in a chat
    pub async fn count_messages(&self, chat_id: &Uuid) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM whatsapp_messages WHERE chat_id = ?1",
                [chat_id.to_string().as_str()],
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

    fn row_to_chat(row: &turso::Row) -> Result<WhatsAppChat> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let chat_type: String = row.get(2)?;
        let platform_id: String = row.get(3)?;
        let vendor_id: String = row.get(4)?;
        let extra: String = row.get(5)?;
        let last_extracted_at: String = row.get(6)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;

        Ok(WhatsAppChat {
            id: parse_uuid("chat.id", &id)?,
            title,
            chat_type: ChatType::parse(&chat_type),
            platform_id: opt_text(platform_id),
            vendor_id: parse_uuid_opt("chat.vendor_id", &vendor_id)?,
            extra: parse_json_opt("chat.extra", &extra)?,
            last_extracted_at: time::parse_db_opt(&last_extracted_at)?,
            created_at: time::parse_db(&created_at)?,
            updated_at: time::parse_db(&updated_at)?,
        })
    }

    fn row_to_message(row: &turso::Row) -> Result<WhatsAppMessage> {
        let id: String = row.get(0)?;
        let chat_id: String = row.get(1)?;
        let client_id: String = row.get(2)?;
        let message_id: String = row.get(3)?;
        let observed_at: String = row.get(4)?;
        let sender_name: String = row.get(5)?;
        let sender_phone: String = row.get(6)?;
        let is_outgoing: String = row.get(7)?;
        let text: String = row.get(8)?;
        let content_hash: String = row.get(9)?;
        let media_document_id: String = row.get(10)?;
        let raw_payload: String = row.get(11)?;

        Ok(WhatsAppMessage {
            id: parse_uuid("message.id", &id)?,
            chat_id: parse_uuid("message.chat_id", &chat_id)?,
            client_id: opt_text(client_id),
            message_id: opt_text(message_id),
            observed_at: time::parse_db(&observed_at)?,
            sender_name: opt_text(sender_name),
            sender_phone: opt_text(sender_phone),
            is_outgoing: match is_outgoing.as_str() {
                "" => None,
                "true" => Some(true),
                _ => Some(false),
            },
            text,
            content_hash,
            media_document_id: parse_uuid_opt("message.media_document_id", &media_document_id)?,
            raw_payload: parse_json_opt("message.raw_payload", &raw_payload)?,
        })
    }
}

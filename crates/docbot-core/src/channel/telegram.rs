//! Telegram Channel Implementation
//!
//! Talks to the Telegram Bot API: long-polls `getUpdates`, sends replies with
//! `sendMessage`, resolves the bot's own handle through `getMe` and downloads
//! attached documents through `getFile`.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{OnceCell, mpsc};
use tracing::{debug, error, info, warn};

use super::chunk::{TELEGRAM_MAX_LEN, chunk_text};
use super::traits::{Channel, MessageStream};
use super::types::{DocumentAttachment, InboundMessage, OutboundMessage};
use crate::mention::MentionSpan;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Default timeout for Telegram API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;
/// Pause after a failed poll
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default)]
    pub bot_token: String,
    /// API root, overridable for self-hosted Bot API servers
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-polling timeout in seconds (default: 30)
    #[serde(default = "default_polling_timeout")]
    pub polling_timeout: u32,
}

fn default_api_base() -> String {
    TELEGRAM_API_BASE.to_string()
}

fn default_polling_timeout() -> u32 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl TelegramConfig {
    /// Create a new config with just the bot token
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: default_api_base(),
            polling_timeout: default_polling_timeout(),
        }
    }

    /// Set the API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set polling timeout
    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }
}

/// Telegram channel implementation
#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    /// Pause between successive polls
    poll_interval: Duration,
    /// Whether polling is active
    polling_active: Arc<AtomicBool>,
    /// Last update ID for long-polling
    last_update_id: Arc<AtomicI64>,
    /// Cached `getMe` username
    handle: Arc<OnceCell<String>>,
}

impl TelegramChannel {
    /// Parse conversation_id into (chat_id, thread_id)
    /// Format: "chat_id" or "chat_id:thread_id"
    fn parse_conversation_id(conversation_id: &str) -> (String, Option<i64>) {
        match conversation_id.split_once(':') {
            Some((chat_id, thread_part)) => (chat_id.to_string(), thread_part.parse::<i64>().ok()),
            None => (conversation_id.to_string(), None),
        }
    }

    fn build_conversation_id(chat_id: i64, message_thread_id: Option<i64>) -> String {
        match message_thread_id {
            Some(thread_id) => format!("{}:{}", chat_id, thread_id),
            None => chat_id.to_string(),
        }
    }

    /// Create a new Telegram channel
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            poll_interval: Duration::from_secs(1),
            polling_active: Arc::new(AtomicBool::new(false)),
            last_update_id: Arc::new(AtomicI64::new(0)),
            handle: Arc::new(OnceCell::new()),
        }
    }

    /// Create with just bot token
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self::new(TelegramConfig::new(bot_token))
    }

    /// Set the pause between polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Ask the polling task to stop after its current poll
    pub fn stop_polling(&self) {
        self.polling_active.store(false, Ordering::SeqCst);
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.config.api_base, self.config.bot_token, file_path
        )
    }

    /// Call a Bot API method and unwrap the `{ok, result}` envelope
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("Telegram {} request failed", method))?;

        let status = response.status();
        let body: TelegramResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Telegram {} returned an unreadable body ({})", method, status))?;

        if !body.ok {
            return Err(anyhow!(
                "Telegram API error in {}: {}",
                method,
                body.description.unwrap_or_default()
            ));
        }
        body.result
            .ok_or_else(|| anyhow!("Telegram returned ok but no result for {}", method))
    }

    /// Send message via Telegram API
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to_message_id: Option<&str>,
        message_thread_id: Option<i64>,
    ) -> Result<TelegramMessageResponse> {
        let mut params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        // Extract numeric ID from our format (e.g., "tg_12345" -> 12345)
        if let Some(reply_id) = reply_to_message_id
            && let Some(numeric_id) = reply_id.strip_prefix("tg_")
            && let Ok(id) = numeric_id.parse::<i64>()
        {
            params["reply_to_message_id"] = serde_json::Value::Number(id.into());
        }

        if let Some(thread_id) = message_thread_id {
            params["message_thread_id"] = serde_json::Value::Number(thread_id.into());
        }

        self.call(
            "sendMessage",
            &params,
            Duration::from_secs(API_TIMEOUT_SECS),
        )
        .await
    }

    /// Poll for updates using long-polling
    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.config.polling_timeout,
            "allowed_updates": ["message"],
        });

        let updates: Vec<TelegramUpdate> = self
            .call(
                "getUpdates",
                &params,
                Duration::from_secs(self.config.polling_timeout as u64 + 10),
            )
            .await?;

        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }

        Ok(updates)
    }

    /// Convert Telegram update to InboundMessage
    fn convert_update(update: TelegramUpdate) -> Option<InboundMessage> {
        let message = update.message?;
        let from = message.from?;
        let conversation_id =
            Self::build_conversation_id(message.chat.id, message.message_thread_id);

        let has_media = message.photo.is_some()
            || message.voice.is_some()
            || message.audio.is_some()
            || message.video.is_some()
            || message.video_note.is_some()
            || message.animation.is_some()
            || message.sticker.is_some();

        // A caption plays the role of text on media and document messages.
        let (text, entities) = match (message.text, message.caption) {
            (Some(text), _) => (Some(text), message.entities),
            (None, Some(caption)) => (Some(caption), message.caption_entities),
            (None, None) => (None, None),
        };

        if text.is_none() && message.document.is_none() && !has_media {
            return None;
        }

        let mut inbound = InboundMessage::new(
            format!("tg_{}", message.message_id),
            from.id.to_string(),
            conversation_id,
        )
        .with_mentions(mention_spans(entities.as_deref().unwrap_or_default()));

        if let Some(name) = from.display_name() {
            inbound = inbound.with_sender_name(name);
        }
        if let Some(text) = text {
            inbound = inbound.with_text(text);
        }
        if let Some(document) = message.document {
            let mut attachment = DocumentAttachment::new(document.file_id);
            if let Some(file_name) = document.file_name {
                attachment = attachment.with_file_name(file_name);
            }
            if let Some(file_size) = document.file_size {
                attachment = attachment.with_file_size(file_size);
            }
            inbound = inbound.with_document(attachment);
        }
        if has_media {
            inbound = inbound.with_media();
        }

        Some(inbound)
    }

    /// Test the connection by calling getMe
    pub async fn test_connection(&self) -> Result<TelegramUser> {
        self.call(
            "getMe",
            &serde_json::json!({}),
            Duration::from_secs(API_TIMEOUT_SECS),
        )
        .await
    }

    async fn polling_loop(self, tx: mpsc::UnboundedSender<InboundMessage>) {
        self.polling_active.store(true, Ordering::SeqCst);
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "Starting Telegram polling");

        while self.polling_active.load(Ordering::SeqCst) && !tx.is_closed() {
            match self.poll_updates().await {
                Ok(updates) => {
                    for update in updates {
                        let update_id = update.update_id;
                        let Some(message) = Self::convert_update(update) else {
                            debug!(update_id, "Skipping unsupported Telegram update");
                            continue;
                        };
                        debug!(
                            message_id = %message.id,
                            sender_id = %message.sender_id,
                            "Received Telegram message"
                        );
                        if tx.send(message).is_err() {
                            warn!("Message receiver dropped, stopping polling");
                            self.polling_active.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    error!(error = %e, "Telegram polling error");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }

        self.polling_active.store(false, Ordering::SeqCst);
        info!("Telegram polling stopped");
    }
}

fn mention_spans(entities: &[TelegramEntity]) -> Vec<MentionSpan> {
    entities
        .iter()
        .filter(|entity| entity.r#type == "mention")
        .map(|entity| MentionSpan::new(entity.offset, entity.length))
        .collect()
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "Telegram"
    }

    fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let formatted = message.formatted_content();
        let (chat_id, thread_id) = Self::parse_conversation_id(&message.conversation_id);

        for chunk in chunk_text(&formatted, TELEGRAM_MAX_LEN) {
            self.send_message(&chat_id, &chunk, message.reply_to.as_deref(), thread_id)
                .await?;
        }
        Ok(())
    }

    async fn bot_handle(&self) -> Result<String> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                let me = self.test_connection().await?;
                let username = me
                    .username
                    .ok_or_else(|| anyhow!("Telegram bot account has no username"))?;
                info!(handle = %username, "Resolved bot handle");
                Ok::<_, anyhow::Error>(username)
            })
            .await?;
        Ok(handle.clone())
    }

    async fn download_document(&self, document: &DocumentAttachment) -> Result<Vec<u8>> {
        let file: TelegramFile = self
            .call(
                "getFile",
                &serde_json::json!({ "file_id": document.file_id }),
                Duration::from_secs(API_TIMEOUT_SECS),
            )
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| anyhow!("Telegram did not return a path for file {}", document.file_id))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await
            .context("Telegram file download failed")?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram file download error: {}", error));
        }

        let bytes = response.bytes().await?;
        debug!(file_id = %document.file_id, bytes = bytes.len(), "Downloaded document");
        Ok(bytes.to_vec())
    }

    fn start_receiving(&self) -> Option<MessageStream> {
        if !self.is_configured() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.clone().polling_loop(tx));

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramEntity {
    r#type: String,
    offset: usize,
    length: usize,
}

#[derive(Debug, Deserialize)]
struct TelegramDocument {
    file_id: String,
    file_name: Option<String>,
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    message_thread_id: Option<i64>,
    text: Option<String>,
    entities: Option<Vec<TelegramEntity>>,
    caption: Option<String>,
    caption_entities: Option<Vec<TelegramEntity>>,
    document: Option<TelegramDocument>,
    photo: Option<IgnoredAny>,
    voice: Option<IgnoredAny>,
    audio: Option<IgnoredAny>,
    video: Option<IgnoredAny>,
    video_note: Option<IgnoredAny>,
    animation: Option<IgnoredAny>,
    sticker: Option<IgnoredAny>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TelegramUser {
    /// First and last name, falling back to the username
    fn display_name(&self) -> Option<String> {
        let full = format!(
            "{}{}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name
                .as_ref()
                .map(|l| format!(" {}", l))
                .unwrap_or_default()
        );
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            Some(full.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramMessageResponse {
    #[allow(dead_code)]
    message_id: i64,
}

// ============================================================================
// Tests
// ============================================================================

//! Channel Message Handler
//!
//! Routes inbound messages to commands, document uploads or mention
//! answering, and turns every outcome into a reply on the same channel.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::assistant::{Assistant, KnowledgeOverview, ReloadMode, ReloadSummary, Upload};
use crate::channel::{Channel, DocumentAttachment, InboundMessage, OutboundMessage};
use crate::error::BotError;
use crate::llm::LlmError;
use crate::mention;

#[cfg(test)]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_millis(20);
#[cfg(not(test))]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(2);

const COMMAND_GUIDE: &str = "📌 Commands (send them in the group):\n \
1. /reloadall → reload every document in the docs directory (run it after editing files)\n \
2. /weather → today's weather from weather.txt\n \
3. /showkb → list the loaded documents with a preview\n \
4. /setprompt → change the answer style (example: /setprompt You are a friendly support agent)\n \
5. /clearall → wipe documents, conversation and prompt (use with care)\n \
6. @bot + a question → answered from all documents and the recent conversation\n\
\n💡 Every document in the docs directory is loaded and used for every answer.";

/// A recognized chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    ReloadAll,
    Weather,
    ShowKb,
    SetPrompt(String),
    ClearAll,
}

/// A command together with the bot it was addressed to, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: BotCommand,
    /// `foo` in `/reloadall@foo`
    pub target: Option<String>,
}

impl BotCommand {
    /// Parse `/name[@bot] [args]`. Returns `None` for text that is not a
    /// command or names an unknown one.
    pub fn parse(text: &str) -> Option<ParsedCommand> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let (name, target) = match head.split_once('@') {
            Some((name, target)) => (name, Some(target.to_string())),
            None => (head, None),
        };

        let command = match name.to_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "reloadall" => Self::ReloadAll,
            "weather" => Self::Weather,
            "showkb" => Self::ShowKb,
            "setprompt" => Self::SetPrompt(args.to_string()),
            "clearall" => Self::ClearAll,
            _ => return None,
        };
        Some(ParsedCommand { command, target })
    }
}

/// Handles inbound messages for one channel
pub struct MessageHandler {
    assistant: Arc<Assistant>,
    channel: Arc<dyn Channel>,
}

impl MessageHandler {
    pub fn new(assistant: Arc<Assistant>, channel: Arc<dyn Channel>) -> Self {
        Self { assistant, channel }
    }

    /// Process a single inbound message
    pub async fn handle(&self, message: &InboundMessage) -> Result<()> {
        debug!(
            message_id = %message.id,
            sender = %message.sender_id,
            conversation = %message.conversation_id,
            "Handling message"
        );

        let text = message.text.as_deref().unwrap_or_default();

        if text.trim_start().starts_with('/') {
            return match BotCommand::parse(text) {
                Some(parsed) => self.handle_command(message, parsed).await,
                None => {
                    debug!(text = %text, "Ignoring unknown command");
                    Ok(())
                }
            };
        }

        if let Some(document) = &message.document {
            return self.handle_upload(message, document).await;
        }

        if text.trim().is_empty() {
            debug!(message_id = %message.id, "Ignoring message without text");
            return Ok(());
        }

        self.handle_mention(message, text).await
    }

    async fn handle_command(&self, message: &InboundMessage, parsed: ParsedCommand) -> Result<()> {
        if let Some(target) = &parsed.target {
            let handle = self.channel.bot_handle().await?;
            if !target.eq_ignore_ascii_case(&handle) {
                debug!(target = %target, "Command addressed to another bot");
                return Ok(());
            }
        }

        info!(
            command = ?parsed.command,
            sender = %message.sender_id,
            "Executing command"
        );

        match parsed.command {
            BotCommand::Start => {
                let reply = match self.assistant.reload(ReloadMode::Explicit).await {
                    Ok(summary) => format!(
                        "🎉 The group assistant is active!\n{}\n\n{}",
                        reload_text(&summary),
                        COMMAND_GUIDE
                    ),
                    Err(e) => {
                        error!(error = %e, "Reload failed during /start");
                        format!("🎉 The group assistant is active!\n❌ Reload failed: {e}\n\n{COMMAND_GUIDE}")
                    }
                };
                self.reply(message, OutboundMessage::new(&message.conversation_id, reply))
                    .await
            }
            BotCommand::Help => {
                self.reply(message, OutboundMessage::new(&message.conversation_id, COMMAND_GUIDE))
                    .await
            }
            BotCommand::ReloadAll => {
                let response = match self.assistant.reload(ReloadMode::Explicit).await {
                    Ok(summary) => {
                        OutboundMessage::success(&message.conversation_id, reload_text(&summary))
                    }
                    Err(e) => self.failure(message, "Reload failed", &e),
                };
                self.reply(message, response).await
            }
            BotCommand::Weather => {
                let response = match self.assistant.weather().await {
                    Ok(reply) => OutboundMessage::new(
                        &message.conversation_id,
                        format!("🌤️ Today's weather:\n{reply}"),
                    ),
                    Err(e) => self.failure(message, "Weather lookup failed", &e),
                };
                self.reply(message, response).await
            }
            BotCommand::ShowKb => {
                let preview_chars = self.assistant.config().bot.preview_chars;
                let overview = self.assistant.knowledge_overview(preview_chars).await;
                let text = knowledge_text(&overview, preview_chars);
                self.reply(message, OutboundMessage::new(&message.conversation_id, text))
                    .await
            }
            BotCommand::SetPrompt(prompt) if prompt.is_empty() => {
                let current = self.assistant.system_prompt().await;
                let text = format!(
                    "📝 Current system prompt:\n{current}\n\n💡 Usage: /setprompt You are a concise weather assistant"
                );
                self.reply(message, OutboundMessage::new(&message.conversation_id, text))
                    .await
            }
            BotCommand::SetPrompt(prompt) => {
                let response = match self.assistant.set_system_prompt(&prompt).await {
                    Ok(()) => OutboundMessage::success(
                        &message.conversation_id,
                        format!("Answer style updated. New system prompt:\n{}", prompt.trim()),
                    ),
                    Err(e) => self.failure(message, "Could not update the prompt", &e),
                };
                self.reply(message, response).await
            }
            BotCommand::ClearAll => {
                let response = match self.assistant.clear_all().await {
                    Ok(()) => OutboundMessage::new(
                        &message.conversation_id,
                        "🆘 All data cleared.\n\
                         - Memory: documents, conversation and system prompt (back to default)\n\
                         - Files: history transcript and state file\n\
                         \n💡 Send /reloadall to load the documents in the docs directory again",
                    ),
                    Err(e) => self.failure(message, "Clearing failed", &e),
                };
                self.reply(message, response).await
            }
        }
    }

    async fn handle_upload(&self, message: &InboundMessage, document: &DocumentAttachment) -> Result<()> {
        let file_name = document.file_name.clone().unwrap_or_default();
        let declared_size = document.file_size.unwrap_or(0);

        if let Err(e) = self.assistant.precheck_upload(&file_name, declared_size) {
            warn!(file = %file_name, error = %e, "Rejected upload");
            let response = self.failure(message, "Upload rejected", &e);
            return self.reply(message, response).await;
        }

        let content = match self.channel.download_document(document).await {
            Ok(content) => content,
            Err(e) => {
                error!(file = %file_name, error = %e, "Document download failed");
                let response = OutboundMessage::error(
                    &message.conversation_id,
                    format!("Upload failed: {e}"),
                );
                return self.reply(message, response).await;
            }
        };

        let upload = Upload {
            file_name: file_name.clone(),
            size_bytes: declared_size,
            content,
        };
        let response = match self.assistant.ingest_upload(upload).await {
            Ok(receipt) => {
                info!(
                    path = %receipt.path.display(),
                    sender = %message.sender_id,
                    "Upload ingested"
                );
                OutboundMessage::success(
                    &message.conversation_id,
                    format!(
                        "File uploaded.\nSaved to: {}\nReloaded {} documents, the new content is available right away.",
                        receipt.path.display(),
                        receipt.summary.document_count
                    ),
                )
            }
            Err(e) => self.failure(message, "Upload failed", &e),
        };
        self.reply(message, response).await
    }

    async fn handle_mention(&self, message: &InboundMessage, text: &str) -> Result<()> {
        let handle = self
            .channel
            .bot_handle()
            .await
            .context("Failed to resolve the bot handle")?;
        let parsed = mention::parse(text, &message.mentions, &handle);
        if !parsed.addressed {
            return Ok(());
        }

        let prompts = &self.assistant.config().prompts;
        if message.has_media {
            let response = OutboundMessage::new(&message.conversation_id, &prompts.non_text_tip);
            return self.reply(message, response).await;
        }
        if parsed.question.is_empty() {
            let response = OutboundMessage::new(
                &message.conversation_id,
                prompts.no_question(message.display_name()),
            );
            return self.reply(message, response).await;
        }

        let response = match self.assistant.answer(&parsed.question).await {
            Ok(answer) => {
                info!(
                    sender = %message.sender_id,
                    question_len = parsed.question.len(),
                    "Answered mention"
                );
                OutboundMessage::new(&message.conversation_id, answer)
            }
            Err(e) => self.failure(message, "Answer failed", &e),
        };
        self.reply(message, response).await
    }

    /// Map a core error to the reply shown in the chat.
    fn failure(&self, message: &InboundMessage, action: &str, err: &BotError) -> OutboundMessage {
        error!(
            message_id = %message.id,
            sender = %message.sender_id,
            error = %err,
            "{}", action
        );
        let text = match err {
            BotError::Validation(reason) => format!("{action}: {reason}"),
            BotError::ModelInvocation(LlmError::MissingApiKey(_)) => {
                "The model API key is not configured. Set OPENAI_API_KEY and restart.".to_string()
            }
            BotError::ModelInvocation(e) => format!("{action}: {e}"),
            BotError::Io { .. } | BotError::Corruption { .. } => {
                return OutboundMessage::new(
                    &message.conversation_id,
                    &self.assistant.config().prompts.error_tip,
                );
            }
        };
        OutboundMessage::error(&message.conversation_id, text)
    }

    async fn reply(&self, message: &InboundMessage, response: OutboundMessage) -> Result<()> {
        self.channel
            .send(response.with_reply_to(&message.id))
            .await
            .with_context(|| format!("Failed to reply to message {}", message.id))
    }
}

/// One-line reload outcome
pub fn reload_text(summary: &ReloadSummary) -> String {
    format!(
        "Loaded {} documents, {} rounds of history (max {})",
        summary.document_count,
        summary.pairs_loaded(),
        summary.max_turns / 2
    )
}

/// Knowledge-base listing with a preview
pub fn knowledge_text(overview: &KnowledgeOverview, preview_chars: usize) -> String {
    if overview.is_empty() {
        return "📚 The knowledge base is empty. To fill it:\n\
                1. Put .txt files into the docs directory\n\
                2. Send /reloadall in the group"
            .to_string();
    }

    let documents = if overview.document_names.is_empty() {
        "none".to_string()
    } else {
        format!("\n- {}", overview.document_names.join("\n- "))
    };
    let mut preview = overview.preview.clone();
    if overview.truncated {
        preview.push_str(&format!(
            "\n\n...(too long, only the first {preview_chars} characters are shown; the full text is loaded)"
        ));
    }

    format!(
        "📚 Loaded documents:{documents}\n\n📝 Preview:\n{preview}\n\n💡 Send /reloadall after editing documents"
    )
}

/// Consume the channel's message stream until `shutdown` fires.
///
/// Messages are handled one at a time. Handler errors are logged and the
/// loop moves on; an ended stream is restarted after a short delay.
pub async fn run_message_loop(
    channel: Arc<dyn Channel>,
    handler: Arc<MessageHandler>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    info!(channel = channel.name(), "Listening for messages");

    loop {
        let Some(mut stream) = channel.start_receiving() else {
            warn!(
                channel = channel.name(),
                "Failed to start message stream, retrying in {:?}", STREAM_RECONNECT_DELAY
            );
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = sleep(STREAM_RECONNECT_DELAY) => continue,
            }
        };

        loop {
            let message = tokio::select! {
                _ = shutdown.recv() => {
                    info!(channel = channel.name(), "Message loop shutting down");
                    return Ok(());
                }
                next = stream.next() => match next {
                    Some(message) => message,
                    None => {
                        warn!(
                            channel = channel.name(),
                            "Message stream ended, restarting in {:?}", STREAM_RECONNECT_DELAY
                        );
                        break;
                    }
                },
            };

            match handler.handle(&message).await {
                Ok(()) => debug!(message_id = %message.id, "Message handled"),
                Err(e) => error!(
                    message_id = %message.id,
                    conversation = %message.conversation_id,
                    error = %e,
                    "Error handling message"
                ),
            }
        }

        tokio::select! {
            _ = shutdown.recv() => break,
            _ = sleep(STREAM_RECONNECT_DELAY) => {}
        }
    }

    info!(channel = channel.name(), "Message loop shutting down");
    Ok(())
}

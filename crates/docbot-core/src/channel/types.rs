//! Transport-neutral message types.

use serde::{Deserialize, Serialize};

use crate::mention::MentionSpan;

/// Message level for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    /// Sent as-is
    #[default]
    Plain,
    Success,
    Error,
}

impl MessageLevel {
    /// Prefix placed before the content, if any
    pub fn emoji(&self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Success => Some("✅"),
            Self::Error => Some("❌"),
        }
    }
}

/// A document attached to an inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAttachment {
    /// Transport handle used to download the file
    pub file_id: String,
    pub file_name: Option<String>,
    /// Declared size in bytes, when the transport reports one
    pub file_size: Option<u64>,
}

impl DocumentAttachment {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: None,
            file_size: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = Some(file_size);
        self
    }
}

/// Inbound message from a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID
    pub id: String,
    /// Sender identifier (user ID in the channel)
    pub sender_id: String,
    /// Sender display name (if available)
    pub sender_name: Option<String>,
    /// Conversation identifier (chat_id, or chat_id:thread_id)
    pub conversation_id: String,
    /// Message text, or the caption of a media message
    pub text: Option<String>,
    /// Mention ranges over `text`, in UTF-16 code units
    pub mentions: Vec<MentionSpan>,
    /// Attached document, if any
    pub document: Option<DocumentAttachment>,
    /// Whether the message carries non-text media (photo, voice, sticker...)
    pub has_media: bool,
}

impl InboundMessage {
    /// Create an empty inbound message
    pub fn new(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            conversation_id: conversation_id.into(),
            text: None,
            mentions: Vec::new(),
            document: None,
            has_media: false,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_mentions(mut self, mentions: Vec<MentionSpan>) -> Self {
        self.mentions = mentions;
        self
    }

    /// Set sender name
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn with_document(mut self, document: DocumentAttachment) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_media(mut self) -> Self {
        self.has_media = true;
        self
    }

    /// Name used when addressing the sender
    pub fn display_name(&self) -> &str {
        self.sender_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("User")
    }
}

/// Outbound message to a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Conversation identifier
    pub conversation_id: String,
    /// Message content
    pub content: String,
    /// Message level for formatting
    pub level: MessageLevel,
    /// Reply to specific message
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Create a new outbound message
    pub fn new(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: content.into(),
            level: MessageLevel::Plain,
            reply_to: None,
        }
    }

    /// Set message level
    pub fn with_level(mut self, level: MessageLevel) -> Self {
        self.level = level;
        self
    }

    /// Set reply_to
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Create a success message
    pub fn success(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, content).with_level(MessageLevel::Success)
    }

    /// Create an error message
    pub fn error(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, content).with_level(MessageLevel::Error)
    }

    /// Content with the level emoji prefixed
    pub fn formatted_content(&self) -> String {
        match self.level.emoji() {
            Some(emoji) => format!("{} {}", emoji, self.content),
            None => self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_level_emoji() {
        assert_eq!(MessageLevel::Plain.emoji(), None);
        assert_eq!(MessageLevel::Success.emoji(), Some("✅"));
        assert_eq!(MessageLevel::Error.emoji(), Some("❌"));
    }

    #[test]
    fn test_outbound_message_formatting() {
        assert_eq!(
            OutboundMessage::success("1", "Reloaded").formatted_content(),
            "✅ Reloaded"
        );
        assert_eq!(
            OutboundMessage::new("1", "plain answer").formatted_content(),
            "plain answer"
        );
    }

    #[test]
    fn test_inbound_message_builder() {
        let msg = InboundMessage::new("tg_1", "42", "-100")
            .with_text("@bot hi")
            .with_mentions(vec![MentionSpan::new(0, 4)])
            .with_sender_name("Ada")
            .with_document(DocumentAttachment::new("f1").with_file_name("a.txt"));

        assert_eq!(msg.text.as_deref(), Some("@bot hi"));
        assert_eq!(msg.mentions.len(), 1);
        assert_eq!(msg.display_name(), "Ada");
        assert_eq!(msg.document.unwrap().file_name.as_deref(), Some("a.txt"));
        assert!(!msg.has_media);
    }

    #[test]
    fn test_display_name_falls_back() {
        let msg = InboundMessage::new("1", "42", "-100");
        assert_eq!(msg.display_name(), "User");
        assert_eq!(msg.with_sender_name("").display_name(), "User");
    }
}

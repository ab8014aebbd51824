//! Channel Trait Definitions
//!
//! Defines the interface a chat transport implements for the bot.

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::{DocumentAttachment, InboundMessage, OutboundMessage};

/// Stream of inbound messages produced by a channel
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Bidirectional chat transport
///
/// # Example
///
/// ```ignore
/// struct MyChannel { /* ... */ }
///
/// #[async_trait]
/// impl Channel for MyChannel {
///     fn name(&self) -> &str {
///         "My channel"
///     }
///
///     fn is_configured(&self) -> bool {
///         !self.token.is_empty()
///     }
///
///     async fn send(&self, message: OutboundMessage) -> Result<()> {
///         Ok(())
///     }
///
///     async fn bot_handle(&self) -> Result<String> {
///         Ok("my_bot".to_string())
///     }
///
///     async fn download_document(&self, document: &DocumentAttachment) -> Result<Vec<u8>> {
///         Ok(Vec::new())
///     }
///
///     fn start_receiving(&self) -> Option<MessageStream> {
///         None
///     }
/// }
/// ```
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get channel display name
    fn name(&self) -> &str;

    /// Check if channel is properly configured
    fn is_configured(&self) -> bool;

    /// Send a message to the channel
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// The bot's own handle, without the leading `@`
    async fn bot_handle(&self) -> Result<String>;

    /// Fetch the bytes of an attached document
    async fn download_document(&self, document: &DocumentAttachment) -> Result<Vec<u8>>;

    /// Start receiving messages (returns None if the channel cannot receive)
    ///
    /// Messages are yielded as they arrive; the stream ends when the
    /// underlying receiver stops.
    fn start_receiving(&self) -> Option<MessageStream>;
}

/// Test/mock channel for unit testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex as StdMutex};

    /// A mock channel for testing
    pub struct MockChannel {
        handle: String,
        sent_messages: Arc<tokio::sync::Mutex<Vec<OutboundMessage>>>,
        documents: HashMap<String, Vec<u8>>,
        inbound: StdMutex<Vec<Vec<InboundMessage>>>,
    }

    impl MockChannel {
        /// Create a new mock channel answering to `handle`
        pub fn new(handle: impl Into<String>) -> Self {
            Self {
                handle: handle.into(),
                sent_messages: Arc::new(tokio::sync::Mutex::new(Vec::new())),
                documents: HashMap::new(),
                inbound: StdMutex::new(Vec::new()),
            }
        }

        /// Make `bytes` downloadable under `file_id`
        pub fn with_document(mut self, file_id: impl Into<String>, bytes: &[u8]) -> Self {
            self.documents.insert(file_id.into(), bytes.to_vec());
            self
        }

        /// Queue a batch yielded by one `start_receiving` call
        pub fn with_inbound_batch(self, batch: Vec<InboundMessage>) -> Self {
            if let Ok(mut inbound) = self.inbound.lock() {
                inbound.push(batch);
            }
            self
        }

        /// Get all sent messages
        pub async fn get_sent_messages(&self) -> Vec<OutboundMessage> {
            self.sent_messages.lock().await.clone()
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn name(&self) -> &str {
            "Mock"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn send(&self, message: OutboundMessage) -> Result<()> {
            self.sent_messages.lock().await.push(message);
            Ok(())
        }

        async fn bot_handle(&self) -> Result<String> {
            Ok(self.handle.clone())
        }

        async fn download_document(&self, document: &DocumentAttachment) -> Result<Vec<u8>> {
            self.documents
                .get(&document.file_id)
                .cloned()
                .ok_or_else(|| anyhow!("unknown file {}", document.file_id))
        }

        fn start_receiving(&self) -> Option<MessageStream> {
            let mut inbound = self.inbound.lock().ok()?;
            if inbound.is_empty() {
                return None;
            }
            let batch = inbound.remove(0);
            Some(Box::pin(futures::stream::iter(batch)))
        }
    }
}

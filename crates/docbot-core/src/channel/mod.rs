//! Chat Transport Layer
//!
//! A transport turns platform updates into [`InboundMessage`]s and delivers
//! [`OutboundMessage`]s back. The bot only talks to the [`Channel`] trait, so
//! everything above this layer is transport-neutral.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         MessageHandler                  │
//! │  - commands, uploads, mentions          │
//! └─────────────────────────────────────────┘
//!              │
//!              ▼
//! ┌─────────────────────────────────────────┐
//! │         trait Channel                   │
//! │  - send(message)                        │
//! │  - start_receiving() -> Stream          │
//! │  - bot_handle(), download_document()    │
//! └─────────────────────────────────────────┘
//!              │
//!              ▼
//!          Telegram
//! ```

mod chunk;
mod telegram;
mod traits;
mod types;

pub use chunk::{TELEGRAM_MAX_LEN, chunk_text};
pub use telegram::{TelegramChannel, TelegramConfig, TelegramUser};
pub use traits::{Channel, MessageStream};
pub use types::{DocumentAttachment, InboundMessage, MessageLevel, OutboundMessage};

#[cfg(test)]
pub(crate) use traits::mock;

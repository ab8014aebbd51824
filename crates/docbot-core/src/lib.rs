pub mod assistant;
pub mod channel;
pub mod config;
pub mod conversation;
pub mod corpus;
pub mod error;
pub mod handler;
pub mod llm;
pub mod mention;
pub mod prompt;
pub mod storage;

pub use assistant::{
    Assistant, KnowledgeOverview, ReloadMode, ReloadSummary, Upload, UploadReceipt,
};
pub use config::BotConfig;
pub use conversation::{ConversationStore, Role, Turn};
pub use corpus::{Corpus, CorpusLoader};
pub use error::{BotError, Result};
pub use handler::{MessageHandler, run_message_loop};

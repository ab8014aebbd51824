//! Bot configuration
//!
//! Every tunable is enumerated here with a named default. The structure is
//! built once at startup (usually from a TOML file by the CLI) and passed
//! down; nothing reads configuration ad hoc.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BotError, Result};
use crate::llm::GenerationParams;

const MIB: u64 = 1024 * 1024;

/// Top-level bot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    #[serde(default)]
    pub bot: BotSettings,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Size limits and other behavioural knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotSettings {
    /// Largest accepted upload in bytes (default: 5 MiB)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Documents larger than this are skipped on reload (default: 10 MiB)
    #[serde(default = "default_max_document_size")]
    pub max_document_size: u64,
    /// Maximum number of turns kept in the conversation (default: 20)
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
    /// Seconds to wait between transport polls (default: 1)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// History log size that triggers rotation (default: 100 MiB)
    #[serde(default = "default_history_hard_cap")]
    pub history_hard_cap: u64,
    /// Trailing window kept after rotation (default: 50 MiB)
    #[serde(default = "default_history_soft_cap")]
    pub history_soft_cap: u64,
    /// File extensions treated as documents, without the dot
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,
    /// Characters shown by the knowledge-base preview (default: 1500)
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_max_upload_size() -> u64 {
    5 * MIB
}

fn default_max_document_size() -> u64 {
    10 * MIB
}

fn default_max_context_turns() -> usize {
    20
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_history_hard_cap() -> u64 {
    100 * MIB
}

fn default_history_soft_cap() -> u64 {
    50 * MIB
}

fn default_document_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

fn default_preview_chars() -> usize {
    1500
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            max_upload_size: default_max_upload_size(),
            max_document_size: default_max_document_size(),
            max_context_turns: default_max_context_turns(),
            poll_interval_secs: default_poll_interval_secs(),
            history_hard_cap: default_history_hard_cap(),
            history_soft_cap: default_history_soft_cap(),
            document_extensions: default_document_extensions(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl BotSettings {
    /// Conversation limit rounded down to an even number, never below one pair.
    pub fn context_limit(&self) -> usize {
        let limit = self.max_context_turns.max(2);
        limit - limit % 2
    }

    /// Whether `file_name` carries one of the recognized document extensions.
    pub fn is_document_name(&self, file_name: &str) -> bool {
        has_extension(file_name, &self.document_extensions)
    }
}

pub(crate) fn has_extension(file_name: &str, extensions: &[String]) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Directory scanned for documents
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// Append-only conversation transcript
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    /// Persisted state blob
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("docs").join("chat_history.txt")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("docbot_state.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            history_file: default_history_file(),
            state_file: default_state_file(),
        }
    }
}

impl PathsConfig {
    /// Anchor relative paths at `base`. Absolute paths are kept as-is.
    pub fn resolved_against(&self, base: &Path) -> Self {
        let anchor = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        Self {
            docs_dir: anchor(&self.docs_dir),
            history_file: anchor(&self.history_file),
            state_file: anchor(&self.state_file),
        }
    }
}

/// User-facing prompts and canned replies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptsConfig {
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
    #[serde(default = "default_weather_system_prompt")]
    pub weather_system_prompt: String,
    #[serde(default = "default_weather_question")]
    pub weather_question: String,
    #[serde(default = "default_error_tip")]
    pub error_tip: String,
    #[serde(default = "default_non_text_tip")]
    pub non_text_tip: String,
    /// `{user_name}` is replaced with the sender's display name.
    #[serde(default = "default_no_question_tip")]
    pub no_question_tip: String,
}

fn default_system_prompt() -> String {
    "You are the assistant of this group chat. Rules:\n\
     1. Answer from the reference documents first and quote them precisely;\n\
     2. Use the earlier conversation for context and keep answers complete and accurate;\n\
     3. Keep a friendly, natural tone."
        .to_string()
}

fn default_weather_system_prompt() -> String {
    "Answer today's weather strictly from the document named weather.txt in the reference \
     documents. If there is no such document, reply exactly \"No weather information found, \
     please check weather.txt\". Never invent weather data."
        .to_string()
}

fn default_weather_question() -> String {
    "What is the weather today?".to_string()
}

fn default_error_tip() -> String {
    "Sorry, something went wrong while handling your request.\n\
     Possible causes:\n\
     1. A non-text message mentioned me; please send your question as text;\n\
     2. The network or the model API key is unavailable; please try again later;\n\
     3. A document is malformed; fix it and run /reloadall."
        .to_string()
}

fn default_non_text_tip() -> String {
    "Sorry, I only understand text messages. Mention me with a written question.".to_string()
}

fn default_no_question_tip() -> String {
    "@{user_name} you mentioned me but didn't ask anything. Tell me what you'd like to know \
     and I'll answer from the documents."
        .to_string()
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            default_system_prompt: default_system_prompt(),
            weather_system_prompt: default_weather_system_prompt(),
            weather_question: default_weather_question(),
            error_tip: default_error_tip(),
            non_text_tip: default_non_text_tip(),
            no_question_tip: default_no_question_tip(),
        }
    }
}

impl PromptsConfig {
    /// Render the empty-question tip for a sender.
    pub fn no_question(&self, user_name: &str) -> String {
        self.no_question_tip.replace("{user_name}", user_name)
    }
}

/// Generation parameters passed to the model collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,
    #[serde(default)]
    pub weather_temperature: f32,
    #[serde(default = "default_weather_max_tokens")]
    pub weather_max_tokens: u32,
}

fn default_answer_temperature() -> f32 {
    0.7
}

fn default_answer_max_tokens() -> u32 {
    2000
}

fn default_weather_max_tokens() -> u32 {
    500
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            answer_temperature: default_answer_temperature(),
            answer_max_tokens: default_answer_max_tokens(),
            weather_temperature: 0.0,
            weather_max_tokens: default_weather_max_tokens(),
        }
    }
}

impl GenerationConfig {
    pub fn answer_params(&self) -> GenerationParams {
        GenerationParams::new(self.answer_temperature, self.answer_max_tokens)
    }

    pub fn weather_params(&self) -> GenerationParams {
        GenerationParams::new(self.weather_temperature, self.weather_max_tokens)
    }
}

impl BotConfig {
    /// Reject combinations that would break the storage invariants.
    pub fn validate(&self) -> Result<()> {
        let bot = &self.bot;
        if bot.history_soft_cap == 0 || bot.history_soft_cap >= bot.history_hard_cap {
            return Err(BotError::Validation(format!(
                "history_soft_cap ({}) must be non-zero and below history_hard_cap ({})",
                bot.history_soft_cap, bot.history_hard_cap
            )));
        }
        if bot.document_extensions.is_empty() {
            return Err(BotError::Validation(
                "document_extensions must list at least one extension".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.answer_temperature)
            || !(0.0..=2.0).contains(&self.generation.weather_temperature)
        {
            return Err(BotError::Validation(
                "temperatures must be within 0.0..=2.0".to_string(),
            ));
        }
        Ok(())
    }
}

//! The assistant: corpus, conversation and system prompt behind one lock.
//!
//! Every operation takes the state mutex for its whole duration, including
//! the model call, so a reload or upload can never interleave with prompt
//! assembly. File writes happen synchronously while the lock is held.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::conversation::{ConversationStore, Turn};
use crate::corpus::{CorpusLoader, document_names};
use crate::error::{BotError, Result};
use crate::llm::{ChatMessage, ModelClient};
use crate::prompt::{build_request, system_content};
use crate::storage::{HistoryLog, PersistedState, StateFile, StateSource, write_atomic};

/// What a reload should do with the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMode {
    /// Process start: rebuild the conversation from the transcript.
    Initial,
    /// Operator request or upload: keep the conversation as it is.
    Explicit,
}

/// Result of a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Documents that contributed to the corpus
    pub document_count: usize,
    /// Turns held in the conversation afterwards
    pub turns_loaded: usize,
    /// Conversation capacity in turns
    pub max_turns: usize,
}

impl ReloadSummary {
    /// Complete user/assistant exchanges held
    pub fn pairs_loaded(&self) -> usize {
        self.turns_loaded / 2
    }
}

/// Preview of the loaded corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeOverview {
    pub document_names: Vec<String>,
    /// Leading characters of the corpus
    pub preview: String,
    /// Whether the corpus is longer than the preview
    pub truncated: bool,
}

impl KnowledgeOverview {
    pub fn is_empty(&self) -> bool {
        self.document_names.is_empty() && self.preview.is_empty()
    }
}

/// A file offered for ingestion
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    /// Size declared by the sender
    pub size_bytes: u64,
    pub content: Vec<u8>,
}

/// Outcome of a successful upload
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Where the document was written
    pub path: PathBuf,
    pub summary: ReloadSummary,
}

#[derive(Debug)]
struct BotState {
    conversation: ConversationStore,
    corpus: String,
    document_count: usize,
    system_prompt: String,
}

impl BotState {
    fn from_persisted(persisted: PersistedState, max_turns: usize) -> Self {
        let document_count = document_names(&persisted.corpus).len();
        Self {
            conversation: ConversationStore::from_turns(persisted.conversation, max_turns),
            corpus: persisted.corpus,
            document_count,
            system_prompt: persisted.system_prompt,
        }
    }

    fn to_persisted(&self) -> PersistedState {
        PersistedState {
            conversation: self.conversation.turns().to_vec(),
            corpus: self.corpus.clone(),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

/// Group-chat assistant backed by a document corpus
pub struct Assistant {
    config: BotConfig,
    loader: CorpusLoader,
    state_file: StateFile,
    history: HistoryLog,
    model: Arc<dyn ModelClient>,
    state: Mutex<BotState>,
}

impl Assistant {
    /// Restore persisted state and run the initial reload.
    pub async fn open(config: BotConfig, model: Arc<dyn ModelClient>) -> Result<Self> {
        config.validate()?;

        let loader = CorpusLoader::from_config(&config);
        let state_file = StateFile::new(&config.paths.state_file);
        let history = HistoryLog::from_config(&config);

        let (persisted, source) = state_file.load_or_default(&config.prompts.default_system_prompt);
        if source == StateSource::Recovered {
            warn!(path = %state_file.path().display(), "Started from a clean state after recovery");
        }
        let state = BotState::from_persisted(persisted, config.bot.context_limit());

        let assistant = Self {
            config,
            loader,
            state_file,
            history,
            model,
            state: Mutex::new(state),
        };

        let summary = assistant.reload(ReloadMode::Initial).await?;
        info!(
            documents = summary.document_count,
            turns = summary.turns_loaded,
            model = %assistant.model.model(),
            "Assistant ready"
        );
        Ok(assistant)
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Rebuild the corpus from the document directory.
    pub async fn reload(&self, mode: ReloadMode) -> Result<ReloadSummary> {
        let mut state = self.state.lock().await;
        self.reload_locked(&mut state, mode)
    }

    fn reload_locked(&self, state: &mut BotState, mode: ReloadMode) -> Result<ReloadSummary> {
        let corpus = self.loader.load()?;
        state.corpus = corpus.text;
        state.document_count = corpus.document_count;

        let created = match self.history.ensure_exists() {
            Ok(created) => created,
            Err(e) => {
                error!(error = %e, "Failed to create history file");
                false
            }
        };

        // A brand-new transcript has nothing to offer; keep the restored turns.
        if mode == ReloadMode::Initial && !created {
            match self.history.read_turns() {
                Ok(turns) => {
                    state.conversation =
                        ConversationStore::from_turns(turns, self.config.bot.context_limit());
                }
                Err(e) => {
                    error!(error = %e, "Failed to read history, keeping restored conversation");
                }
            }
        }

        self.persist(state);

        let summary = ReloadSummary {
            document_count: state.document_count,
            turns_loaded: state.conversation.len(),
            max_turns: state.conversation.max_turns(),
        };
        info!(
            ?mode,
            documents = summary.document_count,
            pairs = summary.pairs_loaded(),
            "Reloaded documents"
        );
        Ok(summary)
    }

    /// Answer a question from the corpus and conversation, then record the
    /// exchange.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(BotError::Validation("question is empty".to_string()));
        }

        let mut state = self.state.lock().await;
        let messages = build_request(
            &state.system_prompt,
            &state.corpus,
            state.conversation.turns(),
            question,
        );
        debug!(messages = messages.len(), "Invoking model for answer");

        let reply = self
            .model
            .complete(&messages, self.config.generation.answer_params())
            .await
            .inspect_err(|e| error!(error = %e, "Model invocation failed"))?;

        self.commit_locked(&mut state, question, &reply);
        Ok(reply)
    }

    /// Record a completed exchange: conversation, then state file, then
    /// transcript. Write failures are logged, never returned.
    pub async fn commit(&self, question: &str, answer: &str) {
        let mut state = self.state.lock().await;
        self.commit_locked(&mut state, question, answer);
    }

    fn commit_locked(&self, state: &mut BotState, question: &str, answer: &str) {
        state.conversation.append_pair(question, answer);
        self.persist(state);
        if let Err(e) = self.history.append(question, answer) {
            error!(error = %e, "Failed to append to history");
        }
    }

    /// One-shot weather answer from the corpus. Touches no state.
    pub async fn weather(&self) -> Result<String> {
        let state = self.state.lock().await;
        let prompts = &self.config.prompts;
        let messages = [
            ChatMessage::system(system_content(&prompts.weather_system_prompt, &state.corpus)),
            ChatMessage::user(prompts.weather_question.clone()),
        ];

        let reply = self
            .model
            .complete(&messages, self.config.generation.weather_params())
            .await
            .inspect_err(|e| error!(error = %e, "Weather model invocation failed"))?;
        Ok(reply)
    }

    pub async fn system_prompt(&self) -> String {
        self.state.lock().await.system_prompt.clone()
    }

    /// Replace the system prompt and persist it.
    pub async fn set_system_prompt(&self, prompt: &str) -> Result<()> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(BotError::Validation("system prompt is empty".to_string()));
        }

        let mut state = self.state.lock().await;
        state.system_prompt = prompt.to_string();
        self.persist(&state);
        info!(prompt_len = prompt.len(), "System prompt updated");
        Ok(())
    }

    /// Drop the conversation and corpus, restore the default prompt and
    /// reset the transcript.
    pub async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.conversation.clear();
        state.corpus.clear();
        state.document_count = 0;
        state.system_prompt = self.config.prompts.default_system_prompt.clone();
        self.persist(&state);
        self.history.reset()?;
        warn!("All state cleared");
        Ok(())
    }

    /// Document names and a leading slice of the corpus.
    pub async fn knowledge_overview(&self, preview_chars: usize) -> KnowledgeOverview {
        let state = self.state.lock().await;
        let preview: String = state.corpus.chars().take(preview_chars).collect();
        KnowledgeOverview {
            document_names: document_names(&state.corpus),
            truncated: preview.len() < state.corpus.len(),
            preview,
        }
    }

    /// Validate an uploaded document, store it and reload the corpus.
    pub async fn ingest_upload(&self, upload: Upload) -> Result<UploadReceipt> {
        let file_name = self.validate_upload(&upload)?;
        let path = self.loader.docs_dir().join(&file_name);

        let mut state = self.state.lock().await;
        self.loader.ensure_dir()?;
        write_atomic(&path, &upload.content)?;
        info!(path = %path.display(), bytes = upload.content.len(), "Stored uploaded document");

        let summary = self.reload_locked(&mut state, ReloadMode::Explicit)?;
        Ok(UploadReceipt { path, summary })
    }

    /// Check an upload's name and declared size before fetching its bytes.
    /// Returns the trimmed file name.
    pub fn precheck_upload(&self, file_name: &str, size_bytes: u64) -> Result<String> {
        let bot = &self.config.bot;
        let trimmed = file_name.trim();

        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed.contains("..")
            || trimmed.starts_with('.')
        {
            return Err(BotError::Validation(format!(
                "invalid file name: {file_name:?}"
            )));
        }
        if !bot.is_document_name(trimmed) {
            return Err(BotError::Validation(format!(
                "only {} files are accepted",
                bot.document_extensions
                    .iter()
                    .map(|ext| format!(".{}", ext.trim_start_matches('.')))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        if size_bytes > bot.max_upload_size {
            return Err(BotError::Validation(format!(
                "file is too large: {} exceeds the {} limit",
                format_size(size_bytes),
                format_size(bot.max_upload_size)
            )));
        }

        let history_name = self.history.path().file_name();
        if self.history.path().parent() == Some(self.loader.docs_dir())
            && history_name.is_some_and(|name| name.eq_ignore_ascii_case(trimmed))
        {
            return Err(BotError::Validation(format!(
                "{trimmed} is reserved for the conversation history"
            )));
        }

        Ok(trimmed.to_string())
    }

    fn validate_upload(&self, upload: &Upload) -> Result<String> {
        let size = upload.size_bytes.max(upload.content.len() as u64);
        let file_name = self.precheck_upload(&upload.file_name, size)?;
        if std::str::from_utf8(&upload.content).is_err() {
            return Err(BotError::Validation(
                "file is not valid UTF-8 text".to_string(),
            ));
        }
        Ok(file_name)
    }

    /// Turns currently held in the conversation
    pub async fn conversation(&self) -> Vec<Turn> {
        self.state.lock().await.conversation.turns().to_vec()
    }

    pub async fn document_count(&self) -> usize {
        self.state.lock().await.document_count
    }

    fn persist(&self, state: &BotState) {
        if let Err(e) = self.state_file.save(&state.to_persisted()) {
            error!(error = %e, "Failed to persist state");
        }
    }
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else {
        format!("{} KiB", bytes.div_ceil(1024))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatRole, MockModelClient, MockStep};
    use crate::prompt::CORPUS_DELIMITER;
    use crate::storage::history::HISTORY_HEADER;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn test_config(root: &Path) -> BotConfig {
        let mut config = BotConfig::default();
        config.paths = config.paths.resolved_against(root);
        config
    }

    async fn open_with(config: BotConfig, model: &MockModelClient) -> Assistant {
        Assistant::open(config, Arc::new(model.clone())).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_files_and_loads_documents() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.paths.docs_dir).unwrap();
        fs::write(config.paths.docs_dir.join("faq.txt"), "Opening hours: 9-17").unwrap();

        let assistant = open_with(config.clone(), &MockModelClient::new("m")).await;

        assert_eq!(assistant.document_count().await, 1);
        assert!(config.paths.state_file.exists());
        assert_eq!(
            fs::read_to_string(&config.paths.history_file).unwrap(),
            HISTORY_HEADER
        );
        let saved = StateFile::new(&config.paths.state_file).load().unwrap().unwrap();
        assert!(saved.corpus.contains("Opening hours"));
        assert_eq!(saved.system_prompt, config.prompts.default_system_prompt);
    }

    #[tokio::test]
    async fn test_answer_builds_request_and_commits() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.paths.docs_dir).unwrap();
        fs::write(config.paths.docs_dir.join("a.txt"), "alpha").unwrap();
        let model = MockModelClient::from_steps("m", vec![MockStep::text("first"), MockStep::text("second")]);
        let assistant = open_with(config.clone(), &model).await;

        assert_eq!(assistant.answer(" q1 ").await.unwrap(), "first");
        assert_eq!(assistant.answer("q2").await.unwrap(), "second");

        let requests = model.requests().await;
        let second = &requests[1].messages;
        assert_eq!(second[0].role, ChatRole::System);
        assert!(second[0].content.contains(CORPUS_DELIMITER));
        assert!(second[0].content.ends_with("alpha"));
        assert_eq!(second[1], ChatMessage::user("q1"));
        assert_eq!(second[2], ChatMessage::assistant("first"));
        assert_eq!(second[3], ChatMessage::user("q2"));
        assert_eq!(requests[1].params.max_tokens, 2000);

        assert_eq!(assistant.conversation().await.len(), 4);
        let saved = StateFile::new(&config.paths.state_file).load().unwrap().unwrap();
        assert_eq!(saved.conversation.len(), 4);
        let history = HistoryLog::new(&config.paths.history_file).read_turns().unwrap();
        assert_eq!(history, assistant.conversation().await);
    }

    #[tokio::test]
    async fn test_commit_persists_state_even_when_transcript_fails() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let assistant = open_with(config.clone(), &MockModelClient::new("m")).await;

        // A directory in place of the transcript makes the append fail.
        fs::remove_file(&config.paths.history_file).unwrap();
        fs::create_dir(&config.paths.history_file).unwrap();
        assistant.commit("q1", "a1").await;

        let expected = vec![Turn::user("q1"), Turn::assistant("a1")];
        assert_eq!(assistant.conversation().await, expected);
        let saved = StateFile::new(&config.paths.state_file).load().unwrap().unwrap();
        assert_eq!(saved.conversation, expected);

        fs::remove_dir(&config.paths.history_file).unwrap();
        assistant.commit("q2", "a2").await;

        let saved = StateFile::new(&config.paths.state_file).load().unwrap().unwrap();
        assert_eq!(saved.conversation.len(), 4);
        let history = HistoryLog::new(&config.paths.history_file).read_turns().unwrap();
        assert_eq!(history, vec![Turn::user("q2"), Turn::assistant("a2")]);
    }

    #[tokio::test]
    async fn test_model_failure_mutates_nothing() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let model = MockModelClient::from_steps("m", vec![MockStep::error("unavailable")]);
        let assistant = open_with(config.clone(), &model).await;
        let state_before = fs::read_to_string(&config.paths.state_file).unwrap();

        let err = assistant.answer("hello").await.unwrap_err();
        assert!(matches!(err, BotError::ModelInvocation(_)));
        assert!(assistant.conversation().await.is_empty());
        assert_eq!(fs::read_to_string(&config.paths.state_file).unwrap(), state_before);
        assert_eq!(
            fs::read_to_string(&config.paths.history_file).unwrap(),
            HISTORY_HEADER
        );
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let dir = tempdir().unwrap();
        let model = MockModelClient::new("m").with_fallback("x");
        let assistant = open_with(test_config(dir.path()), &model).await;
        assert!(assistant.answer("   ").await.unwrap_err().is_validation());
        assert!(model.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_conversation_is_bounded() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.bot.max_context_turns = 4;
        let assistant = open_with(config, &MockModelClient::new("m").with_fallback("ok")).await;

        for i in 0..5 {
            assistant.answer(&format!("q{i}")).await.unwrap();
        }
        let turns = assistant.conversation().await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].content, "q3");
    }

    #[tokio::test]
    async fn test_weather_uses_weather_prompt_and_keeps_state() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.paths.docs_dir).unwrap();
        fs::write(config.paths.docs_dir.join("weather.txt"), "Sunny, 25C").unwrap();
        let model = MockModelClient::from_steps("m", vec![MockStep::text("Sunny, 25C")]);
        let assistant = open_with(config.clone(), &model).await;

        assert_eq!(assistant.weather().await.unwrap(), "Sunny, 25C");

        let request = &model.requests().await[0];
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.starts_with(&config.prompts.weather_system_prompt));
        assert!(request.messages[0].content.contains("Sunny, 25C"));
        assert_eq!(request.messages[1].content, config.prompts.weather_question);
        assert_eq!(request.params.temperature, 0.0);
        assert_eq!(request.params.max_tokens, 500);
        assert!(assistant.conversation().await.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_reload_keeps_conversation() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let assistant = open_with(config.clone(), &MockModelClient::new("m").with_fallback("a")).await;
        assistant.answer("q").await.unwrap();

        fs::write(config.paths.docs_dir.join("new.txt"), "fresh").unwrap();
        let summary = assistant.reload(ReloadMode::Explicit).await.unwrap();

        assert_eq!(summary.document_count, 1);
        assert_eq!(summary.turns_loaded, 2);
        assert_eq!(summary.pairs_loaded(), 1);
        assert_eq!(summary.max_turns, 20);
    }

    #[tokio::test]
    async fn test_initial_reload_rederives_conversation_from_history() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        {
            let assistant =
                open_with(config.clone(), &MockModelClient::new("m").with_fallback("a")).await;
            assistant.answer("q1").await.unwrap();
            assistant.answer("q2").await.unwrap();
        }

        // Trim the transcript behind the bot's back; a restart follows it.
        HistoryLog::new(&config.paths.history_file).reset().unwrap();
        HistoryLog::new(&config.paths.history_file).append("only", "this").unwrap();

        let assistant = open_with(config, &MockModelClient::new("m")).await;
        assert_eq!(
            assistant.conversation().await,
            vec![Turn::user("only"), Turn::assistant("this")]
        );
    }

    #[tokio::test]
    async fn test_missing_history_keeps_restored_conversation() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        StateFile::new(&config.paths.state_file)
            .save(&PersistedState {
                conversation: vec![Turn::user("q"), Turn::assistant("a")],
                corpus: String::new(),
                system_prompt: "custom".to_string(),
            })
            .unwrap();

        let assistant = open_with(config, &MockModelClient::new("m")).await;
        assert_eq!(assistant.conversation().await.len(), 2);
        assert_eq!(assistant.system_prompt().await, "custom");
    }

    #[tokio::test]
    async fn test_set_system_prompt_persists() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let model = MockModelClient::new("m").with_fallback("ok");
        let assistant = open_with(config.clone(), &model).await;

        assistant.set_system_prompt("  Be terse.  ").await.unwrap();
        assert!(assistant.set_system_prompt(" ").await.unwrap_err().is_validation());
        assistant.answer("q").await.unwrap();

        assert_eq!(assistant.system_prompt().await, "Be terse.");
        assert_eq!(model.requests().await[0].messages[0].content, "Be terse.");
        let saved = StateFile::new(&config.paths.state_file).load().unwrap().unwrap();
        assert_eq!(saved.system_prompt, "Be terse.");
    }

    #[tokio::test]
    async fn test_clear_all_resets_everything() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.paths.docs_dir).unwrap();
        fs::write(config.paths.docs_dir.join("a.txt"), "alpha").unwrap();
        let assistant = open_with(config.clone(), &MockModelClient::new("m").with_fallback("x")).await;
        assistant.set_system_prompt("custom").await.unwrap();
        assistant.answer("q").await.unwrap();

        assistant.clear_all().await.unwrap();

        assert!(assistant.conversation().await.is_empty());
        assert_eq!(assistant.document_count().await, 0);
        assert_eq!(assistant.system_prompt().await, config.prompts.default_system_prompt);
        assert!(assistant.knowledge_overview(1500).await.is_empty());
        assert_eq!(
            fs::read_to_string(&config.paths.history_file).unwrap(),
            HISTORY_HEADER
        );
        let saved = StateFile::new(&config.paths.state_file).load().unwrap().unwrap();
        assert_eq!(saved, PersistedState::empty(&config.prompts.default_system_prompt));
    }

    #[tokio::test]
    async fn test_knowledge_overview_truncates_preview() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.paths.docs_dir).unwrap();
        fs::write(config.paths.docs_dir.join("long.txt"), "天".repeat(50)).unwrap();
        fs::write(config.paths.docs_dir.join("short.txt"), "s").unwrap();
        let assistant = open_with(config, &MockModelClient::new("m")).await;

        let overview = assistant.knowledge_overview(20).await;
        assert_eq!(overview.document_names, vec!["long.txt", "short.txt"]);
        assert_eq!(overview.preview.chars().count(), 20);
        assert!(overview.truncated);

        let full = assistant.knowledge_overview(10_000).await;
        assert!(!full.truncated);
    }

    #[tokio::test]
    async fn test_ingest_upload_stores_and_reloads() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let model = MockModelClient::new("m").with_fallback("x");
        let assistant = open_with(config.clone(), &model).await;
        assistant.answer("q").await.unwrap();

        let receipt = assistant
            .ingest_upload(Upload {
                file_name: "weather.txt".to_string(),
                size_bytes: 10,
                content: b"Sunny, 25C".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(receipt.path, config.paths.docs_dir.join("weather.txt"));
        assert_eq!(receipt.summary.document_count, 1);
        assert_eq!(receipt.summary.turns_loaded, 2);
        assert_eq!(
            assistant.knowledge_overview(1500).await.document_names,
            vec!["weather.txt"]
        );
    }

    #[tokio::test]
    async fn test_ingest_upload_validation() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.bot.max_upload_size = 16;
        let assistant = open_with(config.clone(), &MockModelClient::new("m")).await;

        let upload = |name: &str, size: u64, content: &[u8]| Upload {
            file_name: name.to_string(),
            size_bytes: size,
            content: content.to_vec(),
        };

        for bad in [
            upload("image.png", 3, b"png"),
            upload("big.txt", 17, b"small"),
            upload("sneaky.txt", 1, &[b'x'; 32]),
            upload("../escape.txt", 1, b"x"),
            upload("dir/inner.txt", 1, b"x"),
            upload(".hidden.txt", 1, b"x"),
            upload("latin1.txt", 2, &[0xff, 0xfe]),
            upload("chat_history.txt", 1, b"x"),
        ] {
            let name = bad.file_name.clone();
            let err = assistant.ingest_upload(bad).await.unwrap_err();
            assert!(err.is_validation(), "{name} should be rejected");
        }

        let stored: Vec<_> = fs::read_dir(&config.paths.docs_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(stored, vec!["chat_history.txt"]);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_size(1500), "2 KiB");
    }
}

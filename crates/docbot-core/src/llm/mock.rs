//! Deterministic mock model client for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use super::{ChatMessage, GenerationParams, LlmError, ModelClient};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a reply.
    Text(String),
    /// Fail with an API error.
    Error(String),
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A request observed by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub params: GenerationParams,
}

/// A mock client driven by scripted steps. Once the script runs out the
/// fallback reply is used, if one is set.
#[derive(Debug, Clone, Default)]
pub struct MockModelClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    fallback: Option<String>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockModelClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            ..Self::default()
        }
    }

    /// Reply with `text` whenever the script is empty.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, LlmError> {
        self.requests.lock().await.push(RecordedRequest {
            messages: messages.to_vec(),
            params,
        });

        let step = match self.next_step().await {
            Some(step) => step,
            None => match &self.fallback {
                Some(text) => MockStep::text(text.clone()),
                None => return Err(mock_error("script exhausted")),
            },
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(text) => Ok(text),
            MockStepKind::Error(message) => Err(mock_error(message)),
        }
    }
}

fn mock_error(message: impl Into<String>) -> LlmError {
    LlmError::Api {
        provider: "mock".to_string(),
        status: 503,
        message: message.into(),
    }
}

pub mod run;
pub mod state;

use anyhow::{Context, Result};
use docbot_core::Assistant;
use docbot_core::llm::OpenAIClient;
use std::sync::Arc;

use crate::config::CliConfig;

/// Model client from the `[openai]` section. A missing key is reported by
/// the client when it is first used.
pub fn build_model(config: &CliConfig) -> OpenAIClient {
    let openai = &config.openai;
    let mut client = OpenAIClient::new(openai.api_key.clone().unwrap_or_default());
    if let Some(base_url) = &openai.base_url {
        client = client.with_base_url(base_url);
    }
    if let Some(model) = &openai.model {
        client = client.with_model(model);
    }
    client
}

pub async fn open_assistant(config: &CliConfig) -> Result<Assistant> {
    Assistant::open(config.core.clone(), Arc::new(build_model(config)))
        .await
        .context("Failed to open the assistant state")
}

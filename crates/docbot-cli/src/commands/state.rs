//! Offline state commands; none of them contact the chat or the model.

use anyhow::{Result, bail};
use colored::Colorize;
use docbot_core::ReloadMode;
use docbot_core::handler::{knowledge_text, reload_text};

use super::open_assistant;
use crate::config::CliConfig;

pub async fn reload(config: &CliConfig) -> Result<()> {
    let assistant = open_assistant(config).await?;
    let summary = assistant.reload(ReloadMode::Explicit).await?;
    println!("{} {}", "✓".green(), reload_text(&summary));
    Ok(())
}

pub async fn show_kb(config: &CliConfig, preview: Option<usize>) -> Result<()> {
    let preview_chars = preview.unwrap_or(config.core.bot.preview_chars);
    let assistant = open_assistant(config).await?;
    let overview = assistant.knowledge_overview(preview_chars).await;
    println!("{}", knowledge_text(&overview, preview_chars));
    Ok(())
}

pub async fn clear(config: &CliConfig, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to clear all state without --yes");
    }
    let assistant = open_assistant(config).await?;
    assistant.clear_all().await?;
    println!(
        "{} Cleared conversation, corpus, system prompt and history",
        "✓".green()
    );
    Ok(())
}

pub fn print_config(config: &CliConfig) -> Result<()> {
    print!("{}", config.redacted().to_toml()?);
    Ok(())
}

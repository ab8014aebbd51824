use anyhow::{Context, Result, bail};
use docbot_core::MessageHandler;
use docbot_core::channel::TelegramChannel;
use docbot_core::run_message_loop;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::open_assistant;
use crate::config::CliConfig;

/// Connect to Telegram and answer messages until Ctrl-C.
pub async fn run(config: &CliConfig) -> Result<()> {
    if config.telegram.bot_token.trim().is_empty() {
        bail!("Telegram bot token not configured (set TG_BOT_TOKEN or [telegram].bot_token)");
    }
    if config.openai.api_key.is_none() {
        warn!("OPENAI_API_KEY not configured: the bot starts but cannot answer questions");
    }

    let channel = TelegramChannel::new(config.telegram.clone())
        .with_poll_interval(Duration::from_secs(config.core.bot.poll_interval_secs));
    let me = channel
        .test_connection()
        .await
        .context("Failed to reach the Telegram Bot API")?;
    info!(username = ?me.username, "Connected to Telegram");

    let assistant = Arc::new(open_assistant(config).await?);
    info!(
        docs_dir = %config.core.paths.docs_dir.display(),
        "Bot started, send /start in the group for the command guide"
    );

    let channel = Arc::new(channel);
    let handler = Arc::new(MessageHandler::new(assistant, channel.clone()));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    run_message_loop(channel.clone(), handler, shutdown_rx).await?;
    channel.stop_polling();
    Ok(())
}

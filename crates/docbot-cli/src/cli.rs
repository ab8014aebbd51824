use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docbot")]
#[command(version, about = "Docbot - group-chat assistant answering from your documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to ~/.config/docbot/config.toml)
    #[arg(long, global = true, env = "DOCBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the bot and answer messages until interrupted
    Run,

    /// Rebuild the corpus and state without connecting to the chat
    Reload,

    /// Print the loaded documents and a preview
    ShowKb {
        /// Preview length in characters
        #[arg(long)]
        preview: Option<usize>,
    },

    /// Clear conversation, corpus, prompt and history
    Clear {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },

    /// Print the effective configuration with secrets redacted
    Config,
}

mod cli;
mod commands;
mod config;
mod error;
mod logging;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::CliConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply_env();

    let command = cli.command.unwrap_or(Commands::Run);
    if command == Commands::Config {
        return commands::state::print_config(&config);
    }

    let _guard = logging::init(cli.verbose, &CliConfig::log_dir())?;

    match command {
        Commands::Run => commands::run::run(&config).await,
        Commands::Reload => commands::state::reload(&config).await,
        Commands::ShowKb { preview } => commands::state::show_kb(&config, preview).await,
        Commands::Clear { yes } => commands::state::clear(&config, yes).await,
        Commands::Config => commands::state::print_config(&config),
    }
}

use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{:#}", err).to_lowercase();

    if msg.contains("telegram bot token") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Set the token from @BotFather with:");
        eprintln!("  {} export TG_BOT_TOKEN=<token>", "$".dimmed());
    }

    if msg.contains("api key") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Set your model API key with:");
        eprintln!("  {} export OPENAI_API_KEY=<key>", "$".dimmed());
    }

    if msg.contains("config file") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Print the effective configuration with:");
        eprintln!("  {} docbot config", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and try again.");
    }

    std::process::exit(1);
}

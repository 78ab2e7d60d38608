//! Teller CLI
//!
//! Main entry point for the teller command-line tool.
//! Runs the bank customer-support web app and manages its knowledge base.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, CheckCommand, CleanCommand, LearnCommand, SearchCommand, ServeCommand,
    StatsCommand,
};
use std::path::PathBuf;
use teller_core::logging::{init_logging, LoggingOptions};
use teller_core::{config::AppConfig, AppResult};

/// Teller - bank customer-support agent with knowledge base, web search and chat UI
#[derive(Parser, Debug)]
#[command(name = "teller")]
#[command(about = "Bank customer-support agent with a browser chat UI", long_about = None)]
#[command(version)]
struct Cli {
    /// Base directory holding data/, logs/ and prompts/ (default: current directory)
    #[arg(long, global = true, env = "TELLER_HOME")]
    home: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "TELLER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// LLM provider (deepseek, openai, ollama)
    #[arg(short, long, global = true, env = "TELLER_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "TELLER_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web chat server
    Serve(ServeCommand),

    /// Show which features are configured
    Check(CheckCommand),

    /// Add documents to the knowledge base
    Learn(LearnCommand),

    /// Ask the agent one question
    Ask(AskCommand),

    /// Run a web search
    Search(SearchCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),

    /// Remove every document from the knowledge base
    Clean(CleanCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Serve(_) => "serve",
            Commands::Check(_) => "check",
            Commands::Learn(_) => "learn",
            Commands::Ask(_) => "ask",
            Commands::Search(_) => "search",
            Commands::Stats(_) => "stats",
            Commands::Clean(_) => "clean",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from defaults, config file and environment
    let config = AppConfig::load_with(cli.home.clone(), cli.config.clone())?;

    // Apply CLI overrides, then read the key for the final provider
    let mut config = config.with_overrides(
        cli.home,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.llm.resolve_api_key(|key| std::env::var(key).ok());

    config.ensure_dirs()?;

    // Initialize logging with final configuration
    let _log_guard = init_logging(&LoggingOptions {
        level: config.logging.level.clone(),
        no_color: config.no_color,
        file: config.log_file_path(),
        max_files: config.logging.max_files,
    })?;

    tracing::info!("Teller starting");
    tracing::debug!("Base directory: {:?}", config.base_dir);
    tracing::debug!("Provider: {}", config.llm.provider);
    tracing::debug!("Model: {}", config.llm.model);

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Check(cmd) => cmd.execute(&config).await,
        Commands::Learn(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Clean(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["teller", "search", "usd rate", "-n", "3", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.command.name(), "search");
    }

    #[test]
    fn test_parse_learn_paths() {
        let cli = Cli::try_parse_from(["teller", "learn", "docs", "faq.md", "--reset"]).unwrap();
        let Commands::Learn(cmd) = cli.command else {
            panic!("expected learn");
        };
        assert_eq!(cmd.paths, vec![PathBuf::from("docs"), PathBuf::from("faq.md")]);
        assert!(cmd.reset);
    }
}

//! PolicyQA CLI
//!
//! Main entry point for the policyqa command-line tool.
//! Answers questions about insurance and legal policy documents from the
//! document's own clauses, from the terminal or over HTTP.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, QueryCommand, ServeCommand};
use policyqa_core::config::{AppConfig, CliOverrides};
use policyqa_core::logging::{self, LogFormat};
use policyqa_core::AppResult;
use std::path::PathBuf;

/// PolicyQA - grounded question answering over policy documents
#[derive(Parser, Debug)]
#[command(name = "policyqa")]
#[command(about = "Grounded question answering over policy documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "POLICYQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.policyqa/config.yaml)
    #[arg(short, long, global = true, env = "POLICYQA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (ollama, openai, groq)
    #[arg(short, long, global = true, env = "POLICYQA_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "POLICYQA_MODEL")]
    model: Option<String>,

    /// Provider base URL
    #[arg(long, global = true, env = "POLICYQA_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer questions about a document (load, index, answer)
    Ask(AskCommand),

    /// Build the persisted index from a document
    Index(IndexCommand),

    /// Answer questions against the persisted index
    Query(QueryCommand),

    /// Run the HTTP answering service
    Serve(ServeCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, config file and environment
    let config = AppConfig::load(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(CliOverrides {
        provider: cli.provider,
        model: cli.model,
        endpoint: cli.endpoint,
        log_level: cli.log_level,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    config.validate()?;

    tracing::info!("PolicyQA CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.llm.provider);
    tracing::debug!("Model: {}", config.llm.model);

    config.ensure_policyqa_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Index(_) => "index",
        Commands::Query(_) => "query",
        Commands::Serve(_) => "serve",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Serve(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

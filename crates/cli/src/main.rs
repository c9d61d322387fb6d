//! Repobot CLI, the main entry point.
//!
//! Commands:
//! - `serve`          Start the webhook gateway
//! - `actions`        Print the action catalog as JSON
//! - `config`         Print the default configuration
//! - `trigger-issue`  Run the issue task once for an existing issue

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "repobot",
    about = "Repobot: a GitHub assistant that drives repository actions from a language model",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Config file (defaults to ~/.repobot/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the action catalog as JSON
    Actions,

    /// Print the default configuration TOML
    Config,

    /// Run the issue task once for an existing issue
    TriggerIssue {
        /// Repository as owner/name
        #[arg(long)]
        repo: String,

        /// Issue number
        #[arg(long)]
        issue: u64,

        /// Config file (defaults to ~/.repobot/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port, config } => commands::serve::run(port, config).await?,
        Commands::Actions => commands::actions::run()?,
        Commands::Config => commands::config_cmd::run(),
        Commands::TriggerIssue {
            repo,
            issue,
            config,
        } => commands::trigger::run(&repo, issue, config).await?,
    }

    Ok(())
}

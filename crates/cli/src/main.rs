//! AgentFlow CLI, the main entry point.
//!
//! Commands:
//! - `run`      Send one message to an agent
//! - `chat`     Interactive session with an agent
//! - `validate` Check a configuration and print its agent tree
//! - `config`   Print the default configuration

use std::path::PathBuf;
use clap::{Parser, Subcommand};

mod commands;
mod render;
mod setup;

use commands::SessionArgs;

#[derive(Parser)]
#[command(
    name = "agentflow",
    about = "AgentFlow: tool-using agents with approval-gated plans",
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
    /// Send a single message and print the response
    Run {
        /// The message to send
        message: String,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Chat with an agent interactively
    Chat {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Validate a configuration file
    Validate {
        /// Config file (defaults to ~/.agentflow/config.toml)
        #[arg(short, long, env = "AGENTFLOW_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the default configuration
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { message, session } => commands::run::run(message, session).await?,
        Commands::Chat { session } => commands::chat::run(session).await?,
        Commands::Validate { config } => commands::validate::run(config.as_deref()).await?,
        Commands::Config { path } => {
            if path {
                commands::config_cmd::path().await?
            } else {
                commands::config_cmd::show_default().await?
            }
        }
    }

    Ok(())
}

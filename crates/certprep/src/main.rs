//! LF certification practice assistant.
//!
//! Usage:
//! ```bash
//! certprep serve                   # Embed the corpus and serve the MCP tools
//! certprep serve --stdio           # Same, over standard input/output
//! certprep chat                    # Interactive assistant using the tools
//! certprep list                    # List tools on a running server
//! certprep random                  # Random practice question
//! certprep search <query words…>   # Closest stored question
//! ```
//!
//! Settings come from `certprep.toml`, environment variables (a `.env` file
//! is loaded first) and command-line flags, in increasing priority.

use anyhow::{Context, Result};
use certprep_core::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod chat;
mod commands;

#[derive(Debug, Parser)]
#[command(name = "certprep", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the question tools over MCP
    Serve(commands::serve::ServeArgs),

    /// Chat with the study assistant
    Chat(commands::chat::ChatArgs),

    /// List tools on a running server
    List(commands::list::ListArgs),

    /// Fetch a random practice question
    Random(commands::random::RandomArgs),

    /// Find the stored question closest to the given words
    Search(commands::search::SearchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    // Logs go to stderr: stdout carries chat output and, in stdio mode, the
    // MCP protocol itself.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().context("failed to parse log directive")?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    match &cli.command {
        Command::Serve(args) => commands::serve::run(args, &config).await,
        Command::Chat(args) => commands::chat::run(args, &config).await,
        Command::List(args) => commands::list::run(args, &config).await,
        Command::Random(args) => commands::random::run(args, &config).await,
        Command::Search(args) => commands::search::run(args, &config).await,
    }
}

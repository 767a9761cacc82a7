//! CLI command implementations.
//!
//! - **`serve`**: Load the corpus, embed it and serve the question tools over MCP
//! - **`chat`**: Interactive study assistant backed by a chat model and the tools
//! - **`list`**, **`random`**, **`search`**: Call the tool server directly
//!
//! Each command module exports an `*Args` struct implementing `clap::Args`
//! and an async `run` function.

use certprep_core::Config;
use certprep_runtime::QuestionClient;
use clap::Args;

pub mod chat;
pub mod list;
pub mod random;
pub mod search;
pub mod serve;

/// Tool server selection shared by the client commands.
#[derive(Debug, Args)]
pub struct EndpointArgs {
    /// MCP endpoint of the tool server (defaults to `MCP_URL` or
    /// `http://localhost:8000/mcp`).
    #[arg(short, long)]
    pub url: Option<String>,
}

impl EndpointArgs {
    pub fn client(&self, config: &Config) -> QuestionClient {
        QuestionClient::new(self.url.clone().unwrap_or_else(|| config.chat.mcp_url.clone()))
    }
}

/// Prints a tool result as indented JSON.
pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

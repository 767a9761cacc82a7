//! Interactive chat command.

use anyhow::Result;
use certprep_core::Config;
use certprep_runtime::QuestionClient;
use clap::Args;
use console::style;
use tokio::io::BufReader;
use tracing::info;

use crate::chat::{ChatSession, CompletionClient, run_loop};

/// Command-line arguments for the chat subcommand.
///
/// Unset flags fall back to the `[chat]` config section and the
/// `OPENAI_BASE_URL`, `OPENAI_MODEL_NAME` and `MCP_URL` variables.
#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Base URL of the OpenAI-compatible chat API.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Chat model name.
    #[arg(short, long)]
    pub model: Option<String>,

    /// MCP endpoint of the tool server.
    #[arg(long)]
    pub mcp_url: Option<String>,
}

impl ChatArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.chat.base_url.clone_from(base_url);
        }
        if let Some(model) = &self.model {
            config.chat.model.clone_from(model);
        }
        if let Some(mcp_url) = &self.mcp_url {
            config.chat.mcp_url.clone_from(mcp_url);
        }
    }
}

pub async fn run(args: &ChatArgs, config: &Config) -> Result<()> {
    let mut config = config.clone();
    args.apply(&mut config);

    let completion = CompletionClient::from_config(&config.chat);
    let tools = QuestionClient::new(config.chat.mcp_url.clone());

    println!("Using OpenAI API at: {}", completion.endpoint());
    println!("Using MCP at: {}", tools.url());
    info!(model = %completion.model(), "Starting chat session");

    println!(
        "\n{}",
        style("LF Certification Exam Preparation Assistant").bold()
    );
    println!("Type 'quit' or 'exit' to end the conversation");

    let mut session = ChatSession::new(completion, tools);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_loop(&mut session, stdin, &mut stdout).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct ChatArgsCli {
        #[command(flatten)]
        chat: ChatArgs,
    }

    #[test]
    fn test_chat_args_override_config() {
        let cli = ChatArgsCli::try_parse_from([
            "test",
            "--base-url",
            "http://llm:9000/v1",
            "-m",
            "qwen",
        ])
        .expect("args should parse");
        let mut config = Config::default();

        cli.chat.apply(&mut config);

        assert_eq!(config.chat.base_url, "http://llm:9000/v1");
        assert_eq!(config.chat.model, "qwen");
        assert_eq!(config.chat.mcp_url, Config::default().chat.mcp_url);
    }
}

//! List the tools a running server advertises.

use anyhow::{Context, Result};
use certprep_core::Config;
use clap::Args;
use console::style;

use super::EndpointArgs;

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Print the full tool definitions as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub async fn run(args: &ListArgs, config: &Config) -> Result<()> {
    let client = args.endpoint.client(config);
    let tools = client
        .list_tools()
        .await
        .with_context(|| format!("failed to list tools on {}", client.url()))?;

    if args.json {
        return super::print_json(&serde_json::to_value(&tools)?);
    }

    println!("Available tools on server:");
    for tool in &tools {
        let description = tool.description.as_deref().unwrap_or_default();
        println!("  {} {}: {}", style("•").cyan(), style(&tool.name).bold(), description);
    }
    Ok(())
}

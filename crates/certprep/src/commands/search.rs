//! Find the stored question closest to some free text.

use anyhow::{Context, Result};
use certprep_core::Config;
use clap::Args;

use super::EndpointArgs;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Words to search for; joined with spaces.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
}

impl SearchArgs {
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }
}

pub async fn run(args: &SearchArgs, config: &Config) -> Result<()> {
    let query = args.query_text();
    let result = args
        .endpoint
        .client(config)
        .search_question(&query)
        .await
        .with_context(|| format!("failed to search for '{query}'"))?;
    super::print_json(&result)
}

//! Fetch a random practice question.

use anyhow::{Context, Result};
use certprep_core::Config;
use clap::Args;

use super::EndpointArgs;

#[derive(Debug, Args)]
pub struct RandomArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

pub async fn run(args: &RandomArgs, config: &Config) -> Result<()> {
    let result = args
        .endpoint
        .client(config)
        .random_question()
        .await
        .context("failed to fetch a random question")?;
    super::print_json(&result)
}

//! Question tool server command.
//!
//! Loads the corpus, embeds every question, then serves
//! `get_random_question` and `get_question_and_answer` over MCP, either on a
//! streamable HTTP endpoint or on standard input/output.
//!
//! A corpus that cannot be loaded stops startup. An embedding endpoint that is
//! down does not: the server still starts, random questions keep working and
//! searches report that no embeddings are available.

use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use certprep_core::{Config, Corpus, Embedder, IndexReport, QuestionBank};
use certprep_embedding::{EmbeddingGenerator, MemoizedEmbedder};
use certprep_runtime::McpService;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rmcp::{service::ServiceExt, transport::stdio};
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for the serve subcommand.
///
/// Unset flags fall back to the `[server]`, `[corpus]` and `[embedding]`
/// config sections.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (defaults to `127.0.0.1:8000`).
    #[arg(short = 'a', long)]
    pub addr: Option<String>,

    /// HTTP path for the MCP endpoint (defaults to `/mcp`).
    #[arg(long)]
    pub path: Option<String>,

    /// Question corpus file (defaults to `data/cka_qa.json`).
    #[arg(short, long)]
    pub corpus: Option<PathBuf>,

    /// Maximum embedding requests in flight while indexing.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Cache query embeddings by exact text.
    #[arg(long, default_value_t = false)]
    pub memoize: bool,

    /// Run in stdio mode instead of HTTP mode.
    #[arg(long, default_value_t = false)]
    pub stdio: bool,
}

impl ServeArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(addr) = &self.addr {
            config.server.addr.clone_from(addr);
        }
        if let Some(path) = &self.path {
            config.server.path.clone_from(path);
        }
        if let Some(corpus) = &self.corpus {
            config.corpus.path.clone_from(corpus);
        }
        if let Some(concurrency) = self.concurrency {
            config.embedding.concurrency = concurrency;
        }
        if self.memoize {
            config.embedding.memoize = true;
        }
    }
}

/// Runs the tool server until Ctrl+C.
pub async fn run(args: &ServeArgs, config: &Config) -> Result<()> {
    let shutdown = async {
        let _ = signal::ctrl_c().await;
        info!("Received shutdown signal");
    };
    run_with_shutdown(args, config, shutdown).await
}

async fn run_with_shutdown<F>(args: &ServeArgs, config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut config = config.clone();
    args.apply(&mut config);

    let embedder = embedder_from_config(&config);
    let bank = Arc::new(load_bank(&config, embedder, args.stdio).await?);

    if args.stdio {
        return run_stdio(bank).await;
    }

    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("invalid server address: {}", config.server.addr))?;
    let path = normalize_path(&config.server.path);

    let service = McpService::new(bank).streamable_http_service();
    let router = axum::Router::new().nest_service(path.as_str(), service);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind MCP server on {addr}"))?;
    let local_addr = listener.local_addr().unwrap_or(addr);

    info!(address = %local_addr, path = %path, "Starting MCP server");
    println!(
        "{} MCP server running on http://{}{}",
        style("✓").green().bold(),
        local_addr,
        path
    );
    println!("Press Ctrl+C to stop\n");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("mcp server error")?;

    info!("MCP server stopped");
    Ok(())
}

fn embedder_from_config(config: &Config) -> Arc<dyn Embedder> {
    let generator = EmbeddingGenerator::from_config(&config.embedding);
    info!(
        url = %config.embedding.base_url,
        model = %generator.model(),
        memoize = config.embedding.memoize,
        "Using embedding endpoint"
    );
    if config.embedding.memoize {
        Arc::new(MemoizedEmbedder::new(generator))
    } else {
        Arc::new(generator)
    }
}

/// Loads the corpus and embeds it.
///
/// Startup messages go to stderr in stdio mode, where stdout carries the
/// protocol.
async fn load_bank(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    quiet: bool,
) -> Result<QuestionBank> {
    let corpus = Corpus::load(&config.corpus.path)
        .inspect_err(|err| error!(error = %err, "Cannot start without questions"))
        .with_context(|| {
            format!(
                "failed to load questions from {}",
                config.corpus.path.display()
            )
        })?;

    let status = |line: String| {
        if quiet {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    };
    status(format!(
        "{} Loaded {} question(s) from {}",
        style("✓").green().bold(),
        corpus.len(),
        config.corpus.path.display()
    ));

    let pb = ProgressBar::new(corpus.len() as u64);
    if let Ok(progress_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} Embedding questions {bar:30.cyan/blue} {pos}/{len}")
    {
        pb.set_style(progress_style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));

    let (bank, report) = QuestionBank::build_with_progress(
        corpus,
        embedder,
        config.embedding.concurrency,
        || pb.inc(1),
    )
    .await;
    pb.finish_and_clear();

    status(index_summary(&report));
    Ok(bank)
}

fn index_summary(report: &IndexReport) -> String {
    if report.indexed == 0 {
        warn!("No question embeddings were generated; semantic search is disabled");
        return format!(
            "{} No question embeddings generated; search is disabled",
            style("!").yellow().bold()
        );
    }
    let skipped = report.failed + report.rejected;
    if skipped > 0 {
        format!(
            "{} Embedded {}/{} question(s) ({} dimensions, {} skipped)",
            style("!").yellow().bold(),
            report.indexed,
            report.attempted,
            report.dimensions,
            skipped
        )
    } else {
        format!(
            "{} Embedded {} question(s) ({} dimensions)",
            style("✓").green().bold(),
            report.indexed,
            report.dimensions
        )
    }
}

async fn run_stdio(bank: Arc<QuestionBank>) -> Result<()> {
    eprintln!("{} Starting MCP stdio server...", style("→").cyan());

    let running = McpService::new(bank)
        .serve(stdio())
        .await
        .context("failed to start MCP stdio server")?;

    eprintln!("{} MCP stdio server running", style("✓").green().bold());

    let cancel = running.cancellation_token();
    let mut waiting = Box::pin(running.waiting());

    tokio::select! {
        result = &mut waiting => {
            result.context("mcp stdio server exited")?;
        }
        _ = signal::ctrl_c() => {
            cancel.cancel();
            let _ = waiting.await;
        }
    }

    info!("MCP stdio server stopped");
    Ok(())
}

/// Ensures the endpoint path starts with `/`; empty means `/mcp`.
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/mcp".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

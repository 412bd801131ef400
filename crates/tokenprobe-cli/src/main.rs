use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokenprobe_core::config::DEFAULT_MODEL;
use tokenprobe_core::{
    parse_response, BatchRunner, ConversationLoop, LaunchStatus, RecordSink, RunConfig,
    SearchProvider, ToolDispatcher,
};
use tokenprobe_local::input::{read_links, read_reply};
use tokenprobe_local::search::provider_by_name;
use tokenprobe_local::{http_client, CsvFileSink, OpenAiCompatClient};
use tracing::{info, warn};

mod logging;

#[derive(Parser, Debug)]
#[command(name = "tokenprobe", version)]
#[command(about = "Ask a search-enabled chat model whether web3 projects launched a token", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process a links file in chunks and write the results table (CSV).
    Run(RunCmd),
    /// Re-parse a saved model reply into a results table (CSV), offline.
    Parse(ParseCmd),
}

#[derive(clap::Args, Debug)]
struct RunCmd {
    /// Links file (one URL per line; blank lines and #comments ignored).
    #[arg(long, default_value = "links.txt")]
    links: PathBuf,
    /// Output CSV path; rewritten at every checkpoint.
    #[arg(long, default_value = "results.csv")]
    out: PathBuf,
    /// URLs per model request.
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,
    /// Save the table after this many chunks (and always at the end).
    #[arg(long, default_value_t = 5)]
    checkpoint_every: usize,
    /// Max model requests per chunk before giving up on it.
    #[arg(long, default_value_t = 5)]
    max_iterations: usize,
    #[arg(long, env = "TOKENPROBE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    /// Chat endpoint base URL (default: https://api.x.ai).
    #[arg(long, env = "TOKENPROBE_BASE_URL")]
    base_url: Option<String>,
    /// Search backend for the `search_web` tool. Allowed: duckduckgo, brave, tavily
    #[arg(long, env = "TOKENPROBE_SEARCH_PROVIDER", default_value = "duckduckgo")]
    search_provider: String,
    #[arg(long, default_value_t = 20)]
    max_search_results: usize,
    /// Per-search request timeout (clamped to 1s..60s).
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct ParseCmd {
    /// File holding one raw model reply.
    #[arg(long)]
    reply: PathBuf,
    #[arg(long, default_value = "results.csv")]
    out: PathBuf,
}

/// Opt-in `KEY=VALUE` env file (`TOKENPROBE_ENV_FILE`). Never overrides the
/// process environment and never logs values.
fn load_env_file() {
    let Ok(p) = std::env::var("TOKENPROBE_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

async fn run(args: RunCmd) -> Result<()> {
    let cfg = RunConfig {
        model: args.model,
        chunk_size: args.chunk_size,
        checkpoint_every: args.checkpoint_every,
        max_iterations: args.max_iterations,
        max_search_results: args.max_search_results,
        search_timeout_ms: args.timeout_ms,
        ..Default::default()
    };
    cfg.validate()?;

    let urls = read_links(&args.links).context("reading links")?;
    info!(links = %args.links.display(), urls = urls.len(), "loaded links");

    let http = http_client(concat!("tokenprobe/", env!("CARGO_PKG_VERSION")))?;
    let chat = OpenAiCompatClient::from_env(http.clone(), args.base_url)?;
    let provider = provider_by_name(&args.search_provider, http)?;
    info!(
        model = %cfg.model,
        base_url = chat.base_url(),
        provider = provider.name(),
        "configured"
    );

    let dispatcher = ToolDispatcher::new(provider, cfg.max_search_results)
        .with_timeout_ms(cfg.search_timeout_ms);
    let conversation = ConversationLoop::new(Arc::new(chat), dispatcher, &cfg);
    let mut runner = BatchRunner::new(
        conversation,
        CsvFileSink::new(&args.out),
        cfg.checkpoint_every,
    )?;

    let outcome = runner.run(&urls, cfg.chunk_size).await?;
    info!(
        records = outcome.records.len(),
        launched = outcome
            .records
            .iter()
            .filter(|r| r.launch_status() == LaunchStatus::Yes)
            .count(),
        with_ticker = outcome.records.iter().filter(|r| r.token().is_some()).count(),
        checkpoints = outcome.checkpoints,
        "summary"
    );
    for f in &outcome.failures {
        warn!(
            chunk = f.chunk,
            first_url = f.urls.first().map(String::as_str).unwrap_or(""),
            error = %f.error,
            "chunk produced no records"
        );
    }
    println!("{}", runner.sink().path().display());
    Ok(())
}

fn parse(args: ParseCmd) -> Result<()> {
    let text = read_reply(&args.reply).context("reading reply")?;
    let records = parse_response(&text);
    if records.is_empty() {
        warn!(reply = %args.reply.display(), "reply contained no project blocks");
    }
    CsvFileSink::new(&args.out).persist(&records)?;
    info!(records = records.len(), out = %args.out.display(), "table written");
    println!("{}", args.out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let cli = Cli::parse();
    logging::init_tracing(cli.json_logs)?;

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Parse(args) => parse(args),
    }
}

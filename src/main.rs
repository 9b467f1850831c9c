//! flic-ingest: fetch videos into a watch folder and publish everything that lands there.
//!
//! The API token comes from `--token` or FLIC_TOKEN. Other settings come from an optional TOML
//! file (`--config`) with command-line overrides on top.

use anyhow::Context;
use clap::Parser;
use flic_ingest::{Config, DownloadRequest, Orchestrator, wait_for_signal};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "flic-ingest",
    version,
    about = "Watch a folder, upload new videos, and publish them as posts"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory to watch for new videos
    #[arg(long)]
    watch_dir: Option<PathBuf>,

    /// Directory failed videos are moved to
    #[arg(long)]
    quarantine_dir: Option<PathBuf>,

    /// Remote API base URL
    #[arg(long)]
    api_base_url: Option<String>,

    /// Remote API token
    #[arg(long, env = "FLIC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Category new posts are filed under
    #[arg(long)]
    category_id: Option<i64>,

    /// Video URL to download before watching (repeatable)
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// File with one video URL per line ('#' starts a comment)
    #[arg(long)]
    urls_file: Option<PathBuf>,

    /// Never prompt for URLs, even on a terminal
    #[arg(long)]
    no_prompt: bool,

    /// Log filter, e.g. "debug" or "flic_ingest=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(level: Option<&str>) {
    let filter = level
        .and_then(|l| tracing_subscriber::EnvFilter::try_new(l).ok())
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(dir) = &cli.watch_dir {
        config.watch.watch_dir = dir.clone();
    }
    if let Some(dir) = &cli.quarantine_dir {
        config.watch.quarantine_dir = dir.clone();
    }
    if let Some(url) = &cli.api_base_url {
        config.api.base_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.api.token = token.clone();
    }
    if let Some(category) = cli.category_id {
        config.api.category_id = category;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn collect_locators(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut locators = cli.urls.clone();

    if let Some(path) = &cli.urls_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        locators.extend(
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }

    if locators.is_empty() && !cli.no_prompt && std::io::stdin().is_terminal() {
        locators = prompt_for_locators().await?;
    }
    Ok(locators)
}

async fn prompt_for_locators() -> anyhow::Result<Vec<String>> {
    println!("Enter video URLs, one per line (empty line to start watching):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut locators = Vec::new();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        locators.push(line.to_string());
    }
    Ok(locators)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = load_config(&cli)?;
    let locators = collect_locators(&cli).await?;
    let requests = DownloadRequest::batch(&locators);

    let orchestrator = Orchestrator::new(config).context("Failed to start")?;
    let config = orchestrator.config();
    tracing::info!(
        watch_dir = %config.watch.watch_dir.display(),
        quarantine_dir = %config.watch.quarantine_dir.display(),
        downloads = requests.len(),
        "flic-ingest starting"
    );

    orchestrator.run(requests, wait_for_signal()).await?;
    Ok(())
}

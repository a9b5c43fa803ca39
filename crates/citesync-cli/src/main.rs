use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use citesync_core::service::CitationService;
use citesync_core::{ServiceConfig, store};
use citesync_scholar::ScholarFetcher;

mod config_file;

use config_file::{ConfigFile, Settings};

/// Citation synchronization service.
///
/// Keeps citations.csv fresh by periodically scraping Google Scholar for
/// the least-recently-updated entry. Regressions of previously known
/// counts are appended to problems.csv for human review.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding citations.csv and problems.csv
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Minutes between refresh rounds [default: 18]
    #[arg(long)]
    delay_mins: Option<u64>,

    /// Minutes to back off once robot detection fires [default: 1800]
    #[arg(long)]
    blocked_delay_mins: Option<u64>,

    /// Upper bound of the random jitter added to every sleep, in seconds
    /// [default: 2]
    #[arg(long)]
    jitter_secs: Option<u64>,

    /// HTTP timeout per fetch, in seconds [default: 30]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Fraction of the title length a scraped title may differ by
    /// [default: 0.1]
    #[arg(long)]
    tolerance: Option<f32>,

    /// Scholar query endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// TOML file supplying values for flags not passed explicitly
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => config_file::load_from_path(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => ConfigFile::default(),
    };
    let flags = ConfigFile {
        delay_mins: cli.delay_mins,
        blocked_delay_mins: cli.blocked_delay_mins,
        jitter_secs: cli.jitter_secs,
        timeout_secs: cli.timeout_secs,
        tolerance: cli.tolerance,
        endpoint: cli.endpoint,
    };
    let settings = Settings::resolve(flags, file);

    let config = ServiceConfig {
        refresh_delay: Duration::from_secs(settings.delay_mins * 60),
        blocked_delay: Duration::from_secs(settings.blocked_delay_mins * 60),
        jitter: Duration::from_secs(settings.jitter_secs),
        fetch_timeout: Duration::from_secs(settings.timeout_secs),
        ..ServiceConfig::for_dir(&cli.directory)
    };

    // An absent store means "nothing to do yet", not a fatal error
    store::ensure_store(&config.citations_path).with_context(|| {
        format!(
            "cannot create citation store {}",
            config.citations_path.display()
        )
    })?;

    let fetcher = Arc::new(ScholarFetcher::new(settings.endpoint, settings.tolerance));
    let service = CitationService::new(config, fetcher);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            signal_cancel.cancel();
        }
    });

    service.run(cancel).await;
    Ok(())
}

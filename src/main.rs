//! comic-dl main entry point
//!
//! This is the command-line interface for the comic-dl downloader.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comic_dl::config::{load_config, validate_jobs, Config};
use comic_dl::crawler::{HttpTransport, Transport};
use comic_dl::storage::STATE_FILE_NAME;
use comic_dl::{CrawlerRegistry, Engine, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// comic-dl: a resumable web comic downloader
///
/// comic-dl follows the pages of a supported comic or manga site, downloads
/// every image into a directory, and records its progress there so an
/// interrupted download can be resumed.
#[derive(Parser, Debug)]
#[command(name = "comic-dl")]
#[command(version)]
#[command(about = "A resumable web comic downloader", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start downloading a comic from its first page
    Download {
        /// URL of the page to start from
        url: Url,

        /// Directory to download into
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Number of concurrent workers
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Continue earlier downloads
    Resume {
        /// Download directories, or their state files
        #[arg(required = true)]
        targets: Vec<PathBuf>,

        /// Number of concurrent workers
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&config.http).context("Failed to build HTTP client")?);
    let registry = CrawlerRegistry::builtin();
    tracing::debug!("Available crawlers: {}", registry.names().join(", "));

    match cli.command {
        Command::Download {
            url,
            directory,
            jobs,
        } => {
            let jobs = worker_count(&config, jobs)?;
            handle_download(&config, &registry, transport, url, directory, jobs).await
        }
        Command::Resume { targets, jobs } => {
            let jobs = worker_count(&config, jobs)?;
            handle_resume(&config, &registry, transport, &targets, jobs).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("comic_dl=info,warn"),
            1 => EnvFilter::new("comic_dl=debug,info"),
            2 => EnvFilter::new("comic_dl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Worker count from the command line, falling back to the configuration
fn worker_count(config: &Config, jobs: Option<usize>) -> anyhow::Result<usize> {
    let jobs = jobs.unwrap_or(config.download.jobs);
    validate_jobs(jobs)?;
    Ok(jobs)
}

/// Resolves when the user presses Ctrl-C
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Handles the download command
async fn handle_download(
    config: &Config,
    registry: &CrawlerRegistry,
    transport: Arc<dyn Transport>,
    url: Url,
    directory: PathBuf,
    jobs: usize,
) -> anyhow::Result<()> {
    let engine = Engine::start(
        registry,
        url.clone(),
        directory,
        transport,
        config.download.retry_policy(),
    )
    .with_context(|| format!("Cannot download {}", url))?;

    let summary = engine.run_until(jobs, ctrl_c()).await?;
    report(engine.directory(), &summary);
    Ok(())
}

/// Handles the resume command
///
/// Every target is attempted; a failing one does not stop the others.
async fn handle_resume(
    config: &Config,
    registry: &CrawlerRegistry,
    transport: Arc<dyn Transport>,
    targets: &[PathBuf],
    jobs: usize,
) -> anyhow::Result<()> {
    let mut failed = 0;

    for target in targets {
        let directory = run_directory(target);
        let result = match Engine::load(
            registry,
            directory.clone(),
            transport.clone(),
            config.download.retry_policy(),
        ) {
            Ok(engine) => engine.run_until(jobs, ctrl_c()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => {
                report(&directory, &summary);
                if summary.interrupted {
                    break;
                }
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Cannot resume {}: {}", directory.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} targets could not be resumed", failed, targets.len());
    }
    Ok(())
}

/// Accepts either a run directory or the state file inside it
fn run_directory(target: &Path) -> PathBuf {
    if target.file_name().is_some_and(|name| name == STATE_FILE_NAME) && !target.is_dir() {
        target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        target.to_path_buf()
    }
}

fn report(directory: &Path, summary: &RunSummary) {
    if summary.interrupted {
        tracing::warn!(
            "Interrupted; run 'comic-dl resume {}' to continue",
            directory.display()
        );
    } else {
        tracing::info!(
            "Finished {} ({} files downloaded)",
            directory.display(),
            summary.stats.files_downloaded
        );
    }
}

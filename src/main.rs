//! Tidemark main entry point
//!
//! Command-line interface for the incremental board-listing crawler.

use anyhow::bail;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tidemark::config::load_config_with_hash;
use tidemark::crawler::{run_all, RunLimits, RunMode};
use tidemark::storage::{SqliteStore, Store};
use tracing_subscriber::EnvFilter;

/// Tidemark: an incremental board-listing crawler
///
/// Walks paginated listings, fetches the detail of items it has not seen
/// before, and persists each item exactly once. A per-channel watermark
/// makes runs resumable and lets incremental runs stop early once the
/// listing is known territory.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version)]
#[command(about = "Incremental board-listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl only this channel id (default: all configured channels)
    #[arg(long)]
    channel: Option<String>,

    /// Traversal mode
    #[arg(long, value_enum, default_value = "incremental")]
    mode: CrawlMode,

    /// Override the configured page limit for this run
    #[arg(long)]
    max_pages: Option<u32>,

    /// Override the configured new-item budget for this run
    #[arg(long)]
    max_new: Option<u32>,

    /// Incremental mode: stop after this many consecutive known items
    #[arg(long)]
    streak_break: Option<u32>,

    /// Backfill mode: stop at the first item at or below this id
    #[arg(long)]
    floor: Option<i64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show per-channel statistics from the database and exit
    #[arg(long)]
    stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CrawlMode {
    /// Collect new items only, stopping early on known territory
    Incremental,

    /// Walk backward through history without early termination
    Backfill,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        Err(error) => {
            tracing::error!("Failed to load configuration: {}", error);
            return Err(error.into());
        }
    };

    if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidemark=info,warn"),
            1 => EnvFilter::new("tidemark=debug,info"),
            2 => EnvFilter::new("tidemark=trace,debug"),
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

/// Handles the --stats mode: shows per-channel statistics and exits
fn handle_stats(config: &tidemark::Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(Path::new(&config.output.database_path))?;

    println!("Database: {}\n", config.output.database_path);

    let states = store.channel_states()?;
    if states.is_empty() {
        println!("No channels crawled yet.");
        return Ok(());
    }

    for state in states {
        let items = store.count_items(&state.channel_id)?;
        println!(
            "{}: {} items, watermark {}, updated {}",
            state.channel_id, items, state.watermark, state.updated_at
        );
    }
    println!("\nTotal items: {}", store.count_total_items()?);

    Ok(())
}

/// Resolves CLI overrides into a run policy and starts the crawl
async fn handle_crawl(config: &tidemark::Config, cli: &Cli) -> anyhow::Result<()> {
    let mode = match cli.mode {
        CrawlMode::Incremental => {
            if cli.floor.is_some() {
                bail!("--floor only applies to --mode backfill");
            }
            RunMode::Incremental {
                existing_streak_break: cli
                    .streak_break
                    .unwrap_or(config.run.existing_streak_break),
            }
        }
        CrawlMode::Backfill => {
            if cli.streak_break.is_some() {
                bail!("--streak-break only applies to --mode incremental");
            }
            RunMode::Backfill {
                floor_external_id: cli.floor,
            }
        }
    };

    let limits = RunLimits {
        max_pages: cli.max_pages.unwrap_or(config.run.max_pages),
        max_new_items: cli.max_new.unwrap_or(config.run.max_new_items),
    };

    let reports = run_all(config, mode, limits, cli.channel.as_deref()).await?;

    let total_new: u32 = reports.iter().map(|report| report.new_items).sum();
    let total_failures: u32 = reports
        .iter()
        .map(|report| report.detail_failures + report.page_failures)
        .sum();
    tracing::info!(
        channels = reports.len(),
        new_items = total_new,
        failures = total_failures,
        "all runs finished"
    );

    Ok(())
}

//! Crawler module: fetching, traversal, and the incremental control loop
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded, jittered retries
//! - Lazy page-by-page listing traversal
//! - The per-channel incremental controller and its stop policies
//! - Entry points that wire one or all channels to storage and extraction

mod controller;
mod fetcher;
mod traversal;

pub use controller::{IncrementalController, RunLimits, RunMode, RunOutcome, RunReport};
pub use fetcher::{build_http_client, FetchFailure, RetryingFetcher};
pub use traversal::{ListTraversal, PageError, PageOutcome};

use crate::config::{ChannelConfig, Config};
use crate::extract::BoardExtract;
use crate::storage::SqliteStore;
use crate::{ConfigError, CrawlError};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Runs one crawl for a single channel
pub async fn run_channel(
    config: &Config,
    channel: &ChannelConfig,
    mode: RunMode,
    limits: RunLimits,
    cancel: CancellationToken,
) -> Result<RunReport, CrawlError> {
    let client = build_http_client(&config.fetch)?;
    let fetcher = RetryingFetcher::new(client, &config.fetch);
    let extractor = BoardExtract::new(list_base_url(&channel.list_url)?);
    let mut store = SqliteStore::open(Path::new(&config.output.database_path))?;

    let controller = IncrementalController::new(
        channel,
        mode,
        limits,
        &config.politeness,
        config.run.detail_concurrency,
        &fetcher,
        &extractor,
        &mut store,
        cancel,
    );

    let report = controller.run().await?;
    tracing::info!(
        channel = %report.channel_id,
        outcome = ?report.outcome,
        new_items = report.new_items,
        detail_failures = report.detail_failures,
        page_failures = report.page_failures,
        watermark = report.watermark_after,
        "run finished"
    );
    Ok(report)
}

/// Runs all configured channels (or one selected by id) in parallel
///
/// Channels share nothing but the database file; each task gets its own
/// store connection and the same cancellation token, so Ctrl-C lands every
/// channel on its next checkpoint.
pub async fn run_all(
    config: &Config,
    mode: RunMode,
    limits: RunLimits,
    only_channel: Option<&str>,
) -> Result<Vec<RunReport>, CrawlError> {
    let channels: Vec<ChannelConfig> = match only_channel {
        Some(id) => {
            let selected: Vec<_> = config
                .channel
                .iter()
                .filter(|channel| channel.id == id)
                .cloned()
                .collect();
            if selected.is_empty() {
                return Err(ConfigError::Validation(format!("unknown channel '{id}'")).into());
            }
            selected
        }
        None => config.channel.clone(),
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {error:?}");
                return;
            }
            tracing::info!("Shutdown requested, stopping at the next checkpoint");
            cancel.cancel();
        });
    }

    let mut handles = Vec::new();
    for channel in channels {
        let config = config.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            run_channel(&config, &channel, mode, limits, cancel).await
        }));
    }

    let mut reports = Vec::new();
    for handle in handles {
        reports.push(handle.await??);
    }
    Ok(reports)
}

/// Resolves the base URL used to absolutize links found on a channel's pages
fn list_base_url(template: &str) -> Result<Url, CrawlError> {
    Ok(Url::parse(&template.replace("{page}", "1"))?)
}

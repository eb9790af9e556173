//! Incremental crawl controller
//!
//! This module contains the per-channel state machine that decides, item by
//! item, whether to fetch detail or skip, when to stop, and when the
//! watermark may advance. The rules it enforces:
//! - The watermark moves only at a checkpoint, after the items it covers are
//!   durably stored or were skipped by an explicit policy decision.
//! - A failed detail fetch caps the checkpoint below that item, so the item
//!   is re-selected on the next run.
//! - A storage failure aborts the run with no checkpoint at all.

use crate::config::{ChannelConfig, PolitenessConfig};
use crate::crawler::fetcher::RetryingFetcher;
use crate::crawler::traversal::{ListTraversal, PageError, PageOutcome};
use crate::extract::{Extract, ItemSummary};
use crate::storage::{ItemRecord, Store};
use crate::CrawlError;
use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Traversal policy for a run
///
/// Each mode owns its stop rule, so the rules read in one place instead of
/// being spread across flag combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Collect new items only; stop once a contiguous streak of
    /// already-known items shows the rest of the listing is covered
    Incremental { existing_streak_break: u32 },

    /// Walk backward through history, reprocessing known items, bounded
    /// only by the floor id (when set) and the page limit
    Backfill { floor_external_id: Option<i64> },
}

/// Hard bounds on a single run
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_pages: u32,
    pub max_new_items: u32,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Incremental streak rule fired: the rest of the listing is known
    StoppedEarly,

    /// Ran out of pages: an empty page, the page limit, or a dead list page
    ExhaustedPages,

    /// The per-run budget of new items was spent
    MaxNewReached,

    /// Backfill reached its floor id
    FloorReached,

    /// Cancelled from outside; checkpointed like an early stop
    Cancelled,
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub channel_id: String,
    pub outcome: RunOutcome,
    pub new_items: u32,
    pub detail_failures: u32,
    pub page_failures: u32,
    pub watermark_before: i64,
    pub watermark_after: i64,
}

#[derive(Debug, Default)]
struct FlushStats {
    persisted: u32,
    failed: u32,
    lowest_failed: Option<i64>,
}

enum Pause {
    Item,
    Page,
}

/// Drives one crawl run for one channel
pub struct IncrementalController<'a, E: Extract, S: Store> {
    channel: &'a ChannelConfig,
    mode: RunMode,
    limits: RunLimits,
    politeness: &'a PolitenessConfig,
    detail_concurrency: usize,
    fetcher: &'a RetryingFetcher,
    extractor: &'a E,
    store: &'a mut S,
    cancel: CancellationToken,
}

impl<'a, E: Extract, S: Store> IncrementalController<'a, E, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: &'a ChannelConfig,
        mode: RunMode,
        limits: RunLimits,
        politeness: &'a PolitenessConfig,
        detail_concurrency: usize,
        fetcher: &'a RetryingFetcher,
        extractor: &'a E,
        store: &'a mut S,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            channel,
            mode,
            limits,
            politeness,
            detail_concurrency: detail_concurrency.max(1),
            fetcher,
            extractor,
            store,
            cancel,
        }
    }

    /// Runs the crawl to one of its terminal outcomes
    pub async fn run(mut self) -> Result<RunReport, CrawlError> {
        let watermark = self.store.watermark(&self.channel.id)?;
        tracing::info!(
            channel = %self.channel.id,
            watermark,
            mode = ?self.mode,
            "starting run"
        );

        let mut observed_max = watermark;
        let mut new_items = 0u32;
        let mut detail_failures = 0u32;
        let mut page_failures = 0u32;
        let mut consecutive_existing = 0u32;
        let mut lowest_failed: Option<i64> = None;

        let mut traversal = ListTraversal::new(self.fetcher, self.extractor, &self.channel.list_url);

        let outcome = 'run: loop {
            if self.cancel.is_cancelled() {
                break RunOutcome::Cancelled;
            }
            if traversal.pages_consumed() >= self.limits.max_pages {
                break RunOutcome::ExhaustedPages;
            }

            let mut items = match traversal.next_page().await {
                PageOutcome::Failure {
                    index,
                    error: PageError::Fetch(failure),
                } => {
                    tracing::warn!(
                        channel = %self.channel.id,
                        page = index,
                        %failure,
                        "list page fetch exhausted, ending run at current checkpoint"
                    );
                    page_failures += 1;
                    break RunOutcome::ExhaustedPages;
                }
                PageOutcome::Failure {
                    index,
                    error: PageError::Extract(error),
                } => {
                    tracing::warn!(
                        channel = %self.channel.id,
                        page = index,
                        %error,
                        "list page extraction failed, skipping page"
                    );
                    page_failures += 1;
                    if !self.pause(Pause::Page).await {
                        break RunOutcome::Cancelled;
                    }
                    continue;
                }
                PageOutcome::Page { index, items } => {
                    if items.is_empty() {
                        tracing::info!(channel = %self.channel.id, page = index, "listing exhausted");
                        break RunOutcome::ExhaustedPages;
                    }
                    items
                }
            };

            // The source usually lists newest first but does not promise it;
            // the streak and floor rules need descending order to be correct.
            items.sort_by(|a, b| b.external_id.cmp(&a.external_id));

            let mut batch: Vec<ItemSummary> = Vec::new();
            let mut stop: Option<RunOutcome> = None;

            for item in items {
                observed_max = observed_max.max(item.external_id);

                match self.mode {
                    RunMode::Incremental {
                        existing_streak_break,
                    } => {
                        if item.external_id <= watermark {
                            consecutive_existing += 1;
                            if consecutive_existing >= existing_streak_break {
                                tracing::info!(
                                    channel = %self.channel.id,
                                    streak = consecutive_existing,
                                    "hit existing-item streak, stopping early"
                                );
                                stop = Some(RunOutcome::StoppedEarly);
                                break;
                            }
                            continue;
                        }
                        // A newer item interrupts the streak: listings are
                        // monotonic by recency, so older entries seen before
                        // it say nothing about what still lies ahead.
                        consecutive_existing = 0;
                    }
                    RunMode::Backfill { floor_external_id } => {
                        if floor_external_id.is_some_and(|floor| item.external_id <= floor) {
                            tracing::info!(
                                channel = %self.channel.id,
                                external_id = item.external_id,
                                "reached backfill floor"
                            );
                            stop = Some(RunOutcome::FloorReached);
                            break;
                        }
                    }
                }

                batch.push(item);

                // Cap each flush at the remaining new-item budget so the
                // run can never persist past max_new_items.
                let remaining = self.limits.max_new_items.saturating_sub(new_items) as usize;
                if batch.len() >= self.detail_concurrency.min(remaining.max(1)) {
                    let stats = self.flush(&mut batch).await?;
                    new_items += stats.persisted;
                    detail_failures += stats.failed;
                    lowest_failed = min_option(lowest_failed, stats.lowest_failed);

                    if new_items >= self.limits.max_new_items {
                        stop = Some(RunOutcome::MaxNewReached);
                        break;
                    }
                    if !self.pause(Pause::Item).await {
                        stop = Some(RunOutcome::Cancelled);
                        break;
                    }
                }
            }

            if !batch.is_empty() {
                let stats = self.flush(&mut batch).await?;
                new_items += stats.persisted;
                detail_failures += stats.failed;
                lowest_failed = min_option(lowest_failed, stats.lowest_failed);

                if stop.is_none() && new_items >= self.limits.max_new_items {
                    stop = Some(RunOutcome::MaxNewReached);
                }
            }

            if let Some(outcome) = stop {
                break 'run outcome;
            }
            if !self.pause(Pause::Page).await {
                break RunOutcome::Cancelled;
            }
        };

        // Checkpoint: the only place the watermark moves. A failed detail
        // fetch caps the value below that item so it stays eligible.
        let mut checkpoint = observed_max;
        if let Some(failed) = lowest_failed {
            checkpoint = checkpoint.min(failed - 1);
        }
        let checkpoint = checkpoint.max(watermark);
        self.store
            .set_watermark(&self.channel.id, checkpoint, Utc::now())?;

        Ok(RunReport {
            channel_id: self.channel.id.clone(),
            outcome,
            new_items,
            detail_failures,
            page_failures,
            watermark_before: watermark,
            watermark_after: checkpoint,
        })
    }

    /// Fetches detail for the batched items concurrently, then persists them
    ///
    /// Fetches run in parallel; upserts stay sequential on the single store
    /// handle. An item whose detail page cannot be extracted is persisted
    /// from its summary alone; an item whose fetch exhausted retries is not
    /// persisted at all.
    async fn flush(&mut self, batch: &mut Vec<ItemSummary>) -> Result<FlushStats, CrawlError> {
        let fetcher = self.fetcher;
        let bodies =
            futures::future::join_all(batch.iter().map(|item| fetcher.fetch(&item.detail_url)))
                .await;

        let now = Utc::now();
        let mut stats = FlushStats::default();

        for (summary, body) in batch.drain(..).zip(bodies) {
            match body {
                Ok(body) => {
                    let detail = match self.extractor.parse_detail(&body) {
                        Ok(detail) => Some(detail),
                        Err(error) => {
                            tracing::warn!(
                                channel = %self.channel.id,
                                external_id = summary.external_id,
                                %error,
                                "detail extraction failed, keeping summary fields"
                            );
                            None
                        }
                    };

                    let record = ItemRecord::merged(&self.channel.id, &summary, detail.as_ref(), now);
                    self.store.upsert_item(&record)?;
                    stats.persisted += 1;
                }
                Err(failure) => {
                    tracing::warn!(
                        channel = %self.channel.id,
                        external_id = summary.external_id,
                        %failure,
                        "detail fetch exhausted, item stays eligible for the next run"
                    );
                    stats.failed += 1;
                    stats.lowest_failed = min_option(stats.lowest_failed, Some(summary.external_id));
                }
            }
        }

        Ok(stats)
    }

    /// Sleeps for a politeness delay; returns false when cancelled
    async fn pause(&self, kind: Pause) -> bool {
        let (min, max) = match kind {
            Pause::Item => (self.politeness.min_delay_ms, self.politeness.max_delay_ms),
            Pause::Page => (
                self.politeness.min_delay_ms + self.politeness.page_extra_ms,
                self.politeness.max_delay_ms + self.politeness.page_extra_ms,
            ),
        };
        let delay = Duration::from_millis(rand::thread_rng().gen_range(min..=max));

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

fn min_option(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (value, None) | (None, value) => value,
    }
}

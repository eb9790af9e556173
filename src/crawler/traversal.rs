//! Lazy page-by-page listing traversal
//!
//! The traversal is pull-based: nothing is fetched until the consumer asks
//! for the next page, so a caller that stops early never costs the source a
//! wasted request. Failures are yielded as values rather than raised;
//! whether a bad page ends the run or is skipped is the caller's policy.

use crate::crawler::fetcher::{FetchFailure, RetryingFetcher};
use crate::extract::{Extract, ExtractError, ItemSummary};
use thiserror::Error;

/// Why a page could not be produced
#[derive(Debug, Error)]
pub enum PageError {
    #[error("fetch exhausted: {0}")]
    Fetch(FetchFailure),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
}

/// One step of the traversal: a page of item summaries, or a failure
#[derive(Debug)]
pub enum PageOutcome {
    Page { index: u32, items: Vec<ItemSummary> },
    Failure { index: u32, error: PageError },
}

/// Walks a channel's listing in request order, starting at page 1
///
/// Items are returned in the order the source presents them; any ordering
/// the consumer needs is its own normalization step.
pub struct ListTraversal<'a, E: Extract> {
    fetcher: &'a RetryingFetcher,
    extractor: &'a E,
    url_template: &'a str,
    next_index: u32,
}

impl<'a, E: Extract> ListTraversal<'a, E> {
    pub fn new(fetcher: &'a RetryingFetcher, extractor: &'a E, url_template: &'a str) -> Self {
        Self {
            fetcher,
            extractor,
            url_template,
            next_index: 1,
        }
    }

    /// Number of pages fetched so far
    pub fn pages_consumed(&self) -> u32 {
        self.next_index - 1
    }

    /// Builds the URL for a page index from the channel's template
    pub fn page_url(&self, index: u32) -> String {
        self.url_template.replace("{page}", &index.to_string())
    }

    /// Fetches and extracts the next page
    pub async fn next_page(&mut self) -> PageOutcome {
        let index = self.next_index;
        self.next_index += 1;

        let url = self.page_url(index);
        tracing::debug!(page = index, url = %url, "fetching list page");

        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(failure) => {
                return PageOutcome::Failure {
                    index,
                    error: PageError::Fetch(failure),
                }
            }
        };

        match self.extractor.parse_list(&body) {
            Ok(items) => {
                tracing::debug!(page = index, items = items.len(), "list page extracted");
                PageOutcome::Page { index, items }
            }
            Err(error) => PageOutcome::Failure {
                index,
                error: PageError::Extract(error),
            },
        }
    }
}

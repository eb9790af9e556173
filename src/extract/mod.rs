//! Extraction module for turning raw page bodies into structured items
//!
//! Extraction is deliberately pure: no I/O, no global state. The [`Extract`]
//! trait is the seam between the crawl loop and the page-shape heuristics,
//! so parsers can be exercised against captured fixture pages without a
//! network in sight.

mod detail;
mod list;
mod time;

pub use detail::BoardExtract;
pub use time::{parse_full_timestamp, parse_listing_timestamp};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors produced while extracting structure from a page body
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed page: {0}")]
    Malformed(String),

    #[error("invalid selector: {0}")]
    Selector(String),
}

/// Pure extraction interface over raw page bodies
pub trait Extract {
    /// Parses a list page into item summaries, in the order the source
    /// presents them
    fn parse_list(&self, body: &str) -> Result<Vec<ItemSummary>, ExtractError>;

    /// Parses a detail page into a single item detail record
    fn parse_detail(&self, body: &str) -> Result<ItemDetail, ExtractError>;
}

/// Counter values shown next to an item (all optional; listings and detail
/// pages expose different subsets)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub views: Option<i64>,
    pub upvotes: Option<i64>,
    pub downvotes: Option<i64>,
    pub comments: Option<i64>,
}

/// One row of a list page
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSummary {
    /// Source-assigned id; the natural ordering key within a channel
    pub external_id: i64,

    /// Absolute URL of the full record
    pub detail_url: String,

    pub title: String,
    pub author_label: Option<String>,

    /// Raw timestamp text as shown on the listing; normalized later
    pub timestamp_text: Option<String>,

    pub counters: Counters,
}

/// The full record extracted from a detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDetail {
    pub title: Option<String>,
    pub author: Option<String>,
    pub author_handle: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub counters: Counters,
    pub body_text: Option<String>,
    pub media_refs: Vec<String>,
}

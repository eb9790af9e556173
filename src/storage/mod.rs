//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Idempotent item persistence (merge on re-crawl, never erase detail)
//! - Per-channel watermark tracking for resumption

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{Store, StorageError, StorageResult};

use crate::extract::{ItemDetail, ItemSummary};
use chrono::{DateTime, Utc};

/// A fully merged item, ready to persist
///
/// Detail-page values take precedence over list-page values; whatever the
/// detail page did not provide falls back to the summary captured from the
/// listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub channel_id: String,
    pub external_id: i64,
    pub detail_url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub author_handle: Option<String>,
    pub created_at: String,
    pub views: Option<i64>,
    pub upvotes: Option<i64>,
    pub downvotes: Option<i64>,
    pub comments: Option<i64>,
    pub body_text: Option<String>,
    pub media_refs: Vec<String>,
    pub crawled_at: String,
}

impl ItemRecord {
    /// Builds a record by merging a list-page summary with an optional
    /// detail-page result.
    ///
    /// `created_at` falls back from the detail page, to the listing's
    /// timestamp text, to `now`.
    pub fn merged(
        channel_id: &str,
        summary: &ItemSummary,
        detail: Option<&ItemDetail>,
        now: DateTime<Utc>,
    ) -> Self {
        let created_at = detail
            .and_then(|d| d.created_at)
            .or_else(|| {
                summary
                    .timestamp_text
                    .as_deref()
                    .and_then(|text| crate::extract::parse_listing_timestamp(text, now))
            })
            .unwrap_or(now);

        Self {
            channel_id: channel_id.to_string(),
            external_id: summary.external_id,
            detail_url: summary.detail_url.clone(),
            title: detail
                .and_then(|d| d.title.clone())
                .or_else(|| Some(summary.title.clone())),
            author: detail
                .and_then(|d| d.author.clone())
                .or_else(|| summary.author_label.clone()),
            author_handle: detail.and_then(|d| d.author_handle.clone()),
            created_at: created_at.to_rfc3339(),
            views: detail.and_then(|d| d.counters.views).or(summary.counters.views),
            upvotes: detail
                .and_then(|d| d.counters.upvotes)
                .or(summary.counters.upvotes),
            downvotes: detail.and_then(|d| d.counters.downvotes),
            comments: detail.and_then(|d| d.counters.comments),
            body_text: detail.and_then(|d| d.body_text.clone()),
            media_refs: detail.map(|d| d.media_refs.clone()).unwrap_or_default(),
            crawled_at: now.to_rfc3339(),
        }
    }
}

/// One watermark row per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub channel_id: String,
    pub watermark: i64,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Counters;

    fn summary() -> ItemSummary {
        ItemSummary {
            external_id: 42,
            detail_url: "https://example.com/board/view/?no=42".to_string(),
            title: "List title".to_string(),
            author_label: Some("lister".to_string()),
            timestamp_text: Some("2026.08.05 12:00".to_string()),
            counters: Counters {
                views: Some(10),
                upvotes: Some(2),
                ..Counters::default()
            },
        }
    }

    #[test]
    fn test_merged_prefers_detail_fields() {
        let detail = ItemDetail {
            title: Some("Detail title".to_string()),
            author: Some("poster".to_string()),
            author_handle: Some("10.0.0.1".to_string()),
            created_at: None,
            counters: Counters {
                views: Some(99),
                ..Counters::default()
            },
            body_text: Some("body".to_string()),
            media_refs: vec!["https://example.com/a.png".to_string()],
        };

        let record = ItemRecord::merged("alpha", &summary(), Some(&detail), Utc::now());
        assert_eq!(record.title.as_deref(), Some("Detail title"));
        assert_eq!(record.author.as_deref(), Some("poster"));
        assert_eq!(record.views, Some(99));
        // Detail had no upvote count, so the listing's value survives
        assert_eq!(record.upvotes, Some(2));
        assert_eq!(record.media_refs.len(), 1);
    }

    #[test]
    fn test_merged_without_detail_keeps_summary() {
        let record = ItemRecord::merged("alpha", &summary(), None, Utc::now());
        assert_eq!(record.title.as_deref(), Some("List title"));
        assert_eq!(record.author.as_deref(), Some("lister"));
        assert_eq!(record.views, Some(10));
        assert!(record.body_text.is_none());
        assert!(record.media_refs.is_empty());
        // The listing timestamp is parsed rather than defaulting to now
        assert!(record.created_at.starts_with("2026-08-05T12:00"));
    }
}

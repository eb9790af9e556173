//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{ChannelState, ItemRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Upserts must be safe under concurrent calls for distinct
/// `(channel_id, external_id)` keys; callers take no lock of their own.
pub trait Store {
    // ===== Items =====

    /// Inserts an item, or merges it into the existing row
    ///
    /// Re-applying identical or supplementary data produces no duplicate row
    /// and only fills previously-absent fields; it never erases detail that
    /// an earlier crawl stored. A record whose `detail_url` already exists
    /// under a different key is dropped silently.
    fn upsert_item(&mut self, item: &ItemRecord) -> StorageResult<()>;

    /// Looks up a single item by its unique key
    fn get_item(&self, channel_id: &str, external_id: i64) -> StorageResult<Option<ItemRecord>>;

    /// Counts the items stored for one channel
    fn count_items(&self, channel_id: &str) -> StorageResult<u64>;

    /// Counts all items across channels
    fn count_total_items(&self) -> StorageResult<u64>;

    // ===== Watermarks =====

    /// Returns the watermark for a channel, 0 when the channel is unknown
    fn watermark(&self, channel_id: &str) -> StorageResult<i64>;

    /// Advances the watermark for a channel
    ///
    /// Atomic with respect to concurrent reads, and guarded so the stored
    /// value can never move backward.
    fn set_watermark(
        &mut self,
        channel_id: &str,
        value: i64,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Returns every channel's watermark row
    fn channel_states(&self) -> StorageResult<Vec<ChannelState>>;
}

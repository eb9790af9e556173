//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::{ChannelState, ItemRecord};
use crate::CrawlError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a database at the given path
    pub fn open(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }

    fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemRecord> {
        let media_json: String = row.get(12)?;
        Ok(ItemRecord {
            channel_id: row.get(0)?,
            external_id: row.get(1)?,
            detail_url: row.get(2)?,
            title: row.get(3)?,
            author: row.get(4)?,
            author_handle: row.get(5)?,
            created_at: row.get(6)?,
            views: row.get(7)?,
            upvotes: row.get(8)?,
            downvotes: row.get(9)?,
            comments: row.get(10)?,
            body_text: row.get(11)?,
            media_refs: serde_json::from_str(&media_json).unwrap_or_default(),
            crawled_at: row.get(13)?,
        })
    }
}

const ITEM_COLUMNS: &str = "channel_id, external_id, detail_url, title, author, author_handle,
     created_at, views, upvotes, downvotes, comments, body_text, media_refs, crawled_at";

impl Store for SqliteStore {
    fn upsert_item(&mut self, item: &ItemRecord) -> StorageResult<()> {
        let media_json = serde_json::to_string(&item.media_refs)?;

        // The URL is the secondary identity: a row that already claims it
        // under a different key keeps it, and the incoming record is dropped.
        let claimed: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT channel_id, external_id FROM items WHERE detail_url = ?1",
                params![item.detail_url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((channel_id, external_id)) = claimed {
            if channel_id != item.channel_id || external_id != item.external_id {
                return Ok(());
            }
        }

        self.conn.execute(
            "INSERT INTO items (channel_id, external_id, detail_url, title, author, author_handle,
                 created_at, views, upvotes, downvotes, comments, body_text, media_refs, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(channel_id, external_id) DO UPDATE SET
                 title = COALESCE(title, excluded.title),
                 author = COALESCE(author, excluded.author),
                 author_handle = COALESCE(author_handle, excluded.author_handle),
                 views = COALESCE(views, excluded.views),
                 upvotes = COALESCE(upvotes, excluded.upvotes),
                 downvotes = COALESCE(downvotes, excluded.downvotes),
                 comments = COALESCE(comments, excluded.comments),
                 body_text = COALESCE(body_text, excluded.body_text),
                 media_refs = CASE WHEN media_refs = '[]'
                     THEN excluded.media_refs ELSE media_refs END",
            params![
                item.channel_id,
                item.external_id,
                item.detail_url,
                item.title,
                item.author,
                item.author_handle,
                item.created_at,
                item.views,
                item.upvotes,
                item.downvotes,
                item.comments,
                item.body_text,
                media_json,
                item.crawled_at,
            ],
        )?;
        Ok(())
    }

    fn get_item(&self, channel_id: &str, external_id: i64) -> StorageResult<Option<ItemRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE channel_id = ?1 AND external_id = ?2"
        ))?;

        let item = stmt
            .query_row(params![channel_id, external_id], Self::row_to_item)
            .optional()?;

        Ok(item)
    }

    fn count_items(&self, channel_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE channel_id = ?1",
            params![channel_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn watermark(&self, channel_id: &str) -> StorageResult<i64> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT watermark FROM crawl_state WHERE channel_id = ?1",
                params![channel_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.unwrap_or(0))
    }

    fn set_watermark(
        &mut self,
        channel_id: &str,
        value: i64,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO crawl_state (channel_id, watermark, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(channel_id) DO UPDATE SET
                 watermark = MAX(watermark, excluded.watermark),
                 updated_at = excluded.updated_at",
            params![channel_id, value, at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn channel_states(&self) -> StorageResult<Vec<ChannelState>> {
        let mut stmt = self.conn.prepare(
            "SELECT channel_id, watermark, updated_at FROM crawl_state ORDER BY channel_id",
        )?;

        let states = stmt
            .query_map([], |row| {
                Ok(ChannelState {
                    channel_id: row.get(0)?,
                    watermark: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(channel: &str, id: i64) -> ItemRecord {
        ItemRecord {
            channel_id: channel.to_string(),
            external_id: id,
            detail_url: format!("https://example.com/board/view/?no={id}"),
            title: Some(format!("Post {id}")),
            author: Some("tester".to_string()),
            author_handle: None,
            created_at: "2026-08-05T12:00:00+00:00".to_string(),
            views: Some(10),
            upvotes: None,
            downvotes: None,
            comments: None,
            body_text: None,
            media_refs: vec![],
            crawled_at: "2026-08-05T12:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let store = SqliteStore::new_in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_upsert_and_get_item() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_item(&record("alpha", 1)).unwrap();

        let item = store.get_item("alpha", 1).unwrap().unwrap();
        assert_eq!(item.title.as_deref(), Some("Post 1"));
        assert!(store.get_item("alpha", 2).unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_item(&record("alpha", 1)).unwrap();
        store.upsert_item(&record("alpha", 1)).unwrap();

        assert_eq!(store.count_items("alpha").unwrap(), 1);
    }

    #[test]
    fn test_upsert_fills_absent_fields_only() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        let mut first = record("alpha", 1);
        first.body_text = None;
        store.upsert_item(&first).unwrap();

        let mut second = record("alpha", 1);
        second.title = Some("Changed title".to_string());
        second.body_text = Some("late body".to_string());
        store.upsert_item(&second).unwrap();

        let item = store.get_item("alpha", 1).unwrap().unwrap();
        // Existing fields win, absent fields are filled
        assert_eq!(item.title.as_deref(), Some("Post 1"));
        assert_eq!(item.body_text.as_deref(), Some("late body"));
    }

    #[test]
    fn test_upsert_never_erases_detail() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        let mut first = record("alpha", 1);
        first.body_text = Some("original body".to_string());
        first.media_refs = vec!["https://example.com/a.png".to_string()];
        store.upsert_item(&first).unwrap();

        let mut second = record("alpha", 1);
        second.body_text = None;
        second.media_refs = vec![];
        store.upsert_item(&second).unwrap();

        let item = store.get_item("alpha", 1).unwrap().unwrap();
        assert_eq!(item.body_text.as_deref(), Some("original body"));
        assert_eq!(item.media_refs.len(), 1);
    }

    #[test]
    fn test_duplicate_detail_url_is_dropped() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_item(&record("alpha", 1)).unwrap();

        let mut dupe = record("alpha", 2);
        dupe.detail_url = record("alpha", 1).detail_url;
        store.upsert_item(&dupe).unwrap();

        assert_eq!(store.count_items("alpha").unwrap(), 1);
        assert!(store.get_item("alpha", 2).unwrap().is_none());
    }

    #[test]
    fn test_items_are_scoped_by_channel() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_item(&record("alpha", 1)).unwrap();
        let mut other = record("beta", 1);
        other.detail_url = "https://example.com/beta/view/?no=1".to_string();
        store.upsert_item(&other).unwrap();

        assert_eq!(store.count_items("alpha").unwrap(), 1);
        assert_eq!(store.count_items("beta").unwrap(), 1);
        assert_eq!(store.count_total_items().unwrap(), 2);
    }

    #[test]
    fn test_watermark_defaults_to_zero() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert_eq!(store.watermark("alpha").unwrap(), 0);
    }

    #[test]
    fn test_watermark_roundtrip() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.set_watermark("alpha", 42, Utc::now()).unwrap();
        assert_eq!(store.watermark("alpha").unwrap(), 42);
    }

    #[test]
    fn test_watermark_never_moves_backward() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.set_watermark("alpha", 42, Utc::now()).unwrap();
        store.set_watermark("alpha", 7, Utc::now()).unwrap();
        assert_eq!(store.watermark("alpha").unwrap(), 42);

        store.set_watermark("alpha", 50, Utc::now()).unwrap();
        assert_eq!(store.watermark("alpha").unwrap(), 50);
    }

    #[test]
    fn test_channel_states() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.set_watermark("beta", 5, Utc::now()).unwrap();
        store.set_watermark("alpha", 10, Utc::now()).unwrap();

        let states = store.channel_states().unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].channel_id, "alpha");
        assert_eq!(states[0].watermark, 10);
        assert_eq!(states[1].channel_id, "beta");
    }

    #[test]
    fn test_media_refs_roundtrip() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let mut item = record("alpha", 1);
        item.media_refs = vec![
            "https://example.com/a.png".to_string(),
            "https://example.com/b.png".to_string(),
        ];
        store.upsert_item(&item).unwrap();

        let loaded = store.get_item("alpha", 1).unwrap().unwrap();
        assert_eq!(loaded.media_refs, item.media_refs);
    }
}

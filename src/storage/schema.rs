//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the tidemark database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawled item, keyed by channel and the source-assigned id
CREATE TABLE IF NOT EXISTS items (
    channel_id TEXT NOT NULL,
    external_id INTEGER NOT NULL,
    detail_url TEXT NOT NULL UNIQUE,
    title TEXT,
    author TEXT,
    author_handle TEXT,
    created_at TEXT NOT NULL,
    views INTEGER,
    upvotes INTEGER,
    downvotes INTEGER,
    comments INTEGER,
    body_text TEXT,
    media_refs TEXT NOT NULL DEFAULT '[]',
    crawled_at TEXT NOT NULL,
    PRIMARY KEY (channel_id, external_id)
);

CREATE INDEX IF NOT EXISTS idx_items_channel ON items(channel_id);

-- Per-channel resume point
CREATE TABLE IF NOT EXISTS crawl_state (
    channel_id TEXT PRIMARY KEY,
    watermark INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

use serde::Deserialize;

/// Main configuration structure for tidemark
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fetch: FetchConfig,
    pub politeness: PolitenessConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub channel: Vec<ChannelConfig>,
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Attempts per URL before a fetch is declared dead
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Base retry delay; attempt N waits N times this plus jitter
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Delays between requests to the source
#[derive(Debug, Clone, Deserialize)]
pub struct PolitenessConfig {
    /// Lower bound of the delay after each detail fetch (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the delay after each detail fetch (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Added to both bounds between list pages
    #[serde(rename = "page-extra-ms", default = "default_page_extra")]
    pub page_extra_ms: u64,
}

/// Per-run defaults; the CLI can override each of these
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// List pages consumed per run at most
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// New items persisted per run at most
    #[serde(rename = "max-new-items")]
    pub max_new_items: u32,

    /// Consecutive already-known items that end an incremental run
    #[serde(rename = "existing-streak-break")]
    pub existing_streak_break: u32,

    /// Detail fetches in flight at once within a page
    #[serde(rename = "detail-concurrency", default = "default_detail_concurrency")]
    pub detail_concurrency: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One listing to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Stable identifier; keys both items and the watermark row
    pub id: String,

    /// List page URL template containing a `{page}` placeholder
    #[serde(rename = "list-url")]
    pub list_url: String,
}

fn default_user_agent() -> String {
    format!("tidemark/{}", env!("CARGO_PKG_VERSION"))
}

fn default_page_extra() -> u64 {
    500
}

fn default_detail_concurrency() -> usize {
    1
}

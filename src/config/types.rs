use serde::Deserialize;

/// Main configuration structure for Sitesearch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent page fetches per crawl run
    #[serde(rename = "max-concurrent-pages-open")]
    pub max_concurrent_pages_open: u32,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Pause before every request (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// Retries on transient I/O failure
    #[serde(rename = "fetch-retries")]
    pub fetch_retries: u32,

    /// Fixed backoff between fetch retries (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// How long `stop` waits for tasks to notice cancellation (milliseconds)
    #[serde(rename = "stop-timeout-ms")]
    pub stop_timeout_ms: u64,

    /// Whole-operation retries when applying a page to the index
    #[serde(rename = "index-retries")]
    pub index_retries: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages_open: 8,
            request_timeout_ms: 10_000,
            request_delay_ms: 500,
            fetch_retries: 3,
            retry_backoff_ms: 1_000,
            stop_timeout_ms: 3_000,
            index_retries: 3,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// Referer header sent with every request
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Query engine tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size used when a search request gives no limit
    #[serde(rename = "default-limit")]
    pub default_limit: usize,

    /// Lemmas at or above this share of the summed frequency are dropped
    #[serde(rename = "frequent-lemma-percent")]
    pub frequent_lemma_percent: u32,

    /// Snippet stops growing once it is longer than this many characters
    #[serde(rename = "snippet-max-length")]
    pub snippet_max_length: usize,

    /// Words kept on each side of a highlighted hit
    #[serde(rename = "snippet-radius")]
    pub snippet_radius: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            frequent_lemma_percent: 20,
            snippet_max_length: 150,
            snippet_radius: 5,
        }
    }
}

/// A site to crawl and index
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Root URL of the site (e.g. "https://www.example.com")
    pub url: String,

    /// Display name of the site
    pub name: String,
}

//! Sitesearch: a lemma-indexing site crawler and search engine
//!
//! This crate crawls a configured set of websites, builds a per-site
//! lemma-based inverted index of their pages, and answers ranked full-text
//! search queries against that index.

pub mod config;
pub mod crawler;
pub mod index;
pub mod lemma;
pub mod output;
pub mod search;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sitesearch operations
#[derive(Debug, Error)]
pub enum SearchEngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Site is not present in the configuration: {0}")]
    SiteNotConfigured(String),

    #[error("Indexing is already running for {0}")]
    AlreadyIndexing(String),

    #[error("Indexing is not running")]
    NotIndexing,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Crawl task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Link rejected: {0}")]
    Rejected(String),

    #[error("Link points outside the site: {0}")]
    ForeignHost(String),
}

/// Result type alias for Sitesearch operations
pub type Result<T> = std::result::Result<T, SearchEngineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use search::{SearchEngine, SearchResult};
pub use state::SiteStatus;
pub use url::canonicalize;

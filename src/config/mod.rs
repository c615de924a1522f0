//! Configuration module for Sitesearch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitesearch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! for site in &config.sites {
//!     println!("{} -> {}", site.name, site.url);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, SearchConfig, SiteEntry, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};

impl Config {
    /// Finds the configured site that owns `url`
    ///
    /// A URL belongs to a site when it has the same scheme, port and host
    /// (ignoring a leading `www.`) as the site's root URL.
    pub fn site_for_url(&self, url: &str) -> Option<&SiteEntry> {
        self.sites
            .iter()
            .find(|site| crate::url::same_site(&site.url, url))
    }
}

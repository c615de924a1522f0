//! Crawler module for site crawling and page indexing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - Per-site task registry for stop and completion tracking
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod registry;
mod task;

pub use coordinator::{CrawlHandle, Coordinator, STOPPED_BY_USER};
pub use fetcher::{build_http_client, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use parser::{parse_html, ParsedPage};
pub use registry::{SiteRegistry, SiteTasks};

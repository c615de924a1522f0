//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Retry logic for transient failures
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::parser::parse_html;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, REFERER};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A fetched page as seen by the crawler
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status_code: u16,

    /// Page body (empty for non-HTML responses)
    pub content: String,

    /// Raw `href` values found in the body
    pub links: Vec<String>,
}

/// Errors raised when no HTTP status could be obtained
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Returns true for I/O failures worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_) | Self::Body(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Source of pages for the crawler
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a page by absolute URL
    ///
    /// An HTTP error status is a successful fetch carrying that status;
    /// `Err` means no status could be obtained at all.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Crawler tuning (request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version
    let agent = format!("{}/{}", user_agent.crawler_name, user_agent.crawler_version);

    let mut headers = HeaderMap::new();
    if let Some(referrer) = &user_agent.referrer {
        if let Ok(value) = HeaderValue::from_str(referrer) {
            headers.insert(REFERER, value);
        }
    }

    Client::builder()
        .user_agent(agent)
        .default_headers(headers)
        .timeout(Duration::from_millis(crawler.request_timeout_ms))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed page fetcher
///
/// Pauses for the configured request delay before every request, and retries
/// transient failures with a fixed backoff. HTTP statuses are never retried.
pub struct HttpFetcher {
    client: Client,
    request_delay: Duration,
    retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler and user agent configuration
    pub fn new(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, crawler)?,
            request_delay: Duration::from_millis(crawler.request_delay_ms),
            retries: crawler.fetch_retries,
            backoff: Duration::from_millis(crawler.retry_backoff_ms),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        if !is_html(content_type.as_deref()) {
            debug!("Skipping non-HTML body of {} ({:?})", url, content_type);
            return Ok(FetchedPage {
                status_code,
                content: String::new(),
                links: Vec::new(),
            });
        }

        let content = response.text().await?;
        let links = parse_html(&content).links;

        Ok(FetchedPage {
            status_code,
            content,
            links,
        })
    }
}

/// Missing Content-Type is treated as HTML
fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        Some(value) => value.contains("text/html") || value.contains("application/xhtml"),
        None => true,
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "Fetch of {} failed ({}), retry {}/{}",
                        url, e, attempt, self.retries
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            referrer: Some("http://www.google.com".to_string()),
        }
    }

    fn fast_crawler() -> CrawlerConfig {
        CrawlerConfig {
            request_timeout_ms: 2_000,
            request_delay_ms: 0,
            fetch_retries: 2,
            retry_backoff_ms: 10,
            ..CrawlerConfig::default()
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&user_agent(), &CrawlerConfig::default()).is_ok());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(None));
        assert!(!is_html(Some("application/pdf")));
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&user_agent(), &fast_crawler()).unwrap();
        let page = fetcher.fetch(&format!("{}/", server.uri())).await.unwrap();

        assert_eq!(page.status_code, 200);
        assert_eq!(page.links, vec!["/a", "/b"]);
        assert!(page.content.contains("<a href=\"/a\">"));
    }

    #[tokio::test]
    async fn test_non_html_has_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x25, 0x50], "application/pdf"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&user_agent(), &fast_crawler()).unwrap();
        let page = fetcher
            .fetch(&format!("{}/file.pdf", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status_code, 200);
        assert!(page.content.is_empty());
        assert!(page.links.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_raw("oops", "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&user_agent(), &fast_crawler()).unwrap();
        let page = fetcher
            .fetch(&format!("{}/broken", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status_code, 500);
    }

    #[tokio::test]
    async fn test_connection_failure_is_an_error() {
        // nothing listens on port 9 of localhost
        let fetcher = HttpFetcher::new(&user_agent(), &fast_crawler()).unwrap();
        let result = fetcher.fetch("http://127.0.0.1:9/").await;

        assert!(result.is_err());
    }
}

//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use async_trait::async_trait;
use sitesearch::config::{parse_config, Config};
use sitesearch::crawler::{Coordinator, FetchError, FetchedPage, PageFetcher, STOPPED_BY_USER};
use sitesearch::lemma::PlainLemmatizer;
use sitesearch::output::statistics;
use sitesearch::storage::{lock_storage, SqliteStorage, Storage};
use sitesearch::{SearchEngineError, SiteStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `site_url` into `db_path`
fn create_test_config(site_url: &str, db_path: &str) -> Config {
    parse_config(&format!(
        r#"
[crawler]
max-concurrent-pages-open = 4
request-timeout-ms = 2000
request-delay-ms = 0
fetch-retries = 0
stop-timeout-ms = 1000

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"

[output]
database-path = "{}"

[[sites]]
url = "{}"
name = "Test Site"
"#,
        db_path, site_url
    ))
    .expect("Failed to parse test config")
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html_page(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        &format!(
            r#"<html><head><title>Home</title></head><body>
            <p>Welcome home</p>
            <a href="/page1">Page 1</a>
            <a href="{}/page2">Page 2</a>
            <a href="https://elsewhere.org/page3">Elsewhere</a>
            <a href="mailto:owner@example.com">Mail</a>
            <a href="/page1#section">Page 1 again</a>
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/page1/",
        r#"<html><head><title>Page 1</title></head><body>
        <p>Cats and dogs</p><a href="/">Home</a><a href="/page2/">Page 2</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/page2/",
        r#"<html><head><title>Page 2</title></head><body><p>Only cats</p></body></html>"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("index.db");
    let config = create_test_config(&base_url, db_path.to_str().unwrap());

    let coordinator = Coordinator::new(config.clone()).expect("Failed to create coordinator");
    let handles = coordinator.start_crawl(None).expect("Failed to start crawl");
    assert_eq!(handles.len(), 1);

    let site_id = handles[0].site_id();
    let status = tokio::time::timeout(Duration::from_secs(10), handles[0].clone().wait())
        .await
        .expect("Crawl did not finish");
    assert_eq!(status, SiteStatus::Indexed);

    let storage = coordinator.storage();
    let storage = lock_storage(&storage).unwrap();

    assert_eq!(storage.count_pages(Some(site_id)).unwrap(), 3);
    for page_path in ["/", "/page1/", "/page2/"] {
        let page = storage
            .find_page(site_id, page_path)
            .unwrap()
            .unwrap_or_else(|| panic!("Page {} not stored", page_path));
        assert_eq!(page.code, 200);
    }

    // "cat" appears on two pages, "welcome" on one
    let lemmas = storage
        .find_lemmas(site_id, &["cats".to_string(), "welcome".to_string()])
        .unwrap();
    let frequency = |value: &str| {
        lemmas
            .iter()
            .find(|l| l.lemma == value)
            .map(|l| l.frequency)
    };
    assert_eq!(frequency("cats"), Some(2));
    assert_eq!(frequency("welcome"), Some(1));

    let site = storage.get_site(site_id).unwrap().unwrap();
    assert!(site.last_error.is_none());

    let report = statistics(&config, &*storage).unwrap();
    assert_eq!(report.total.pages, 3);
    assert!(!report.total.indexing);
    assert_eq!(report.detailed[0].status, SiteStatus::Indexed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_crawl_keeps_lemma_frequencies() {
    let mock_server = MockServer::start().await;
    let names = [
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel",
    ];

    let links: String = names
        .iter()
        .map(|name| format!(r#"<a href="/{}">link</a>"#, name))
        .collect();

    mount_page(
        &mock_server,
        "/",
        &format!("<html><body><p>shared hub</p>{}</body></html>", links),
    )
    .await;
    // every page links to every other page, so siblings race for the same paths
    for name in names {
        mount_page(
            &mock_server,
            &format!("/{}/", name),
            &format!("<html><body><p>shared {}</p>{}</body></html>", name, links),
        )
        .await;
    }

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("index.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());
    assert!(config.crawler.max_concurrent_pages_open > 1);

    let coordinator = Coordinator::new(config).unwrap();
    let handle = coordinator.start_crawl(None).unwrap().remove(0);
    let site_id = handle.site_id();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("Crawl did not finish");
    assert_eq!(status, SiteStatus::Indexed);

    let storage = coordinator.storage();
    let storage = lock_storage(&storage).unwrap();
    assert_eq!(storage.count_pages(Some(site_id)).unwrap(), 9);

    let mut vocabulary: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    vocabulary.extend(["shared", "hub", "link"].iter().map(|w| w.to_string()));
    assert_eq!(
        storage.count_lemmas(Some(site_id)).unwrap(),
        vocabulary.len() as u64
    );

    let lemmas = storage.find_lemmas(site_id, &vocabulary).unwrap();
    assert_eq!(lemmas.len(), vocabulary.len());
    for lemma in &lemmas {
        assert_eq!(
            lemma.frequency as u64,
            storage.count_postings_for_lemma(lemma.id).unwrap(),
            "frequency of {} does not match its postings",
            lemma.lemma
        );
    }

    let frequency = |value: &str| {
        lemmas
            .iter()
            .find(|l| l.lemma == value)
            .map(|l| l.frequency)
    };
    assert_eq!(frequency("shared"), Some(9));
    assert_eq!(frequency("link"), Some(9));
    assert_eq!(frequency("hub"), Some(1));
    assert_eq!(frequency("golf"), Some(1));
}

#[tokio::test]
async fn test_root_error_marks_site_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("index.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());

    let coordinator = Coordinator::new(config).unwrap();
    let handle = coordinator.start_crawl(None).unwrap().remove(0);
    let site_id = handle.site_id();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("Crawl did not finish");
    assert_eq!(status, SiteStatus::Failed);

    let storage = coordinator.storage();
    let storage = lock_storage(&storage).unwrap();
    let site = storage.get_site(site_id).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Failed);
    assert_eq!(
        site.last_error.as_deref(),
        Some("Main page is unavailable: HTTP 500")
    );

    let root = storage.find_page(site_id, "/").unwrap().unwrap();
    assert_eq!(root.code, 500);
    assert_eq!(storage.count_lemmas(Some(site_id)).unwrap(), 0);
}

#[tokio::test]
async fn test_missing_page_is_recorded() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        r#"<html><body><p>Home</p><a href="/missing">Gone</a></body></html>"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("index.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());

    let coordinator = Coordinator::new(config).unwrap();
    let handle = coordinator.start_crawl(None).unwrap().remove(0);
    let site_id = handle.site_id();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("Crawl did not finish");
    assert_eq!(status, SiteStatus::Indexed);

    let storage = coordinator.storage();
    let storage = lock_storage(&storage).unwrap();
    let missing = storage.find_page(site_id, "/missing/").unwrap().unwrap();
    assert_eq!(missing.code, 404);

    // "home" and the link text "gone", nothing from the missing page
    assert_eq!(storage.count_lemmas(Some(site_id)).unwrap(), 2);
}

/// Slowly serves an endless site: every page links to three new pages
struct EndlessFetcher {
    next: AtomicUsize,
}

#[async_trait]
impl PageFetcher for EndlessFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedPage, FetchError> {
        tokio::time::sleep(Duration::from_millis(50)).await;

        let links = (0..3)
            .map(|_| format!("/p{}", self.next.fetch_add(1, Ordering::SeqCst)))
            .collect();
        Ok(FetchedPage {
            status_code: 200,
            content: "<html><body><p>endless content</p></body></html>".to_string(),
            links,
        })
    }
}

#[tokio::test]
async fn test_stop_crawl_cancels_tasks() {
    let config = create_test_config("https://endless.example.com", ":memory:");
    let coordinator = Coordinator::with_parts(
        config,
        Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap())),
        Arc::new(EndlessFetcher {
            next: AtomicUsize::new(0),
        }),
        Arc::new(PlainLemmatizer::new()),
    );

    let handle = coordinator.start_crawl(None).unwrap().remove(0);
    let site_id = handle.site_id();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(coordinator.is_indexing().unwrap());

    // a second start is rejected while the first one runs
    assert!(matches!(
        coordinator.start_crawl(None),
        Err(SearchEngineError::AlreadyIndexing(_))
    ));

    assert_eq!(coordinator.stop_crawl().await.unwrap(), 1);

    let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("Stopped crawl did not report");
    assert_eq!(status, SiteStatus::Failed);
    assert!(!coordinator.is_indexing().unwrap());

    let storage = coordinator.storage();
    let pages_after_stop = {
        let storage = lock_storage(&storage).unwrap();
        let site = storage.get_site(site_id).unwrap().unwrap();
        assert_eq!(site.status, SiteStatus::Failed);
        assert_eq!(site.last_error.as_deref(), Some(STOPPED_BY_USER));
        storage.count_pages(Some(site_id)).unwrap()
    };
    assert!(pages_after_stop > 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        lock_storage(&storage)
            .unwrap()
            .count_pages(Some(site_id))
            .unwrap(),
        pages_after_stop
    );

    // nothing left to stop
    assert!(matches!(
        coordinator.stop_crawl().await,
        Err(SearchEngineError::NotIndexing)
    ));
}

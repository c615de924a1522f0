//! Integration tests for the index maintainer and the query engine
//!
//! Pages are indexed straight into an in-memory database, then searched.

use sitesearch::config::SearchConfig;
use sitesearch::crawler::parse_html;
use sitesearch::index::{reindex_page, remove_page};
use sitesearch::lemma::{collect_lemmas, PlainLemmatizer};
use sitesearch::search::{SearchEngine, EMPTY_QUERY, SITE_NOT_FOUND, UNRECOGNIZED_QUERY};
use sitesearch::storage::{lock_storage, SharedStorage, SqliteStorage, Storage};
use sitesearch::SiteStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn shared_storage() -> SharedStorage {
    Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()))
}

fn engine(storage: &SharedStorage) -> SearchEngine {
    SearchEngine::new(
        Arc::clone(storage),
        Arc::new(PlainLemmatizer::new()),
        SearchConfig::default(),
    )
}

fn add_site(storage: &SharedStorage, url: &str, name: &str) -> i64 {
    lock_storage(storage)
        .unwrap()
        .insert_site(url, name, SiteStatus::Indexed)
        .unwrap()
}

fn page_lemmas(html: &str) -> HashMap<String, u32> {
    let parsed = parse_html(html);
    let text = format!("{} {}", parsed.title.unwrap_or_default(), parsed.text);
    collect_lemmas(&PlainLemmatizer::new(), &text)
}

/// Stores and indexes a page the way a crawl task does
fn add_page(storage: &SharedStorage, site_id: i64, path: &str, html: &str) -> i64 {
    let mut storage = lock_storage(storage).unwrap();
    let page_id = storage
        .insert_page(site_id, path, 200, html)
        .unwrap()
        .unwrap();
    reindex_page(&mut *storage, site_id, page_id, &[], &page_lemmas(html), 3).unwrap();
    page_id
}

/// Every lemma's frequency equals the number of postings referencing it
fn assert_frequencies_consistent(storage: &SharedStorage, site_id: i64, values: &[&str]) {
    let storage = lock_storage(storage).unwrap();
    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    for lemma in storage.find_lemmas(site_id, &values).unwrap() {
        assert_eq!(
            lemma.frequency as u64,
            storage.count_postings_for_lemma(lemma.id).unwrap(),
            "frequency of {} drifted",
            lemma.lemma
        );
    }
}

#[test]
fn test_pages_must_contain_every_indexed_lemma() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    add_page(&storage, site, "/p1/", "<html><body><p>cat cat cat</p></body></html>");
    add_page(
        &storage,
        site,
        "/p2/",
        "<html><head><title>Pets</title></head><body><p>cat dog dog</p></body></html>",
    );

    let result = engine(&storage).search("cat dog", None, None, None);

    assert!(result.result);
    assert_eq!(result.count, 1);
    let item = &result.data[0];
    assert_eq!(item.uri, "/p2/");
    assert_eq!(item.site, "https://www.example.com");
    assert_eq!(item.site_name, "Example");
    assert_eq!(item.title, "Pets");
    assert_eq!(item.relevance, 1.0);
    // words inside a kept window are not highlighted again
    assert_eq!(item.snippet, "<b>cat</b> dog dog ...");
}

#[test]
fn test_results_ordered_by_relevance() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    add_page(&storage, site, "/low/", "<p>one cat here</p>");
    add_page(&storage, site, "/high/", "<p>cat cat cat</p>");

    let result = engine(&storage).search("CAT", None, None, None);
    assert_eq!(result.count, 2);
    assert_eq!(result.data[0].uri, "/high/");
    assert_eq!(result.data[0].relevance, 1.0);
    assert_eq!(result.data[1].uri, "/low/");
    assert!((result.data[1].relevance - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_unindexed_query_words_are_ignored() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    add_page(&storage, site, "/cats/", "<p>cat cat cat</p>");

    let result = engine(&storage).search("cat xyzzy", None, None, None);

    assert!(result.result);
    assert_eq!(result.count, 1);
    assert_eq!(result.data[0].uri, "/cats/");
    assert_eq!(result.data[0].relevance, 1.0);
}

#[test]
fn test_frequent_lemma_is_dropped() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    for i in 0..10 {
        add_page(&storage, site, &format!("/c{}/", i), "<p>common words</p>");
    }
    add_page(&storage, site, "/rare/", "<p>alpha beta</p>");

    let result = engine(&storage).search("alpha beta common", None, None, None);

    assert!(result.result);
    assert_eq!(result.count, 1);
    assert_eq!(result.data[0].uri, "/rare/");
    assert!(result.data[0].snippet.contains("<b>alpha</b>"));
}

#[test]
fn test_two_lemma_query_keeps_frequent_lemma() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    for i in 0..10 {
        add_page(&storage, site, &format!("/c{}/", i), "<p>common words</p>");
    }
    add_page(&storage, site, "/rare/", "<p>alpha</p>");

    let result = engine(&storage).search("alpha common", None, None, None);

    assert!(result.result);
    assert_eq!(result.count, 0);
}

#[test]
fn test_query_errors() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    add_page(&storage, site, "/", "<p>cat</p>");
    let engine = engine(&storage);

    let result = engine.search("   ", None, None, None);
    assert!(!result.result);
    assert_eq!(result.error, EMPTY_QUERY);

    let result = engine.search("the and 42", None, None, None);
    assert!(!result.result);
    assert_eq!(result.error, UNRECOGNIZED_QUERY);

    let result = engine.search("cat", Some("https://unknown.org"), None, None);
    assert!(!result.result);
    assert_eq!(result.error, SITE_NOT_FOUND);

    // a lemma nobody uses is a miss, not an error
    let result = engine.search("zebra", None, None, None);
    assert!(result.result);
    assert_eq!(result.count, 0);
    assert!(result.data.is_empty());
}

#[test]
fn test_pagination_keeps_total_count() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    for rank in 1..=5 {
        let body = vec!["cat"; rank].join(" ");
        add_page(&storage, site, &format!("/r{}/", rank), &format!("<p>{}</p>", body));
    }

    let result = engine(&storage).search("cat", None, Some(1), Some(2));

    assert_eq!(result.count, 5);
    let uris: Vec<&str> = result.data.iter().map(|i| i.uri.as_str()).collect();
    assert_eq!(uris, vec!["/r4/", "/r3/"]);
    assert!((result.data[0].relevance - 0.8).abs() < 1e-9);

    let result = engine(&storage).search("cat", None, Some(10), None);
    assert_eq!(result.count, 5);
    assert!(result.data.is_empty());
}

#[test]
fn test_site_scope() {
    let storage = shared_storage();
    let first = add_site(&storage, "https://www.example.com/", "Example");
    let second = add_site(&storage, "https://www.other.org/", "Other");
    add_page(&storage, first, "/", "<p>cat</p>");
    add_page(&storage, second, "/", "<p>cat cat</p>");
    let engine = engine(&storage);

    let result = engine.search("cat", None, None, None);
    assert_eq!(result.count, 2);
    assert_eq!(result.data[0].site, "https://www.other.org");

    let result = engine.search("cat", Some("https://example.com"), None, None);
    assert_eq!(result.count, 1);
    assert_eq!(result.data[0].site_name, "Example");
    assert_eq!(result.data[0].relevance, 1.0);
}

#[test]
fn test_reindex_is_idempotent_and_consistent() {
    let storage = shared_storage();
    let site = add_site(&storage, "https://www.example.com/", "Example");
    let html = "<p>cat dog bird</p>";
    let page = add_page(&storage, site, "/", html);
    add_page(&storage, site, "/other/", "<p>cat fish</p>");

    let snapshot = |storage: &SharedStorage| {
        let storage = lock_storage(storage).unwrap();
        let values: Vec<String> = ["cat", "dog", "bird", "fish"]
            .iter()
            .map(|v| v.to_string())
            .collect();
        storage.find_lemmas(site, &values).unwrap()
    };
    let before = snapshot(&storage);

    {
        let mut guard = lock_storage(&storage).unwrap();
        let previous = guard.lemma_ids_for_page(page).unwrap();
        reindex_page(&mut *guard, site, page, &previous, &page_lemmas(html), 3).unwrap();
    }
    assert_eq!(snapshot(&storage), before);
    assert_frequencies_consistent(&storage, site, &["cat", "dog", "bird", "fish"]);

    // the page changes: "dog" disappears, "fish" appears
    {
        let mut guard = lock_storage(&storage).unwrap();
        let previous = guard.lemma_ids_for_page(page).unwrap();
        reindex_page(&mut *guard, site, page, &previous, &page_lemmas("<p>cat bird fish</p>"), 3)
            .unwrap();
    }
    assert_frequencies_consistent(&storage, site, &["cat", "dog", "bird", "fish"]);

    let engine = engine(&storage);
    assert_eq!(engine.search("dog", None, None, None).count, 0);
    assert_eq!(engine.search("fish", None, None, None).count, 2);

    {
        let mut guard = lock_storage(&storage).unwrap();
        remove_page(&mut *guard, page, 3).unwrap();
    }
    assert_frequencies_consistent(&storage, site, &["cat", "dog", "bird", "fish"]);
    assert_eq!(engine.search("bird", None, None, None).count, 0);
    assert_eq!(engine.search("cat", None, None, None).count, 1);
}

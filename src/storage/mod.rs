//! Storage module for persisting the search index
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Site lifecycle rows
//! - Fetched pages
//! - Lemma dictionary and postings (the inverted index)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::SiteStatus;
use crate::SearchEngineError;
use serde::Serialize;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SearchEngineError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SearchEngineError> {
    SqliteStorage::new(path)
}

/// Represents a site in the database
#[derive(Debug, Clone, Serialize)]
pub struct SiteRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: String,
    pub last_error: Option<String>,
}

/// Represents a fetched page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    /// Site-relative path with a leading slash
    pub path: String,
    pub code: u16,
    /// Raw HTML (empty for non-HTML responses and unreachable pages)
    pub content: String,
}

/// Represents a lemma of one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LemmaRecord {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    /// Number of pages of the site containing the lemma
    pub frequency: u32,
}

/// Represents one (page, lemma) entry of the inverted index
#[derive(Debug, Clone)]
pub struct PostingRecord {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    /// Occurrences of the lemma on the page
    pub rank: u32,
}

/// Storage shared between crawl tasks, the coordinator and the query engine
pub type SharedStorage = std::sync::Arc<std::sync::Mutex<SqliteStorage>>;

/// Locks shared storage, surfacing poisoning as an error
pub fn lock_storage(
    storage: &std::sync::Mutex<SqliteStorage>,
) -> Result<std::sync::MutexGuard<'_, SqliteStorage>, SearchEngineError> {
    storage.lock().map_err(|_| SearchEngineError::LockPoisoned)
}

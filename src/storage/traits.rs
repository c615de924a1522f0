//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::SiteStatus;
use crate::storage::{LemmaRecord, PageRecord, PostingRecord, SiteRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Covers CRUD and predicate lookups over the four entity collections
/// (sites, pages, lemmas, postings). Writers that need several statements
/// applied atomically bracket them with `begin`/`commit`/`rollback`.
pub trait Storage {
    // ===== Transactions =====

    /// Opens a write transaction
    fn begin(&mut self) -> StorageResult<()>;

    /// Commits the open transaction
    fn commit(&mut self) -> StorageResult<()>;

    /// Rolls back the open transaction
    fn rollback(&mut self) -> StorageResult<()>;

    // ===== Site Management =====

    /// Creates a site row and returns its ID
    ///
    /// # Arguments
    ///
    /// * `url` - Canonical root URL of the site
    /// * `name` - Display name from the configuration
    /// * `status` - Initial lifecycle status
    fn insert_site(&mut self, url: &str, name: &str, status: SiteStatus) -> StorageResult<i64>;

    /// Gets a site by ID
    fn get_site(&self, site_id: i64) -> StorageResult<Option<SiteRecord>>;

    /// Gets the most recent site row for a URL
    fn get_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>>;

    /// Lists site rows in the given status
    fn sites_with_status(&self, status: SiteStatus) -> StorageResult<Vec<SiteRecord>>;

    /// Sets the status and last error of a site, refreshing its status time
    fn update_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()>;

    /// Refreshes the status time of a site without changing its status
    fn touch_site(&mut self, site_id: i64) -> StorageResult<()>;

    /// Deletes a site together with its pages, lemmas and postings
    fn delete_site(&mut self, site_id: i64) -> StorageResult<()>;

    // ===== Page Management =====

    /// Inserts a page unless the path is already taken
    ///
    /// # Returns
    ///
    /// `Some(id)` for a new row, `None` when another writer already owns the path
    fn insert_page(
        &mut self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<Option<i64>>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<Option<PageRecord>>;

    /// Gets the page stored at a site-relative path
    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>>;

    /// Deletes a page and its postings
    fn delete_page(&mut self, page_id: i64) -> StorageResult<()>;

    /// Counts pages, optionally scoped to one site
    fn count_pages(&self, site_id: Option<i64>) -> StorageResult<u64>;

    // ===== Lemma Management =====

    /// Gets a lemma by ID
    fn get_lemma(&self, lemma_id: i64) -> StorageResult<Option<LemmaRecord>>;

    /// Gets the lemma rows of one site matching the given values
    fn find_lemmas(&self, site_id: i64, values: &[String]) -> StorageResult<Vec<LemmaRecord>>;

    /// Creates a lemma row with frequency 1 and returns its ID
    fn insert_lemma(&mut self, site_id: i64, lemma: &str) -> StorageResult<i64>;

    /// Adds one to a lemma's frequency
    fn increment_lemma(&mut self, lemma_id: i64) -> StorageResult<()>;

    /// Subtracts one from a lemma's frequency, deleting the row below 1
    ///
    /// # Returns
    ///
    /// `true` if the row was deleted
    fn decrement_lemma(&mut self, lemma_id: i64) -> StorageResult<bool>;

    /// Gets lemma rows matching the given values, rarest first
    ///
    /// # Arguments
    ///
    /// * `values` - Lemma values to look up
    /// * `site_id` - Restricts the lookup to one site when given
    fn lemmas_by_values(
        &self,
        values: &[String],
        site_id: Option<i64>,
    ) -> StorageResult<Vec<LemmaRecord>>;

    /// Counts lemma rows, optionally scoped to one site
    fn count_lemmas(&self, site_id: Option<i64>) -> StorageResult<u64>;

    // ===== Posting Management =====

    /// Writes one posting
    fn insert_posting(&mut self, page_id: i64, lemma_id: i64, rank: u32) -> StorageResult<()>;

    /// Gets the lemma IDs a page currently has postings for
    fn lemma_ids_for_page(&self, page_id: i64) -> StorageResult<Vec<i64>>;

    /// Deletes every posting of a page
    fn delete_postings_for_page(&mut self, page_id: i64) -> StorageResult<()>;

    /// Gets every posting referencing one of the given lemmas
    fn postings_for_lemmas(&self, lemma_ids: &[i64]) -> StorageResult<Vec<PostingRecord>>;

    /// Counts postings referencing a lemma
    fn count_postings_for_lemma(&self, lemma_id: i64) -> StorageResult<u64>;
}

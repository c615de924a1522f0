//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::SiteStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{LemmaRecord, PageRecord, PostingRecord, SiteRecord};
use crate::SearchEngineError;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

const SITE_COLUMNS: &str = "id, url, name, status, status_time, last_error";
const PAGE_COLUMNS: &str = "id, site_id, path, code, content";
const LEMMA_COLUMNS: &str = "id, site_id, lemma, frequency";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SearchEngineError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SearchEngineError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        // a second process (e.g. `stop`) may hold the write lock briefly
        conn.busy_timeout(Duration::from_secs(5))?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, SearchEngineError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        status: SiteStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(SiteStatus::Failed),
        status_time: row.get(4)?,
        last_error: row.get(5)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        path: row.get(2)?,
        code: row.get(3)?,
        content: row.get(4)?,
    })
}

fn lemma_from_row(row: &Row<'_>) -> rusqlite::Result<LemmaRecord> {
    Ok(LemmaRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        lemma: row.get(2)?,
        frequency: row.get(3)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Transactions =====

    fn begin(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    // ===== Site Management =====

    fn insert_site(&mut self, url: &str, name: &str, status: SiteStatus) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sites (url, name, status, status_time) VALUES (?1, ?2, ?3, ?4)",
            params![url, name, status.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_site(&self, site_id: i64) -> StorageResult<Option<SiteRecord>> {
        let site = self
            .conn
            .query_row(
                &format!("SELECT {} FROM sites WHERE id = ?1", SITE_COLUMNS),
                params![site_id],
                site_from_row,
            )
            .optional()?;
        Ok(site)
    }

    fn get_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>> {
        let site = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM sites WHERE url = ?1 ORDER BY id DESC LIMIT 1",
                    SITE_COLUMNS
                ),
                params![url],
                site_from_row,
            )
            .optional()?;
        Ok(site)
    }

    fn sites_with_status(&self, status: SiteStatus) -> StorageResult<Vec<SiteRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sites WHERE status = ?1 ORDER BY id",
            SITE_COLUMNS
        ))?;
        let sites = stmt
            .query_map(params![status.to_db_string()], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn update_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE sites SET status = ?1, status_time = ?2, last_error = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, last_error, site_id],
        )?;
        Ok(())
    }

    fn touch_site(&mut self, site_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE sites SET status_time = ?1 WHERE id = ?2",
            params![now, site_id],
        )?;
        Ok(())
    }

    fn delete_site(&mut self, site_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM sites WHERE id = ?1", params![site_id])?;
        Ok(())
    }

    // ===== Page Management =====

    fn insert_page(
        &mut self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<Option<i64>> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pages (site_id, path, code, content) VALUES (?1, ?2, ?3, ?4)",
            params![site_id, path, code, content],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn get_page(&self, page_id: i64) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
                params![page_id],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE site_id = ?1 AND path = ?2",
                    PAGE_COLUMNS
                ),
                params![site_id, path],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn delete_page(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM pages WHERE id = ?1", params![page_id])?;
        Ok(())
    }

    fn count_pages(&self, site_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = match site_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM pages WHERE site_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    // ===== Lemma Management =====

    fn get_lemma(&self, lemma_id: i64) -> StorageResult<Option<LemmaRecord>> {
        let lemma = self
            .conn
            .query_row(
                &format!("SELECT {} FROM lemmas WHERE id = ?1", LEMMA_COLUMNS),
                params![lemma_id],
                lemma_from_row,
            )
            .optional()?;
        Ok(lemma)
    }

    fn find_lemmas(&self, site_id: i64, values: &[String]) -> StorageResult<Vec<LemmaRecord>> {
        self.lemmas_by_values(values, Some(site_id))
    }

    fn insert_lemma(&mut self, site_id: i64, lemma: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?1, ?2, 1)",
            params![site_id, lemma],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn increment_lemma(&mut self, lemma_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE lemmas SET frequency = frequency + 1 WHERE id = ?1",
            params![lemma_id],
        )?;
        Ok(())
    }

    fn decrement_lemma(&mut self, lemma_id: i64) -> StorageResult<bool> {
        self.conn.execute(
            "UPDATE lemmas SET frequency = frequency - 1 WHERE id = ?1",
            params![lemma_id],
        )?;
        let removed = self.conn.execute(
            "DELETE FROM lemmas WHERE id = ?1 AND frequency < 1",
            params![lemma_id],
        )?;
        Ok(removed > 0)
    }

    fn lemmas_by_values(
        &self,
        values: &[String],
        site_id: Option<i64>,
    ) -> StorageResult<Vec<LemmaRecord>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {} FROM lemmas WHERE lemma IN ({})",
            LEMMA_COLUMNS,
            placeholders(values.len())
        );
        let mut args: Vec<rusqlite::types::Value> = values
            .iter()
            .map(|v| rusqlite::types::Value::Text(v.clone()))
            .collect();
        if let Some(id) = site_id {
            sql.push_str(" AND site_id = ?");
            args.push(rusqlite::types::Value::Integer(id));
        }
        sql.push_str(" ORDER BY frequency ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let lemmas = stmt
            .query_map(params_from_iter(args), lemma_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lemmas)
    }

    fn count_lemmas(&self, site_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = match site_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM lemmas WHERE site_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM lemmas", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    // ===== Posting Management =====

    fn insert_posting(&mut self, page_id: i64, lemma_id: i64, rank: u32) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO postings (page_id, lemma_id, rank) VALUES (?1, ?2, ?3)",
            params![page_id, lemma_id, rank],
        )?;
        Ok(())
    }

    fn lemma_ids_for_page(&self, page_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT lemma_id FROM postings WHERE page_id = ?1 ORDER BY lemma_id")?;
        let ids = stmt
            .query_map(params![page_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn delete_postings_for_page(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM postings WHERE page_id = ?1", params![page_id])?;
        Ok(())
    }

    fn postings_for_lemmas(&self, lemma_ids: &[i64]) -> StorageResult<Vec<PostingRecord>> {
        if lemma_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, page_id, lemma_id, rank FROM postings WHERE lemma_id IN ({}) ORDER BY id",
            placeholders(lemma_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let postings = stmt
            .query_map(params_from_iter(lemma_ids.iter()), |row| {
                Ok(PostingRecord {
                    id: row.get(0)?,
                    page_id: row.get(1)?,
                    lemma_id: row.get(2)?,
                    rank: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(postings)
    }

    fn count_postings_for_lemma(&self, lemma_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM postings WHERE lemma_id = ?1",
            params![lemma_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

//! Per-link crawl task
//!
//! Every distinct link of a crawl run is processed by one spawned task. A task
//! fetches its page, stores and indexes it, and spawns one child task per new
//! same-site link it finds. The run's status row in storage is the
//! cancellation signal: tasks check it before and after fetching.

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::parse_html;
use crate::crawler::registry::{SiteRegistry, SiteTasks};
use crate::index::{reindex_page, remove_page};
use crate::lemma::{collect_lemmas, Lemmatizer};
use crate::state::SiteStatus;
use crate::storage::{lock_storage, SharedStorage, SqliteStorage, Storage};
use crate::url::{canonicalize, site_relative_path};
use crate::{Result, SearchEngineError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Context shared by every task of one crawl run
pub(crate) struct CrawlRun {
    pub site_id: i64,
    /// Canonical root URL of the site
    pub site_root: String,
    pub storage: SharedStorage,
    pub fetcher: Arc<dyn PageFetcher>,
    pub lemmatizer: Arc<dyn Lemmatizer>,
    pub registry: Arc<SiteRegistry>,
    pub tasks: Arc<SiteTasks>,
    /// Paths already taken by a task of this run
    pub claimed: Mutex<HashSet<String>>,
    pub semaphore: Arc<Semaphore>,
    /// Refetch one page without following its links
    pub single_page: bool,
    pub index_retries: u32,
}

impl CrawlRun {
    /// Claims a path for this run; false if another task already has it
    pub fn claim(&self, path: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_string())
    }
}

/// Registers and spawns a task for `link`
///
/// Registration happens before the spawn so the site never looks drained
/// while a child is being handed off.
pub(crate) fn spawn_link(run: &Arc<CrawlRun>, link: String) {
    if !run.tasks.register(&link) {
        return;
    }

    let guard = TaskGuard {
        run: Arc::clone(run),
        link: link.clone(),
    };
    let handle = tokio::spawn(run_task(guard));
    run.tasks.attach(&link, handle.abort_handle());
}

/// Deregisters its task when dropped, whether the task returned, panicked
/// or was aborted
struct TaskGuard {
    run: Arc<CrawlRun>,
    link: String,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let Some(remaining) = self.run.tasks.deregister(&self.link) else {
            return;
        };

        if remaining == 0 {
            finalize(&self.run);
            return;
        }

        let touched = lock_storage(&self.run.storage)
            .and_then(|mut storage| Ok(storage.touch_site(self.run.site_id)?));
        if let Err(e) = touched {
            tracing::error!("Failed to update site {}: {}", self.run.site_id, e);
        }
    }
}

async fn run_task(guard: TaskGuard) {
    match process_link(&guard.run, &guard.link).await {
        Ok(children) => {
            for child in children {
                spawn_link(&guard.run, child);
            }
        }
        Err(e) => tracing::warn!("Task for {} failed: {}", guard.link, e),
    }
}

/// Publishes the outcome of a run whose last task finished
///
/// A final status is always published, so waiters never hang. If the site row
/// cannot be read or updated the run counts as FAILED.
fn finalize(run: &CrawlRun) {
    let status = match complete_site(run) {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("Failed to finalize site {}: {}", run.site_id, e);
            SiteStatus::Failed
        }
    };

    tracing::info!("Crawl of {} finished: {}", run.site_root, status);
    run.tasks.finish(status);
    run.registry.close(run.site_id, &run.tasks);
}

/// Marks the site INDEXED unless it already failed
fn complete_site(run: &CrawlRun) -> Result<SiteStatus> {
    let mut storage = lock_storage(&run.storage)?;
    match storage.get_site(run.site_id)? {
        Some(site) if site.status == SiteStatus::Indexing => {
            storage.update_site_status(run.site_id, SiteStatus::Indexed, None)?;
            Ok(SiteStatus::Indexed)
        }
        Some(site) => Ok(site.status),
        None => Ok(SiteStatus::Failed),
    }
}

fn still_indexing(storage: &SqliteStorage, site_id: i64) -> Result<bool> {
    Ok(storage
        .get_site(site_id)?
        .map(|site| site.status == SiteStatus::Indexing)
        .unwrap_or(false))
}

/// Processes one link and returns the child links to spawn
async fn process_link(run: &CrawlRun, link: &str) -> Result<Vec<String>> {
    let _permit = run
        .semaphore
        .acquire()
        .await
        .map_err(|e| SearchEngineError::Task(e.to_string()))?;

    let path = site_relative_path(link, &run.site_root)
        .ok_or_else(|| SearchEngineError::Task(format!("{} is outside {}", link, run.site_root)))?;

    {
        let mut storage = lock_storage(&run.storage)?;
        if !still_indexing(&storage, run.site_id)? {
            tracing::debug!("Site {} no longer indexing, dropping {}", run.site_id, link);
            return Ok(Vec::new());
        }

        if let Some(existing) = storage.find_page(run.site_id, &path)? {
            if !run.single_page {
                tracing::debug!("Page {} already stored", path);
                return Ok(Vec::new());
            }
            remove_page(&mut *storage, existing.id, run.index_retries)?;
        }
    }

    let (code, content, links) = match run.fetcher.fetch(link).await {
        Ok(page) => (page.status_code, page.content, page.links),
        Err(e) => {
            tracing::warn!("Fetch of {} failed, recording 404: {}", link, e);
            (404, String::new(), Vec::new())
        }
    };

    let page_id = {
        let mut storage = lock_storage(&run.storage)?;
        if !still_indexing(&storage, run.site_id)? {
            tracing::debug!("Site {} stopped while fetching {}", run.site_id, link);
            return Ok(Vec::new());
        }

        let page_id = storage.insert_page(run.site_id, &path, code, &content)?;

        if path == "/" && code != 200 {
            let message = format!("Main page is unavailable: HTTP {}", code);
            tracing::error!("Crawl of {} failed: {}", run.site_root, message);
            storage.update_site_status(run.site_id, SiteStatus::Failed, Some(&message))?;
            return Ok(Vec::new());
        }

        match page_id {
            Some(id) => id,
            None => {
                tracing::debug!("Page {} was stored by another writer", path);
                return Ok(Vec::new());
            }
        }
    };

    if code < 400 {
        index_content(run, page_id, &content)?;
    }

    if run.single_page || !(200..400).contains(&code) {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for href in links {
        let Ok(child) = canonicalize(&href, &run.site_root) else {
            continue;
        };
        let Some(child_path) = site_relative_path(&child, &run.site_root) else {
            continue;
        };
        if run.claim(&child_path) {
            candidates.push((child, child_path));
        }
    }

    let storage = lock_storage(&run.storage)?;
    let mut children = Vec::with_capacity(candidates.len());
    for (child, child_path) in candidates {
        if storage.find_page(run.site_id, &child_path)?.is_none() {
            children.push(child);
        }
    }

    tracing::debug!("{} -> {} new links", link, children.len());
    Ok(children)
}

/// Extracts lemma counts from a page and applies them to the index
///
/// Storage failures are logged and leave the page unindexed.
fn index_content(run: &CrawlRun, page_id: i64, content: &str) -> Result<()> {
    let parsed = parse_html(content);
    let text = match &parsed.title {
        Some(title) => format!("{} {}", title, parsed.text),
        None => parsed.text,
    };
    let counts = collect_lemmas(run.lemmatizer.as_ref(), &text);

    let mut storage = lock_storage(&run.storage)?;
    if let Err(e) = reindex_page(
        &mut *storage,
        run.site_id,
        page_id,
        &[],
        &counts,
        run.index_retries,
    ) {
        tracing::warn!("Indexing of page {} skipped: {}", page_id, e);
    }
    Ok(())
}

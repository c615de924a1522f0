//! Crawler coordinator - crawl lifecycle orchestration
//!
//! This module owns the entry points that start, stop and re-run crawls:
//! - Checking and flipping site status rows before any task is spawned
//! - Building the per-run context shared by a site's task tree
//! - Stopping every indexing site, with a bounded wait before forced abort

use crate::config::{Config, SiteEntry};
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::registry::{SiteRegistry, SiteTasks};
use crate::crawler::task::{spawn_link, CrawlRun};
use crate::lemma::{Lemmatizer, PlainLemmatizer};
use crate::state::SiteStatus;
use crate::storage::{lock_storage, SharedStorage, SqliteStorage, Storage};
use crate::url::{canonicalize, site_relative_path, site_root};
use crate::{Result, SearchEngineError};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Message stored on sites stopped by a stop request
pub const STOPPED_BY_USER: &str = "Indexing stopped by user";

/// Handle to a running crawl of one site
#[derive(Debug, Clone)]
pub struct CrawlHandle {
    site_id: i64,
    url: String,
    tasks: Arc<SiteTasks>,
}

impl CrawlHandle {
    /// ID of the site row being crawled
    pub fn site_id(&self) -> i64 {
        self.site_id
    }

    /// Canonical root URL of the site
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Waits for the crawl to finish and returns the site's final status
    pub async fn wait(self) -> SiteStatus {
        self.tasks.finished().await
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    fetcher: Arc<dyn PageFetcher>,
    lemmatizer: Arc<dyn Lemmatizer>,
    registry: Arc<SiteRegistry>,
}

impl Coordinator {
    /// Creates a coordinator backed by the configured database and an HTTP fetcher
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SearchEngineError)` - Failed to open storage or build the HTTP client
    pub fn new(config: Config) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let fetcher = HttpFetcher::new(&config.user_agent, &config.crawler)?;

        Ok(Self::with_parts(
            config,
            Arc::new(Mutex::new(storage)),
            Arc::new(fetcher),
            Arc::new(PlainLemmatizer::new()),
        ))
    }

    /// Creates a coordinator from explicit collaborators
    pub fn with_parts(
        config: Config,
        storage: SharedStorage,
        fetcher: Arc<dyn PageFetcher>,
        lemmatizer: Arc<dyn Lemmatizer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            fetcher,
            lemmatizer,
            registry: Arc::new(SiteRegistry::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Storage shared with the crawl tasks
    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    /// Returns true if any site row is INDEXING
    pub fn is_indexing(&self) -> Result<bool> {
        let storage = lock_storage(&self.storage)?;
        Ok(!storage.sites_with_status(SiteStatus::Indexing)?.is_empty())
    }

    /// Starts a full re-crawl of one configured site, or of all of them
    ///
    /// Every requested site is checked before anything is changed: if one of
    /// them is already INDEXING the call fails and no state is touched. Each
    /// accepted site's previous row (with its pages, lemmas and postings) is
    /// replaced by a fresh INDEXING row.
    ///
    /// # Arguments
    ///
    /// * `site_url` - URL of a configured site, or `None` for all sites
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<CrawlHandle>)` - One handle per started site
    /// * `Err(SiteNotConfigured)` - `site_url` matches no configured site
    /// * `Err(AlreadyIndexing)` - A requested site is being crawled
    pub fn start_crawl(&self, site_url: Option<&str>) -> Result<Vec<CrawlHandle>> {
        let targets: Vec<&SiteEntry> = match site_url {
            Some(url) => vec![self
                .config
                .site_for_url(url)
                .ok_or_else(|| SearchEngineError::SiteNotConfigured(url.to_string()))?],
            None => self.config.sites.iter().collect(),
        };

        let mut roots = Vec::with_capacity(targets.len());
        for entry in &targets {
            roots.push((site_root(&entry.url)?, entry.name.as_str()));
        }

        let started = {
            let mut storage = lock_storage(&self.storage)?;

            for (root, _) in &roots {
                if let Some(site) = storage.get_site_by_url(root)? {
                    if site.status == SiteStatus::Indexing {
                        return Err(SearchEngineError::AlreadyIndexing(root.clone()));
                    }
                }
            }

            let mut started = Vec::with_capacity(roots.len());
            for (root, name) in &roots {
                if let Some(site) = storage.get_site_by_url(root)? {
                    storage.delete_site(site.id)?;
                }
                let site_id = storage.insert_site(root, name, SiteStatus::Indexing)?;
                started.push((site_id, root.clone()));
            }
            started
        };

        Ok(started
            .into_iter()
            .map(|(site_id, root)| {
                tracing::info!("Starting crawl of {} (site {})", root, site_id);
                let start = root.clone();
                self.launch(site_id, root, start, false)
            })
            .collect())
    }

    /// Re-indexes a single page of a configured site in place
    ///
    /// The site's other pages, lemmas and postings are kept. The request is
    /// rejected while the site is being crawled.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlHandle)` - Handle of the single-page run
    /// * `Err(SiteNotConfigured)` - `url` belongs to no configured site
    /// * `Err(AlreadyIndexing)` - The site is being crawled
    pub fn index_single_page(&self, url: &str) -> Result<CrawlHandle> {
        let entry = self
            .config
            .site_for_url(url)
            .ok_or_else(|| SearchEngineError::SiteNotConfigured(url.to_string()))?;
        let root = site_root(&entry.url)?;
        let link = canonicalize(url, &root)?;

        let site_id = {
            let mut storage = lock_storage(&self.storage)?;
            match storage.get_site_by_url(&root)? {
                Some(site) if site.status == SiteStatus::Indexing => {
                    return Err(SearchEngineError::AlreadyIndexing(root));
                }
                Some(site) => {
                    storage.update_site_status(site.id, SiteStatus::Indexing, None)?;
                    site.id
                }
                None => storage.insert_site(&root, &entry.name, SiteStatus::Indexing)?,
            }
        };

        tracing::info!("Re-indexing {} (site {})", link, site_id);
        Ok(self.launch(site_id, root, link, true))
    }

    /// Stops every INDEXING site
    ///
    /// Sites are marked FAILED first, which their tasks observe at their next
    /// status check. Local task sets get `stop-timeout-ms` to drain before the
    /// remaining tasks are aborted. Sites crawled by another process are only
    /// marked.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of sites stopped
    /// * `Err(NotIndexing)` - No site was INDEXING
    pub async fn stop_crawl(&self) -> Result<usize> {
        let stopped = {
            let mut storage = lock_storage(&self.storage)?;
            let indexing = storage.sites_with_status(SiteStatus::Indexing)?;
            if indexing.is_empty() {
                return Err(SearchEngineError::NotIndexing);
            }
            for site in &indexing {
                storage.update_site_status(site.id, SiteStatus::Failed, Some(STOPPED_BY_USER))?;
            }
            indexing
        };

        let timeout = Duration::from_millis(self.config.crawler.stop_timeout_ms);
        for site in &stopped {
            tracing::info!("Stopping crawl of {}", site.url);

            let Some(tasks) = self.registry.get(site.id) else {
                continue;
            };

            if tokio::time::timeout(timeout, tasks.drained()).await.is_err() {
                let aborted = tasks.abort_all();
                tracing::warn!(
                    "{} tasks of {} did not stop in time and were aborted",
                    aborted,
                    site.url
                );
            }
            tasks.finish(SiteStatus::Failed);
            self.registry.close(site.id, &tasks);
        }

        Ok(stopped.len())
    }

    /// Builds the run context and spawns the first task
    fn launch(&self, site_id: i64, root: String, start: String, single_page: bool) -> CrawlHandle {
        let tasks = self.registry.open(site_id);

        let run = Arc::new(CrawlRun {
            site_id,
            site_root: root.clone(),
            storage: Arc::clone(&self.storage),
            fetcher: Arc::clone(&self.fetcher),
            lemmatizer: Arc::clone(&self.lemmatizer),
            registry: Arc::clone(&self.registry),
            tasks: Arc::clone(&tasks),
            claimed: Mutex::new(HashSet::new()),
            semaphore: Arc::new(Semaphore::new(
                self.config.crawler.max_concurrent_pages_open as usize,
            )),
            single_page,
            index_retries: self.config.crawler.index_retries,
        });

        if let Some(path) = site_relative_path(&start, &root) {
            run.claim(&path);
        }
        spawn_link(&run, start);

        CrawlHandle {
            site_id,
            url: root,
            tasks,
        }
    }
}

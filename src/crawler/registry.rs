//! Site registry for tracking in-flight crawl tasks
//!
//! This module handles:
//! - Per-site sets of in-flight tasks, keyed by canonical link
//! - Abort handles for forced cancellation after a stop request
//! - Waiting for a site's task set to drain and for its final status

use crate::state::SiteStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// In-flight tasks of one site
///
/// A task is registered before it is spawned and deregistered as its very
/// last step, so the count only reaches zero once the whole task tree is done.
#[derive(Debug)]
pub struct SiteTasks {
    in_flight: Mutex<HashMap<String, Option<AbortHandle>>>,
    active: watch::Sender<usize>,
    finished: watch::Sender<Option<SiteStatus>>,
}

impl SiteTasks {
    fn new() -> Self {
        let (active, _) = watch::channel(0);
        let (finished, _) = watch::channel(None);
        Self {
            in_flight: Mutex::new(HashMap::new()),
            active,
            finished,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Option<AbortHandle>>> {
        // the map stays consistent even if a holder panicked
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a task for `link`
    ///
    /// # Returns
    ///
    /// `false` if a task for the link is already in flight
    pub fn register(&self, link: &str) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(link) {
            return false;
        }
        entries.insert(link.to_string(), None);
        self.active.send_replace(entries.len());
        true
    }

    /// Attaches the abort handle of a spawned task
    ///
    /// Ignored if the task already deregistered.
    pub fn attach(&self, link: &str, handle: AbortHandle) {
        if let Some(slot) = self.entries().get_mut(link) {
            *slot = Some(handle);
        }
    }

    /// Removes the task for `link`
    ///
    /// # Returns
    ///
    /// The number of tasks still in flight, or `None` if `link` was not
    /// registered (e.g. after `abort_all`)
    pub fn deregister(&self, link: &str) -> Option<usize> {
        let mut entries = self.entries();
        entries.remove(link)?;
        let remaining = entries.len();
        self.active.send_replace(remaining);
        Some(remaining)
    }

    /// Number of tasks in flight
    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    /// Aborts every task still in flight and clears the set
    ///
    /// # Returns
    ///
    /// The number of tasks that were aborted
    pub fn abort_all(&self) -> usize {
        let mut entries = self.entries();
        let aborted = entries.len();
        for handle in entries.values().flatten() {
            handle.abort();
        }
        entries.clear();
        self.active.send_replace(0);
        aborted
    }

    /// Waits until no task is in flight
    pub async fn drained(&self) {
        let mut receiver = self.active.subscribe();
        // an error means the sender is gone, which cannot happen while &self lives
        let _ = receiver.wait_for(|active| *active == 0).await;
    }

    /// Publishes the final status of the crawl
    pub fn finish(&self, status: SiteStatus) {
        self.finished.send_replace(Some(status));
    }

    /// Waits for the final status of the crawl
    pub async fn finished(&self) -> SiteStatus {
        let mut receiver = self.finished.subscribe();
        let status = match receiver.wait_for(Option::is_some).await {
            Ok(status) => *status,
            Err(_) => None,
        };
        status.unwrap_or(SiteStatus::Failed)
    }
}

/// Registry of in-flight task sets, one per site being crawled
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: Mutex<HashMap<i64, Arc<SiteTasks>>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sites(&self) -> MutexGuard<'_, HashMap<i64, Arc<SiteTasks>>> {
        self.sites
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates an empty task set for a site, replacing any previous one
    pub fn open(&self, site_id: i64) -> Arc<SiteTasks> {
        let tasks = Arc::new(SiteTasks::new());
        self.sites().insert(site_id, Arc::clone(&tasks));
        tasks
    }

    /// Gets the task set of a site
    pub fn get(&self, site_id: i64) -> Option<Arc<SiteTasks>> {
        self.sites().get(&site_id).cloned()
    }

    /// Drops the task set of a site if it is still `tasks`
    pub fn close(&self, site_id: i64, tasks: &Arc<SiteTasks>) {
        let mut sites = self.sites();
        if sites
            .get(&site_id)
            .map(|current| Arc::ptr_eq(current, tasks))
            .unwrap_or(false)
        {
            sites.remove(&site_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_and_deregister() {
        let tasks = SiteTasks::new();

        assert!(tasks.register("https://www.x.com/"));
        assert!(tasks.register("https://www.x.com/a/"));
        assert!(!tasks.register("https://www.x.com/a/"));
        assert_eq!(tasks.active(), 2);

        assert_eq!(tasks.deregister("https://www.x.com/a/"), Some(1));
        assert_eq!(tasks.deregister("https://www.x.com/"), Some(0));
        assert_eq!(tasks.deregister("https://www.x.com/"), None);
        assert_eq!(tasks.active(), 0);
    }

    #[test]
    fn test_registry_open_replaces() {
        let registry = SiteRegistry::new();

        let first = registry.open(1);
        first.register("a");
        let second = registry.open(1);

        assert_eq!(second.active(), 0);
        assert!(Arc::ptr_eq(&registry.get(1).unwrap(), &second));

        // a stale set does not close the current one
        registry.close(1, &first);
        assert!(registry.get(1).is_some());
        registry.close(1, &second);
        assert!(registry.get(1).is_none());
    }

    #[tokio::test]
    async fn test_drained_waits_for_last_task() {
        let tasks = Arc::new(SiteTasks::new());
        tasks.register("root");

        let waiter = {
            let tasks = Arc::clone(&tasks);
            tokio::spawn(async move { tasks.drained().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tasks.deregister("root");
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_abort_all() {
        let tasks = SiteTasks::new();
        tasks.register("slow");

        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tasks.attach("slow", handle.abort_handle());

        assert_eq!(tasks.abort_all(), 1);
        assert_eq!(tasks.active(), 0);
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_finished_reports_status() {
        let tasks = Arc::new(SiteTasks::new());

        let waiter = {
            let tasks = Arc::clone(&tasks);
            tokio::spawn(async move { tasks.finished().await })
        };
        tasks.finish(SiteStatus::Indexed);

        assert_eq!(waiter.await.unwrap(), SiteStatus::Indexed);
    }
}

//! Statistics generation from the index database
//!
//! This module provides functionality for extracting and displaying
//! per-site indexing statistics from the storage layer.

use crate::config::Config;
use crate::state::SiteStatus;
use crate::storage::Storage;
use crate::url::site_root;
use crate::SearchEngineError;
use serde::Serialize;

/// Index statistics over every configured site
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub total: TotalStatistics,
    pub detailed: Vec<SiteStatistics>,
}

/// Totals over the configured sites
#[derive(Debug, Clone, Serialize)]
pub struct TotalStatistics {
    pub sites: u64,
    pub pages: u64,
    pub lemmas: u64,
    /// True while any configured site is INDEXING
    pub indexing: bool,
}

/// Statistics of one configured site
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    /// RFC 3339 time of the last status change; empty if never crawled
    pub status_time: String,
    /// Last error; empty when there is none
    pub error: String,
    pub pages: u64,
    pub lemmas: u64,
}

/// Loads statistics from storage
///
/// Configured sites that were never crawled are reported as FAILED with no
/// error and zero counts.
///
/// # Arguments
///
/// * `config` - Configuration listing the sites
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StatisticsReport)` - Successfully loaded statistics
/// * `Err(SearchEngineError)` - Failed to query statistics
pub fn statistics(
    config: &Config,
    storage: &dyn Storage,
) -> Result<StatisticsReport, SearchEngineError> {
    let mut detailed = Vec::with_capacity(config.sites.len());
    let mut indexing = false;

    for entry in &config.sites {
        let root = site_root(&entry.url)?;

        let stats = match storage.get_site_by_url(&root)? {
            Some(site) => {
                indexing |= site.status == SiteStatus::Indexing;
                SiteStatistics {
                    url: site.url.trim_end_matches('/').to_string(),
                    name: entry.name.clone(),
                    status: site.status,
                    status_time: site.status_time,
                    error: site.last_error.unwrap_or_default(),
                    pages: storage.count_pages(Some(site.id))?,
                    lemmas: storage.count_lemmas(Some(site.id))?,
                }
            }
            None => SiteStatistics {
                url: root.trim_end_matches('/').to_string(),
                name: entry.name.clone(),
                status: SiteStatus::Failed,
                status_time: String::new(),
                error: String::new(),
                pages: 0,
                lemmas: 0,
            },
        };
        detailed.push(stats);
    }

    let total = TotalStatistics {
        sites: detailed.len() as u64,
        pages: detailed.iter().map(|s| s.pages).sum(),
        lemmas: detailed.iter().map(|s| s.lemmas).sum(),
        indexing,
    };

    Ok(StatisticsReport { total, detailed })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The statistics to display
pub fn print_statistics(report: &StatisticsReport) {
    println!("=== Index Statistics ===\n");

    println!("Overview:");
    println!("  Sites: {}", report.total.sites);
    println!("  Pages: {}", report.total.pages);
    println!("  Lemmas: {}", report.total.lemmas);
    println!(
        "  Indexing: {}",
        if report.total.indexing { "yes" } else { "no" }
    );
    println!();

    println!("Sites:");
    for site in &report.detailed {
        println!("  {} ({})", site.name, site.url);
        println!("    Status: {}", site.status);
        if !site.status_time.is_empty() {
            println!("    Since: {}", site.status_time);
        }
        println!("    Pages: {}, lemmas: {}", site.pages, site.lemmas);
        if !site.error.is_empty() {
            println!("    Error: {}", site.error);
        }
    }
}

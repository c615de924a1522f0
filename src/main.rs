//! Sitesearch main entry point
//!
//! This is the command-line interface for the Sitesearch crawler and search engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitesearch::config::{load_config, Config};
use sitesearch::crawler::{CrawlHandle, Coordinator};
use sitesearch::lemma::PlainLemmatizer;
use sitesearch::output::{print_statistics, statistics};
use sitesearch::search::SearchEngine;
use sitesearch::storage::open_storage;
use sitesearch::SiteStatus;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// Sitesearch: crawl configured sites and search them by lemma
///
/// Sitesearch crawls every page of the configured websites, builds a
/// lemma-based inverted index of their text, and answers ranked full-text
/// queries with highlighted snippets.
#[derive(Parser, Debug)]
#[command(name = "sitesearch")]
#[command(version = "1.0.0")]
#[command(about = "A lemma-indexing site crawler and search engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-crawl all configured sites, or one of them
    Crawl {
        /// URL of a configured site
        #[arg(long)]
        site: Option<String>,
    },

    /// Stop every site that is being indexed
    Stop,

    /// Re-fetch and re-index a single page
    IndexPage {
        /// URL of the page; must belong to a configured site
        url: String,
    },

    /// Search the index and print the result as JSON
    Search {
        query: String,

        /// Restrict the search to one site
        #[arg(long)]
        site: Option<String>,

        /// Results to skip
        #[arg(long)]
        offset: Option<usize>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show per-site indexing statistics
    Stats {
        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!(
        "Configuration loaded successfully ({} sites)",
        config.sites.len()
    );

    match cli.command {
        Command::Crawl { site } => handle_crawl(config, site.as_deref()).await,
        Command::Stop => handle_stop(config).await,
        Command::IndexPage { url } => handle_index_page(config, &url).await,
        Command::Search {
            query,
            site,
            offset,
            limit,
        } => handle_search(&config, &query, site.as_deref(), offset, limit),
        Command::Stats { json } => handle_stats(&config, json),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitesearch=info,warn"),
            1 => EnvFilter::new("sitesearch=debug,info"),
            2 => EnvFilter::new("sitesearch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the crawl command: crawls until done or until Ctrl-C
async fn handle_crawl(config: Config, site: Option<&str>) -> Result<()> {
    let coordinator = Coordinator::new(config)?;
    let handles = coordinator.start_crawl(site)?;
    tracing::info!("Crawling {} sites", handles.len());

    let mut waits = spawn_waits(handles);

    let interrupted = tokio::select! {
        _ = report_finished(&mut waits) => false,
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        tracing::info!("Interrupted, stopping crawl");
        match coordinator.stop_crawl().await {
            Ok(count) => tracing::info!("Stopped {} sites", count),
            Err(e) => tracing::warn!("Stop failed: {}", e),
        }
        report_finished(&mut waits).await;
    }

    Ok(())
}

fn spawn_waits(handles: Vec<CrawlHandle>) -> JoinSet<(String, SiteStatus)> {
    let mut waits = JoinSet::new();
    for handle in handles {
        waits.spawn(async move {
            let url = handle.url().to_string();
            (url, handle.wait().await)
        });
    }
    waits
}

async fn report_finished(waits: &mut JoinSet<(String, SiteStatus)>) {
    while let Some(joined) = waits.join_next().await {
        match joined {
            Ok((url, status)) => println!("{}: {}", url, status),
            Err(e) => tracing::error!("Crawl watcher failed: {}", e),
        }
    }
}

/// Handles the stop command
async fn handle_stop(config: Config) -> Result<()> {
    let coordinator = Coordinator::new(config)?;
    let count = coordinator.stop_crawl().await?;
    println!("Stopped {} sites", count);
    Ok(())
}

/// Handles the index-page command
async fn handle_index_page(config: Config, url: &str) -> Result<()> {
    let coordinator = Coordinator::new(config)?;
    let handle = coordinator.index_single_page(url)?;
    let site = handle.url().to_string();
    let status = handle.wait().await;
    println!("{}: {}", site, status);
    Ok(())
}

/// Handles the search command
fn handle_search(
    config: &Config,
    query: &str,
    site: Option<&str>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let engine = SearchEngine::new(
        Arc::new(Mutex::new(storage)),
        Arc::new(PlainLemmatizer::new()),
        config.search.clone(),
    );

    let result = engine.search(query, site, offset, limit);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Handles the stats command
fn handle_stats(config: &Config, json: bool) -> Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let report = statistics(config, &storage)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Database: {}\n", config.output.database_path);
        print_statistics(&report);
    }
    Ok(())
}

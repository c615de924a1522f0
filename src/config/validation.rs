use crate::config::types::{Config, CrawlerConfig, SearchConfig, SiteEntry, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_search_config(&config.search)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_pages_open < 1 || config.max_concurrent_pages_open > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_pages_open must be between 1 and 100, got {}",
            config.max_concurrent_pages_open
        )));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.fetch_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "fetch_retries must be <= 10, got {}",
            config.fetch_retries
        )));
    }

    if config.index_retries < 1 {
        return Err(ConfigError::Validation(
            "index_retries must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(referrer) = &config.referrer {
        Url::parse(referrer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referrer: {}", e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates query engine tuning
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.default_limit < 1 {
        return Err(ConfigError::Validation(
            "default_limit must be >= 1".to_string(),
        ));
    }

    if config.frequent_lemma_percent < 1 || config.frequent_lemma_percent > 100 {
        return Err(ConfigError::Validation(format!(
            "frequent_lemma_percent must be between 1 and 100, got {}",
            config.frequent_lemma_percent
        )));
    }

    Ok(())
}

/// Validates the configured site list
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    if sites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[sites]] entry is required".to_string(),
        ));
    }

    let mut roots = HashSet::new();
    for site in sites {
        if site.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Site '{}' must have a name",
                site.url
            )));
        }

        let root = crate::url::site_root(&site.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid site URL '{}': {}", site.url, e))
        })?;

        if !roots.insert(root.clone()) {
            return Err(ConfigError::Validation(format!(
                "Site '{}' is configured more than once",
                root
            )));
        }
    }

    Ok(())
}

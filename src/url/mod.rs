//! URL handling module for Sitesearch
//!
//! This module provides link canonicalization for the crawler and the
//! helpers that relate URLs to configured sites.

mod canonical;

// Re-export main functions
pub use canonical::{canonicalize, same_site, site_relative_path, site_root};

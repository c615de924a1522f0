//! Search module
//!
//! Turns a query into a ranked, paginated list of pages with highlighted
//! snippets.

mod engine;
mod snippet;
mod types;

pub use engine::{SearchEngine, EMPTY_QUERY, SITE_NOT_FOUND, UNRECOGNIZED_QUERY};
pub use snippet::build_snippet;
pub use types::{SearchItem, SearchResult};

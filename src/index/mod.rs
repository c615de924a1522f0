//! Index maintenance module
//!
//! Keeps per-site lemma frequencies and per-page postings consistent as
//! pages are indexed, re-indexed and removed.

mod maintainer;

pub use maintainer::{reindex_page, remove_page, IndexDelta};

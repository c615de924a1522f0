//! Output module for reporting on the index
//!
//! This module handles per-site statistics, both as a serializable report
//! and as terminal output.

pub mod stats;

pub use stats::{print_statistics, statistics, SiteStatistics, StatisticsReport, TotalStatistics};

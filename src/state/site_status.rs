/// Site status definitions for tracking indexing progress
///
/// A site row moves `Indexing -> Indexed` when a crawl drains normally and
/// `Indexing -> Failed` on a stop request or an unreachable root page.
use serde::Serialize;
use std::fmt;

/// Indexing lifecycle of a configured site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    /// A crawl of the site is in progress
    Indexing,

    /// The last crawl completed
    Indexed,

    /// The last crawl was stopped or could not reach the site
    Failed,
}

impl SiteStatus {
    /// Returns true once no crawl is running for the site
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Indexing)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Indexing => "INDEXING",
            Self::Indexed => "INDEXED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "INDEXING" => Some(Self::Indexing),
            "INDEXED" => Some(Self::Indexed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

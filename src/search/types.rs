use serde::Serialize;

/// Outcome of a search request, serialized as the JSON response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub result: bool,
    /// Matching pages before pagination
    pub count: usize,
    pub data: Vec<SearchItem>,
    /// Empty on success
    pub error: String,
}

impl SearchResult {
    pub fn success(count: usize, data: Vec<SearchItem>) -> Self {
        Self {
            result: true,
            count,
            data,
            error: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: false,
            count: 0,
            data: Vec::new(),
            error: message.into(),
        }
    }
}

/// One ranked page of a search result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    /// Site root URL without trailing slash
    pub site: String,
    pub site_name: String,
    /// Site-relative path of the page
    pub uri: String,
    pub title: String,
    pub snippet: String,
    /// Relevance relative to the best match (1.0 for the top page)
    pub relevance: f64,
}

use crate::config::SearchConfig;
use crate::crawler::parse_html;
use crate::lemma::{lemma_set, Lemmatizer};
use crate::search::snippet::build_snippet;
use crate::search::types::{SearchItem, SearchResult};
use crate::storage::{lock_storage, LemmaRecord, PostingRecord, SharedStorage, SqliteStorage, Storage};
use crate::url::site_root;
use crate::Result;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const EMPTY_QUERY: &str = "empty query";
pub const UNRECOGNIZED_QUERY: &str = "unrecognized query text";
pub const SITE_NOT_FOUND: &str = "site not found";

/// A query lemma together with every matching lemma row in the searched scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueryTerm {
    pub value: String,
    /// Summed frequency of the rows
    pub frequency: u64,
    pub lemma_ids: Vec<i64>,
}

/// Ranked full-text search over the lemma index
pub struct SearchEngine {
    storage: SharedStorage,
    lemmatizer: Arc<dyn Lemmatizer>,
    settings: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        storage: SharedStorage,
        lemmatizer: Arc<dyn Lemmatizer>,
        settings: SearchConfig,
    ) -> Self {
        Self {
            storage,
            lemmatizer,
            settings,
        }
    }

    /// Searches the index
    ///
    /// # Arguments
    ///
    /// * `query` - Free text; a page must contain every indexed lemma of it
    /// * `site` - Restricts the search to one site's URL
    /// * `offset` - Results to skip (default 0)
    /// * `limit` - Page size (default `default-limit`)
    ///
    /// # Returns
    ///
    /// A success result with the total match count and the requested page,
    /// or an error result. Failures never surface as `Err`.
    pub fn search(
        &self,
        query: &str,
        site: Option<&str>,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> SearchResult {
        info!(
            "Searching \"{}\"{} (offset {:?}, limit {:?})",
            query,
            site.map(|s| format!(" on {}", s)).unwrap_or_default(),
            offset,
            limit
        );

        match self.run(query, site, offset, limit) {
            Ok(result) => {
                info!("Search finished, {} results", result.count);
                result
            }
            Err(e) => {
                error!("Search for \"{}\" failed: {}", query, e);
                SearchResult::error(format!("search failed: {}", e))
            }
        }
    }

    fn run(
        &self,
        query: &str,
        site: Option<&str>,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Result<SearchResult> {
        if query.trim().is_empty() {
            return Ok(SearchResult::error(EMPTY_QUERY));
        }

        let values: Vec<String> = lemma_set(self.lemmatizer.as_ref(), query)
            .into_iter()
            .collect();
        if values.is_empty() {
            return Ok(SearchResult::error(UNRECOGNIZED_QUERY));
        }

        let storage = lock_storage(&self.storage)?;

        let site_id = match site {
            Some(url) => match find_site(&storage, url)? {
                Some(id) => Some(id),
                None => return Ok(SearchResult::error(SITE_NOT_FOUND)),
            },
            None => None,
        };

        // query lemmas without a row are ignored
        let terms = group_terms(storage.lemmas_by_values(&values, site_id)?);
        if terms.is_empty() {
            debug!("No query lemma is indexed");
            return Ok(SearchResult::success(0, Vec::new()));
        }

        let terms = if values.len() > 2 {
            drop_frequent(terms, self.settings.frequent_lemma_percent)
        } else {
            terms
        };
        debug!(
            "Searching by lemmas: {}",
            terms
                .iter()
                .map(|t| t.value.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let lemma_ids: Vec<i64> = terms
            .iter()
            .flat_map(|t| t.lemma_ids.iter().copied())
            .collect();
        let postings = storage.postings_for_lemmas(&lemma_ids)?;

        let candidates = intersect_pages(&terms, &postings);
        let ranked = rank_pages(&candidates, &postings);
        let count = ranked.len();

        let highlight: HashSet<String> = terms.into_iter().map(|t| t.value).collect();
        let offset = offset.unwrap_or(0);
        let limit = limit.unwrap_or(self.settings.default_limit);

        let mut data = Vec::new();
        for (page_id, relevance) in ranked.into_iter().skip(offset).take(limit) {
            if let Some(item) = self.render_item(&storage, page_id, relevance, &highlight)? {
                data.push(item);
            }
        }

        Ok(SearchResult::success(count, data))
    }

    fn render_item(
        &self,
        storage: &SqliteStorage,
        page_id: i64,
        relevance: f64,
        highlight: &HashSet<String>,
    ) -> Result<Option<SearchItem>> {
        let Some(page) = storage.get_page(page_id)? else {
            return Ok(None);
        };
        let Some(site) = storage.get_site(page.site_id)? else {
            return Ok(None);
        };

        let parsed = parse_html(&page.content);
        let snippet = build_snippet(
            self.lemmatizer.as_ref(),
            &parsed.text,
            highlight,
            self.settings.snippet_radius,
            self.settings.snippet_max_length,
        );

        Ok(Some(SearchItem {
            site: site.url.trim_end_matches('/').to_string(),
            site_name: site.name,
            uri: page.path,
            title: parsed.title.unwrap_or_default(),
            snippet,
            relevance,
        }))
    }
}

fn find_site(storage: &SqliteStorage, url: &str) -> Result<Option<i64>> {
    let Ok(root) = site_root(url) else {
        return Ok(None);
    };
    Ok(storage.get_site_by_url(&root)?.map(|site| site.id))
}

/// Groups lemma rows by value, rarest value first
pub(crate) fn group_terms(rows: Vec<LemmaRecord>) -> Vec<QueryTerm> {
    let mut grouped: HashMap<String, QueryTerm> = HashMap::new();
    for row in rows {
        let term = grouped.entry(row.lemma.clone()).or_insert_with(|| QueryTerm {
            value: row.lemma,
            frequency: 0,
            lemma_ids: Vec::new(),
        });
        term.frequency += row.frequency as u64;
        term.lemma_ids.push(row.id);
    }

    let mut terms: Vec<QueryTerm> = grouped.into_values().collect();
    terms.sort_by(|a, b| a.frequency.cmp(&b.frequency).then_with(|| a.value.cmp(&b.value)));
    terms
}

/// Drops terms whose frequency is at least `percent` of the summed frequency
///
/// The rarest term is kept if every term would be dropped. Expects terms in
/// rarest-first order.
pub(crate) fn drop_frequent(terms: Vec<QueryTerm>, percent: u32) -> Vec<QueryTerm> {
    let total: u64 = terms.iter().map(|t| t.frequency).sum();
    let threshold = total as f64 * f64::from(percent) / 100.0;

    let (kept, dropped): (Vec<QueryTerm>, Vec<QueryTerm>) = terms
        .into_iter()
        .partition(|t| (t.frequency as f64) < threshold);

    if !dropped.is_empty() {
        debug!(
            "Dropping frequent lemmas: {}",
            dropped
                .iter()
                .map(|t| t.value.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    if kept.is_empty() {
        return dropped.into_iter().take(1).collect();
    }
    kept
}

/// Intersects the page sets of the terms, rarest first
pub(crate) fn intersect_pages(terms: &[QueryTerm], postings: &[PostingRecord]) -> BTreeSet<i64> {
    let mut pages_by_lemma: HashMap<i64, BTreeSet<i64>> = HashMap::new();
    for posting in postings {
        pages_by_lemma
            .entry(posting.lemma_id)
            .or_default()
            .insert(posting.page_id);
    }

    let mut result: Option<BTreeSet<i64>> = None;
    for term in terms {
        let pages: BTreeSet<i64> = term
            .lemma_ids
            .iter()
            .filter_map(|id| pages_by_lemma.get(id))
            .flatten()
            .copied()
            .collect();

        let next = match result {
            None => pages,
            Some(acc) => acc.intersection(&pages).copied().collect(),
        };
        let empty = next.is_empty();
        result = Some(next);
        if empty {
            break;
        }
    }

    result.unwrap_or_default()
}

/// Computes relative relevance for candidate pages
///
/// Absolute relevance is the summed rank of the given postings on a page;
/// relative relevance divides it by the best page's. Sorted by relevance,
/// highest first, then by page ID.
pub(crate) fn rank_pages(candidates: &BTreeSet<i64>, postings: &[PostingRecord]) -> Vec<(i64, f64)> {
    let mut absolute: HashMap<i64, u64> = HashMap::new();
    for posting in postings {
        if candidates.contains(&posting.page_id) {
            *absolute.entry(posting.page_id).or_insert(0) += posting.rank as u64;
        }
    }

    let max = absolute.values().copied().max().unwrap_or(0);
    let mut ranked: Vec<(i64, f64)> = absolute
        .into_iter()
        .map(|(page_id, sum)| {
            let relevance = if max == 0 { 0.0 } else { sum as f64 / max as f64 };
            (page_id, relevance)
        })
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

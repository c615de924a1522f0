use crate::storage::{Storage, StorageResult};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Changes applied to the index by one maintainer call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    /// Lemma rows created with frequency 1
    pub created: usize,
    /// Existing lemma rows whose frequency went up
    pub incremented: usize,
    /// Lemma rows whose frequency went down
    pub decremented: usize,
    /// Lemma rows deleted after dropping below 1
    pub removed: usize,
    /// Postings written for the page
    pub postings: usize,
}

/// Replaces a page's contribution to the index
///
/// The page's old postings are deleted, lemmas it no longer contains are
/// decremented (and deleted below 1), lemmas it newly contains are created or
/// incremented, and one posting per lemma is written with `rank` set to the
/// occurrence count. A lemma present both before and after keeps its row and
/// frequency untouched. Everything runs in one transaction; a failed attempt
/// is rolled back and the whole operation is retried.
///
/// # Arguments
///
/// * `storage` - Storage backend
/// * `site_id` - Site owning the page
/// * `page_id` - Page being (re)indexed
/// * `previous_lemma_ids` - Lemma IDs the page had postings for before this call
/// * `new_counts` - Lemma value to occurrence count on the page
/// * `attempts` - Maximum number of attempts
///
/// # Returns
///
/// * `Ok(IndexDelta)` - Summary of the applied changes
/// * `Err(StorageError)` - The last attempt's error; nothing was applied
pub fn reindex_page<S: Storage + ?Sized>(
    storage: &mut S,
    site_id: i64,
    page_id: i64,
    previous_lemma_ids: &[i64],
    new_counts: &HashMap<String, u32>,
    attempts: u32,
) -> StorageResult<IndexDelta> {
    with_retries(storage, attempts, page_id, |storage| {
        apply_reindex(storage, site_id, page_id, previous_lemma_ids, new_counts)
    })
}

/// Removes a page and its contribution to the index
///
/// Used before a single page is fetched again, so the refetch starts clean.
///
/// # Returns
///
/// * `Ok(IndexDelta)` - Decremented and removed lemma counts
pub fn remove_page<S: Storage + ?Sized>(
    storage: &mut S,
    page_id: i64,
    attempts: u32,
) -> StorageResult<IndexDelta> {
    with_retries(storage, attempts, page_id, |storage| {
        let previous = storage.lemma_ids_for_page(page_id)?;
        storage.delete_postings_for_page(page_id)?;

        let mut delta = IndexDelta::default();
        release_lemmas(storage, &previous, &HashSet::new(), &mut delta)?;

        storage.delete_page(page_id)?;
        Ok(delta)
    })
}

fn with_retries<S, F>(
    storage: &mut S,
    attempts: u32,
    page_id: i64,
    mut operation: F,
) -> StorageResult<IndexDelta>
where
    S: Storage + ?Sized,
    F: FnMut(&mut S) -> StorageResult<IndexDelta>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match run_in_transaction(storage, &mut operation) {
            Ok(delta) => return Ok(delta),
            Err(e) => {
                if let Err(rollback_err) = storage.rollback() {
                    warn!("Rollback failed for page {}: {}", page_id, rollback_err);
                }
                if attempt >= attempts {
                    return Err(e);
                }
                warn!(
                    "Index update for page {} failed (attempt {}/{}): {}",
                    page_id, attempt, attempts, e
                );
                attempt += 1;
            }
        }
    }
}

fn run_in_transaction<S, F>(storage: &mut S, operation: &mut F) -> StorageResult<IndexDelta>
where
    S: Storage + ?Sized,
    F: FnMut(&mut S) -> StorageResult<IndexDelta>,
{
    storage.begin()?;
    let delta = operation(storage)?;
    storage.commit()?;
    Ok(delta)
}

fn apply_reindex<S: Storage + ?Sized>(
    storage: &mut S,
    site_id: i64,
    page_id: i64,
    previous_lemma_ids: &[i64],
    new_counts: &HashMap<String, u32>,
) -> StorageResult<IndexDelta> {
    let mut delta = IndexDelta::default();

    storage.delete_postings_for_page(page_id)?;

    let mut values: Vec<String> = new_counts.keys().cloned().collect();
    values.sort();

    let existing: HashMap<String, i64> = storage
        .find_lemmas(site_id, &values)?
        .into_iter()
        .map(|lemma| (lemma.lemma, lemma.id))
        .collect();

    let previous: HashSet<i64> = previous_lemma_ids.iter().copied().collect();
    let retained: HashSet<i64> = existing
        .values()
        .copied()
        .filter(|id| previous.contains(id))
        .collect();

    release_lemmas(storage, previous_lemma_ids, &retained, &mut delta)?;

    for value in &values {
        let lemma_id = match existing.get(value) {
            Some(&id) => {
                if !retained.contains(&id) {
                    storage.increment_lemma(id)?;
                    delta.incremented += 1;
                }
                id
            }
            None => {
                delta.created += 1;
                storage.insert_lemma(site_id, value)?
            }
        };

        let rank = new_counts.get(value).copied().unwrap_or_default();
        storage.insert_posting(page_id, lemma_id, rank)?;
        delta.postings += 1;
    }

    debug!(
        "Page {} indexed: {} new, {} up, {} down, {} removed lemmas",
        page_id, delta.created, delta.incremented, delta.decremented, delta.removed
    );
    Ok(delta)
}

/// Decrements every previous lemma not in `keep`, deleting rows that drop below 1
fn release_lemmas<S: Storage + ?Sized>(
    storage: &mut S,
    previous_lemma_ids: &[i64],
    keep: &HashSet<i64>,
    delta: &mut IndexDelta,
) -> StorageResult<()> {
    let mut seen = HashSet::new();
    for &lemma_id in previous_lemma_ids {
        if keep.contains(&lemma_id) || !seen.insert(lemma_id) {
            continue;
        }
        if storage.decrement_lemma(lemma_id)? {
            delta.removed += 1;
        } else {
            delta.decremented += 1;
        }
    }
    Ok(())
}

//! Lemmatization module
//!
//! The `Lemmatizer` trait is the seam to language-specific morphology. The
//! helpers here turn text into lemma counts for indexing and into lemma sets
//! for querying.

mod plain;

pub use plain::PlainLemmatizer;

use std::collections::{BTreeSet, HashMap};

/// Morphological analysis used by the indexer and the query engine
pub trait Lemmatizer: Send + Sync {
    /// Returns true if the word can be analysed at all
    fn is_valid_word(&self, word: &str) -> bool;

    /// Returns true for prepositions, conjunctions, particles and interjections
    fn is_function_word(&self, word: &str) -> bool;

    /// Returns the dictionary forms of a word, most likely first
    fn normal_forms(&self, word: &str) -> Vec<String>;
}

/// Splits text into lower-cased words on every non-letter character
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Returns the lemma a single word is indexed under, if any
///
/// Invalid words and function words have no lemma.
pub fn first_normal_form(lemmatizer: &dyn Lemmatizer, word: &str) -> Option<String> {
    let word = word.to_lowercase();
    if word.is_empty() || !lemmatizer.is_valid_word(&word) || lemmatizer.is_function_word(&word) {
        return None;
    }
    lemmatizer.normal_forms(&word).into_iter().next()
}

/// Counts lemma occurrences in a text
///
/// # Returns
///
/// A map of lemma to the number of words in `text` that normalize to it
pub fn collect_lemmas(lemmatizer: &dyn Lemmatizer, text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for word in words(text) {
        if let Some(lemma) = first_normal_form(lemmatizer, &word) {
            *counts.entry(lemma).or_insert(0) += 1;
        }
    }
    counts
}

/// Returns the distinct lemmas of a text (used for search queries)
pub fn lemma_set(lemmatizer: &dyn Lemmatizer, text: &str) -> BTreeSet<String> {
    words(text)
        .filter_map(|word| first_normal_form(lemmatizer, &word))
        .collect()
}

use crate::lemma::Lemmatizer;
use std::collections::HashSet;

/// Function words excluded from the index
const FUNCTION_WORDS: &[&str] = &[
    // English
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "if", "in", "into",
    "is", "it", "nor", "of", "off", "on", "or", "so", "than", "that", "the", "then", "to", "up",
    "via", "was", "with", "yet", "oh", "ah", "wow", "hey",
    // Russian
    "и", "в", "во", "не", "на", "с", "со", "к", "ко", "по", "за", "из", "изо", "от", "ото", "до",
    "о", "об", "обо", "у", "для", "без", "над", "под", "при", "про", "через", "а", "но", "или",
    "либо", "да", "же", "ли", "бы", "ну", "ни", "что", "чтобы", "как", "ах", "ох", "эх", "ой",
];

/// Default lemmatizer without morphology
///
/// Accepts alphabetic words of at least two letters; the normal form of a
/// word is the word itself, lower-cased.
#[derive(Debug, Clone)]
pub struct PlainLemmatizer {
    function_words: HashSet<&'static str>,
}

impl PlainLemmatizer {
    pub fn new() -> Self {
        Self {
            function_words: FUNCTION_WORDS.iter().copied().collect(),
        }
    }
}

impl Default for PlainLemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lemmatizer for PlainLemmatizer {
    fn is_valid_word(&self, word: &str) -> bool {
        word.chars().count() >= 2 && word.chars().all(char::is_alphabetic)
    }

    fn is_function_word(&self, word: &str) -> bool {
        self.function_words.contains(word.to_lowercase().as_str())
    }

    fn normal_forms(&self, word: &str) -> Vec<String> {
        vec![word.to_lowercase()]
    }
}

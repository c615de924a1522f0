use crate::lemma::{first_normal_form, words, Lemmatizer};
use std::collections::HashSet;

/// Builds a snippet of `text` highlighting words whose lemma is in `lemmas`
///
/// Text is scanned in word order. Each hit is wrapped in `<b>..</b>` and kept
/// with `radius` words on either side; words inside a kept window are not
/// scanned again. Windows are joined with `" ... "` and scanning stops once
/// the snippet is longer than `max_len` characters. A non-empty snippet ends
/// with `" ..."`; a text without hits gives an empty snippet. Page text is
/// HTML-escaped so only the highlight tags are markup.
pub fn build_snippet(
    lemmatizer: &dyn Lemmatizer,
    text: &str,
    lemmas: &HashSet<String>,
    radius: usize,
    max_len: usize,
) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut shown: Vec<String> = tokens.iter().map(|token| escape_html(token)).collect();
    let mut windows: Vec<String> = Vec::new();
    let mut length = 0;

    let mut i = 0;
    while i < tokens.len() {
        if !is_hit(lemmatizer, tokens[i], lemmas) {
            i += 1;
            continue;
        }

        shown[i] = format!("<b>{}</b>", shown[i]);
        let start = i.saturating_sub(radius);
        let end = (i + radius + 1).min(tokens.len());
        let window = shown[start..end].join(" ");

        if !windows.is_empty() {
            length += " ... ".len();
        }
        length += window.chars().count();
        windows.push(window);

        if length > max_len {
            break;
        }
        i += radius + 1;
    }

    if windows.is_empty() {
        return String::new();
    }
    format!("{} ...", windows.join(" ... "))
}

/// Escapes text so it can sit next to the `<b>` markup
fn escape_html(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn is_hit(lemmatizer: &dyn Lemmatizer, token: &str, lemmas: &HashSet<String>) -> bool {
    words(token).any(|word| {
        first_normal_form(lemmatizer, &word)
            .map(|lemma| lemmas.contains(&lemma))
            .unwrap_or(false)
    })
}

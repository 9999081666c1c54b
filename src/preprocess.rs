//! Text normalisation and clause splitting.
//!
//! [`preprocess_text`] is the normalisation the risk classifier was trained
//! on; changing it silently shifts every prediction.

use regex::Regex;
use std::sync::OnceLock;

fn non_letters() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z\s]").expect("static regex"))
}

fn clause_markers() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d+\.|\([a-z]\)|\bARTICLE\b|\bSECTION\b|\bCLAUSE\b").expect("static regex")
    })
}

/// Lowercase, drop everything except ASCII letters and whitespace, then
/// collapse whitespace runs to single spaces.
///
/// Idempotent: `preprocess_text(&preprocess_text(x)) == preprocess_text(x)`.
pub fn preprocess_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let letters = non_letters().replace_all(&lowered, "");
    normalize_whitespace(&letters)
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a legal document into clauses.
///
/// A new clause starts at every numbered marker (`3.`), lettered marker
/// (`(b)`) and the upper-case keywords `ARTICLE`, `SECTION` and `CLAUSE`.
/// Pieces are trimmed and empty pieces dropped.
pub fn split_into_clauses(text: &str) -> Vec<String> {
    let mut starts: Vec<usize> = clause_markers().find_iter(text).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts.push(text.len());

    starts
        .windows(2)
        .map(|w| text[w[0]..w[1]].trim())
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

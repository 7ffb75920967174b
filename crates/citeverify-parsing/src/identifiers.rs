use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::text_processing::remove_fragment;

/// Strip trailing punctuation and unbalanced trailing brackets from a DOI or URL.
fn clean_identifier(id: &str) -> String {
    const TRAILING: [char; 6] = ['.', ',', ';', ':', '」', '』'];
    let mut id = id.trim_end_matches(TRAILING);

    for (open, close) in [('(', ')'), ('[', ']'), ('{', '}')] {
        while id.ends_with(close) && id.matches(close).count() > id.matches(open).count() {
            id = &id[..id.len() - close.len_utf8()];
            id = id.trim_end_matches(TRAILING);
        }
    }

    id.to_string()
}

/// Extract a DOI from citation text.
///
/// An explicit `doi:` prefix wins; otherwise the first bare `10.NNNN/...`
/// (which also covers `https://doi.org/...` links).
pub fn extract_doi(text: &str) -> Option<String> {
    static PREFIXED_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\bdoi:\s*(10\.\d+/\S+)").unwrap());
    if let Some(caps) = PREFIXED_RE.captures(text) {
        return Some(clean_identifier(&caps[1])).filter(|d| is_plausible_doi(d));
    }

    static BARE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.\d+/\S+").unwrap());
    BARE_RE
        .find(text)
        .map(|m| clean_identifier(m.as_str()))
        .filter(|d| is_plausible_doi(d))
}

/// A DOI needs a non-empty suffix after the registrant slash.
fn is_plausible_doi(doi: &str) -> bool {
    doi.split_once('/').is_some_and(|(_, suffix)| !suffix.is_empty())
}

/// Extract the first `http(s)://` URL from citation text.
pub fn extract_url(text: &str) -> Option<String> {
    static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
    URL_RE.find(text).map(|m| clean_identifier(m.as_str()))
}

/// Extract a publication year: the first run of exactly four ASCII digits that
/// starts with 19 or 20. DOI and URL text is ignored so identifiers such as
/// `10.1145/2020.123` cannot leak a year.
pub fn extract_year(text: &str, doi: &str, url: &str) -> Option<String> {
    let searchable = remove_fragment(&remove_fragment(text, url), doi);

    static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());
    DIGITS_RE
        .find_iter(&searchable)
        .map(|m| m.as_str())
        .find(|run| run.len() == 4 && (run.starts_with("19") || run.starts_with("20")))
        .map(String::from)
}

/// Common words to skip when building search queries.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "of", "and", "or", "for", "to", "in", "on", "with", "by",
    ]
    .into_iter()
    .collect()
});

/// Extract up to `n` significant words from a title for building search queries.
///
/// Skips stop words and very short words, but keeps short alphanumeric
/// terms like "L2", "3D", "AI", "5G". Japanese text has no word spacing, so a
/// run of kana/kanji comes through as a single term.
pub fn get_query_words(title: &str, n: usize) -> Vec<String> {
    static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

    let all_words: Vec<&str> = WORD_RE.find_iter(title).map(|m| m.as_str()).collect();

    let significant: Vec<&str> = all_words
        .iter()
        .copied()
        .filter(|w| is_significant(w))
        .collect();

    if significant.len() >= 3 || (!significant.is_empty() && significant.len() == all_words.len()) {
        significant.into_iter().take(n).map(String::from).collect()
    } else {
        all_words.into_iter().take(n).map(String::from).collect()
    }
}

fn is_significant(w: &str) -> bool {
    if STOP_WORDS.contains(w.to_lowercase().as_str()) {
        return false;
    }
    if !w.is_ascii() {
        return w.chars().count() >= 2;
    }
    if w.len() >= 3 {
        return true;
    }
    // Keep short words that mix letters and digits (technical terms)
    let has_letter = w.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = w.chars().any(|c| c.is_ascii_digit());
    has_letter && has_digit
}

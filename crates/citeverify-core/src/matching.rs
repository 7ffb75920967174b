use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Normalize a title into a dedupe key: alphanumerics only, lowercased.
///
/// Steps (order matters):
/// 1. Unescape common HTML entities
/// 2. Strip inline markup (`<i>`, `<sub>`)
/// 3. NFKC normalization (folds full-width forms to ASCII)
/// 4. Keep only alphanumeric characters in any script
/// 5. Lowercase
pub fn normalize_title(title: &str) -> String {
    static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^>]*>").unwrap());

    let title = unescape_entities(title);
    let title = MARKUP.replace_all(&title, "");
    title
        .nfkc()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn unescape_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

/// Fold case, width and whitespace so similarity ignores them.
fn comparable(text: &str) -> String {
    let folded: String = unescape_entities(text)
        .nfkc()
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein similarity in 0–100: `(maxLen - distance) / maxLen * 100`.
///
/// Case-insensitive; two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = comparable(a);
    let b = comparable(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let distance = rapidfuzz::distance::levenshtein::distance(a.chars(), b.chars());
    (max_len - distance.min(max_len)) as f64 / max_len as f64 * 100.0
}

/// Title similarity, `None` when either side is empty.
pub fn title_similarity(parsed: &str, candidate: &str) -> Option<f64> {
    if parsed.trim().is_empty() || candidate.trim().is_empty() {
        return None;
    }
    Some(similarity(parsed, candidate))
}

/// Journal similarity, `None` when either side is empty.
pub fn journal_similarity(parsed: &str, candidate: &str) -> Option<f64> {
    title_similarity(parsed, candidate)
}

/// Split a title at its first colon into `(main, subtitle)`.
///
/// Handles the ASCII and full-width colon. The subtitle is `None` when there
/// is no colon or nothing follows it.
pub fn split_subtitle(title: &str) -> (&str, Option<&str>) {
    match title.find([':', '：']) {
        Some(pos) => {
            let colon_len = title[pos..].chars().next().map_or(1, char::len_utf8);
            let main = title[..pos].trim();
            let sub = title[pos + colon_len..].trim();
            if sub.is_empty() {
                (main, None)
            } else {
                (main, Some(sub))
            }
        }
        None => (title.trim(), None),
    }
}

/// Parse the leading four-digit year of a field.
pub fn parse_year(year: &str) -> Option<i32> {
    static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());
    YEAR_RE.find(year).and_then(|m| m.as_str().parse().ok())
}

/// Whether two years agree within `tolerance` years.
///
/// Returns false when either side has no year.
pub fn years_match(a: &str, b: &str, tolerance: u32) -> bool {
    match (parse_year(a), parse_year(b)) {
        (Some(a), Some(b)) => a.abs_diff(b) <= tolerance,
        _ => false,
    }
}

/// Year similarity: 100 within tolerance, 0 outside, `None` if either side lacks a year.
pub fn year_similarity(parsed: &str, candidate: &str, tolerance: u32) -> Option<f64> {
    parse_year(parsed)?;
    parse_year(candidate)?;
    Some(if years_match(parsed, candidate, tolerance) {
        100.0
    } else {
        0.0
    })
}

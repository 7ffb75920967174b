//! Display-side author name normalization.
//!
//! Catalogs and citations spell the same person many ways: `"夏目, 漱石, 1867-1916"`,
//! `"夏目／漱石"`, `"Le Guin, Ursula K."`, `"MILLER G. A."`. These functions reduce
//! them to one display form: Japanese names joined without a space, Western
//! names in given-name-first order. Comparison-side matching lives in the core
//! crate and works on top of this output.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text_processing::{collapse_whitespace, contains_japanese};

/// Surname particles that stay attached to the family name.
pub const SURNAME_PARTICLES: &[&str] = &[
    "le", "la", "de", "del", "della", "der", "den", "van", "von", "mac", "mc", "o'", "st.",
    "da", "das", "dos", "du", "el", "al-", "ben-", "di", "bin", "ter", "ten",
];

/// Catalog sources that publish family name first, even in romanization.
const FAMILY_FIRST_SOURCES: &[&str] = &["cinii", "ndl"];

static BIRTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{4}\s*-\s*(?:\d{4})?|-\s*\d{4}|\d{4})$").unwrap());

/// Normalize one author name to its display form.
///
/// `source_hint` names the catalog the string came from (`"cinii"`, `"ndl"`,
/// `"crossref"`, ...), or `None` for names parsed out of a citation.
pub fn normalize_author_name(raw: &str, source_hint: Option<&str>) -> String {
    let name = collapse_whitespace(raw);
    if name.is_empty() {
        return String::new();
    }
    if name.eq_ignore_ascii_case("et al.") || name.eq_ignore_ascii_case("et al") {
        return "et al.".to_string();
    }

    if contains_japanese(&name) {
        // 姓・名・1867-1916 / 姓, 名, 1867-1916
        static DOT_YEAR: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^([^\s・,]+)\s*[・,]\s*([^\s・,]+)\s*[・,]\s*\d{4}\s*-?\s*(?:\d{4})?$")
                .unwrap()
        });
        if let Some(caps) = DOT_YEAR.captures(&name) {
            return format!("{}{}", &caps[1], &caps[2]);
        }

        // 姓／名・1867-1916
        static SLASH: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^([^／/]+?)\s*[／/]\s*([^・,]+?)\s*(?:[・,]\s*\d{4}\s*-?\s*(?:\d{4})?)?$")
                .unwrap()
        });
        if let Some(caps) = SLASH.captures(&name) {
            return format!("{}{}", caps[1].trim(), caps[2].trim());
        }
    }

    if name.contains(',')
        && let Some(reordered) = reorder_comma_name(&name)
    {
        return reordered;
    }

    // MILLER G. A. → G. A. MILLER
    static CAPS_INITIALS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^([A-Z][A-Z'\-]+)\s+((?:[A-Z]\.\s*)+)$").unwrap()
    });
    if let Some(caps) = CAPS_INITIALS.captures(&name) {
        return format!("{} {}", caps[2].trim(), &caps[1]);
    }

    if let Some(hint) = source_hint
        && FAMILY_FIRST_SOURCES.contains(&hint.to_ascii_lowercase().as_str())
    {
        // NATSUME Soseki → Soseki NATSUME
        static ROMAJI_FAMILY_FIRST: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^([A-Z][A-Z'\-]+)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)$").unwrap()
        });
        if let Some(caps) = ROMAJI_FAMILY_FIRST.captures(&name) {
            return format!("{} {}", &caps[2], &caps[1]);
        }
    }

    fallback_clean(&name)
}

/// `Last, First[, birthyear]`: Japanese joined as 姓名, otherwise `First Last`.
/// Returns `None` when the comma split leaves nothing to reorder.
fn reorder_comma_name(name: &str) -> Option<String> {
    let parts: Vec<String> = name
        .split(',')
        .map(|p| fallback_clean(p.trim()))
        .filter(|p| !p.is_empty() && !BIRTH_YEAR.is_match(p))
        .collect();

    match parts.as_slice() {
        [] => None,
        [single] => Some(single.clone()),
        [last, rest @ ..] => {
            if contains_japanese(last) {
                Some(format!("{}{}", last, rest.concat()))
            } else {
                Some(format!("{} {}", rest.join(" "), last))
            }
        }
    }
}

/// Strip bracketed role annotations and birth-year markers, then join
/// Japanese name parts and collapse whitespace.
fn fallback_clean(name: &str) -> String {
    static BRACKETED: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)|（[^）]*）").unwrap());
    static TRAILING_YEAR: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[,・\s]*\d{4}\s*-\s*(?:\d{4})?\s*$|[,・\s]+\d{4}\s*$").unwrap());

    let name = BRACKETED.replace_all(name, " ");
    let name = TRAILING_YEAR.replace(&name, "");
    let name = collapse_whitespace(&name);

    if contains_japanese(&name) && !name.chars().any(|c| c.is_ascii_alphabetic()) {
        name.chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '・' | '／' | '/'))
            .collect()
    } else {
        name
    }
}

/// Normalize a list of names, dropping empties and exact duplicates (first kept).
pub fn normalize_authors<S: AsRef<str>>(names: &[S], source_hint: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let normalized = normalize_author_name(name.as_ref(), source_hint);
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Whether `token` (lowercased) is a surname particle such as `van` or `de`.
pub fn is_surname_particle(token: &str) -> bool {
    let lower = token.to_lowercase();
    SURNAME_PARTICLES.iter().any(|p| {
        if p.ends_with(['-', '\'']) {
            lower.starts_with(p)
        } else {
            lower == *p
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_separated_with_year() {
        assert_eq!(normalize_author_name("夏目・漱石・1867-1916", None), "夏目漱石");
        assert_eq!(normalize_author_name("夏目, 漱石, 1867-1916", None), "夏目漱石");
    }

    #[test]
    fn test_slash_with_year() {
        assert_eq!(normalize_author_name("夏目／漱石・1867-1916", None), "夏目漱石");
        assert_eq!(normalize_author_name("夏目／漱石", None), "夏目漱石");
    }

    #[test]
    fn test_last_first() {
        assert_eq!(normalize_author_name("Miller, G. A.", None), "G. A. Miller");
        assert_eq!(normalize_author_name("Le Guin, Ursula K.", None), "Ursula K. Le Guin");
        assert_eq!(normalize_author_name("van der Berg, Jan, 1950-", None), "Jan van der Berg");
        assert_eq!(normalize_author_name("坂部, 創一", None), "坂部創一");
    }

    #[test]
    fn test_caps_family_initials() {
        assert_eq!(normalize_author_name("MILLER G. A.", None), "G. A. MILLER");
    }

    #[test]
    fn test_family_first_romanization_hint() {
        assert_eq!(normalize_author_name("NATSUME Soseki", Some("cinii")), "Soseki NATSUME");
        assert_eq!(normalize_author_name("NATSUME Soseki", Some("crossref")), "NATSUME Soseki");
    }

    #[test]
    fn test_fallback() {
        assert_eq!(normalize_author_name("山田 太郎 [著]", None), "山田太郎");
        assert_eq!(normalize_author_name("  John   Smith ", None), "John Smith");
        assert_eq!(normalize_author_name("ジョン・スミス", None), "ジョンスミス");
    }

    #[test]
    fn test_et_al_kept() {
        assert_eq!(normalize_author_name("et al", None), "et al.");
    }

    #[test]
    fn test_normalize_authors_dedupes() {
        let names = ["Miller, G. A.", "G. A. Miller", "", "Smith, J."];
        assert_eq!(normalize_authors(&names, None), vec!["G. A. Miller", "J. Smith"]);
    }

    #[test]
    fn test_particles() {
        assert!(is_surname_particle("Van"));
        assert!(is_surname_particle("O'Brien"));
        assert!(!is_surname_particle("Smith"));
    }
}

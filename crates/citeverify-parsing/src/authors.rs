use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;
use crate::language::Language;
use crate::names::normalize_authors;
use crate::text_processing::{char_len, contains_japanese, trim_field};

/// Extract author names from normalized citation text, in display form.
///
/// Handles:
/// - APA: `Smith, J., & Doe, A. B. (2020). Title...`
/// - MLA: `Smith, John, and Jane Doe. "Title."`
/// - ACM: `John Smith and Jane Doe. 2020. Title...`
/// - Japanese: `坂部創一, 山崎秀夫 (2019). 題目...`, `佐藤 花子 編 (2018)...`
pub fn extract_authors(text: &str, language: Language, config: &ParsingConfig) -> Vec<String> {
    let span = author_span(text, language);
    let section = clean_author_section(span);
    if section.is_empty() {
        return vec![];
    }

    let org_words = config.resolved_organization_words();
    let raw = if contains_japanese(&section) {
        split_japanese_names(&section, &org_words)
    } else {
        split_western_names(&section, &org_words)
    };

    let mut authors = normalize_authors(&raw, None);
    authors.truncate(config.max_authors);
    tracing::debug!(count = authors.len(), "authors extracted");
    authors
}

/// Split an editor list (the `<Editors>` of `In <Editors> (Eds.)` or `〜編`).
pub fn extract_editors(segment: &str, config: &ParsingConfig) -> Vec<String> {
    let section = clean_author_section(segment);
    if section.is_empty() {
        return vec![];
    }
    let org_words = config.resolved_organization_words();
    let raw = if contains_japanese(&section) {
        split_japanese_names(&section, &org_words)
    } else {
        split_western_names(&section, &org_words)
    };
    normalize_authors(&raw, None)
}

/// Text before the first year parenthesis, else before the first quote mark,
/// else before an ACM `. YEAR.` marker, else before the first sentence end.
pub(crate) fn author_span(text: &str, language: Language) -> &str {
    static YEAR_PAREN_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\(\s*(?:19|20)\d{2}").unwrap());
    static QUOTE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"[「『"\u{201C}]"#).unwrap());
    static ACM_YEAR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\.\s+(?:19|20)\d{2}[a-z]?\.").unwrap());

    let end = if let Some(m) = YEAR_PAREN_RE.find(text) {
        m.start()
    } else if let Some(m) = QUOTE_RE.find(text) {
        m.start()
    } else if let Some(m) = ACM_YEAR_RE.find(text) {
        m.start()
    } else {
        first_real_period(text, language).unwrap_or(text.len())
    };

    &text[..end]
}

/// Position of the first period that is not an author initial like `M.`.
fn first_real_period(text: &str, language: Language) -> Option<usize> {
    static PERIOD_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(?:\s|$)").unwrap());

    PERIOD_SPACE.find_iter(text).map(|m| m.start()).find(|&pos| {
        if language.is_japanese() {
            return true;
        }
        let before: Vec<char> = text[..pos].chars().rev().take(2).collect();
        let is_initial = match before.as_slice() {
            [c] => c.is_uppercase(),
            [c, prev] => c.is_uppercase() && !prev.is_alphabetic(),
            _ => false,
        };
        pos > 0 && !is_initial
    })
}

/// Strip parentheticals, role markers and surrounding punctuation.
fn clean_author_section(span: &str) -> String {
    static PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap());
    static ROLE_JA: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?:編著|監修|共編|監訳|編|著|訳)(?:者)?").unwrap());
    static ROLE_EN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(?:^|\s)eds?\.(?:\s|$)").unwrap());

    let section = PARENS.replace_all(span, " ").into_owned();
    let section = if contains_japanese(&section) {
        ROLE_JA.replace_all(&section, " ").into_owned()
    } else {
        section
    };
    let section = ROLE_EN.replace_all(&section, " ");

    // Keep the period of a trailing initial ("Smith, J.")
    static ENDS_WITH_INITIAL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?:^|[\s.\-])[A-Z]\.$").unwrap());
    let trimmed = section.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | ';' | ':' | '&' | '"' | '\u{201C}' | '\u{201D}')
    });
    if trimmed.ends_with('.') && !ENDS_WITH_INITIAL.is_match(trimmed) {
        trimmed.trim_end_matches('.').trim_end().to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_dropped_token(token: &str, org_words: &[String]) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        || org_words.iter().any(|w| token.contains(w.as_str()))
}

/// Split Japanese author text on the usual separators, re-merging family and
/// given names that were separated by spaces.
fn split_japanese_names(section: &str, org_words: &[String]) -> Vec<String> {
    static SEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[、，,・•；;＆&\s]+").unwrap());

    let mut has_et_al = false;
    let tokens: Vec<&str> = SEP_RE
        .split(section)
        .map(trim_field)
        .filter(|t| !t.is_empty())
        .filter(|t| {
            let et_al = matches!(*t, "他" | "ほか" | "等" | "et" | "al" | "al.");
            has_et_al |= et_al;
            !et_al
        })
        .collect();

    let total_chars: usize = tokens.iter().map(|t| char_len(t)).sum();
    let over_split = tokens.len() >= 2 && total_chars <= 3 * tokens.len();

    let mut names: Vec<String> = if over_split {
        tokens.chunks(2).map(|pair| pair.concat()).collect()
    } else {
        tokens.iter().map(|t| t.to_string()).collect()
    };
    names.retain(|n| !is_dropped_token(n, org_words));
    if has_et_al && !names.is_empty() {
        names.push("et al.".to_string());
    }
    names
}

/// Split Western author text, keeping `Surname, Initials` pairs together and a
/// trailing `et al.` literally.
fn split_western_names(section: &str, org_words: &[String]) -> Vec<String> {
    static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),?\s*\bet\s+al\b\.?").unwrap());
    static CONJ_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\s*&\s*|\s+and\s+|\s*;\s*").unwrap());
    static INITIALS_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:[A-Z][a-z]?\.?\s*-?\s*){1,4}$").unwrap());

    let has_et_al = ET_AL_RE.is_match(section);
    let section = ET_AL_RE.replace_all(section, "");
    let section = CONJ_RE.replace_all(&section, ", ");

    let tokens: Vec<&str> = section
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let mut names = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let current = tokens[i];
        let next = tokens.get(i + 1).copied();
        let single_word = |t: &str| t.split_whitespace().count() == 1;

        let pairs_with_next = next.is_some_and(|n| {
            let initials = INITIALS_RE.is_match(n);
            // MLA inverts only the first author: "Smith, John, and Jane Doe"
            let given_name = i == 0 && single_word(current) && single_word(n);
            initials || given_name
        });

        if let (true, Some(given)) = (pairs_with_next, next) {
            names.push(format!("{current}, {given}"));
            i += 2;
        } else {
            names.push(current.to_string());
            i += 1;
        }
    }

    names.retain(|n| !is_dropped_token(n, org_words));
    if has_et_al && !names.is_empty() {
        names.push("et al.".to_string());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en(text: &str) -> Vec<String> {
        extract_authors(text, Language::English, &ParsingConfig::default())
    }

    fn ja(text: &str) -> Vec<String> {
        extract_authors(text, Language::Japanese, &ParsingConfig::default())
    }

    #[test]
    fn test_apa_single() {
        assert_eq!(en("Smith, J. (2020). Machine learning in healthcare."), vec!["J. Smith"]);
    }

    #[test]
    fn test_apa_multiple_with_ampersand() {
        assert_eq!(
            en("Smith, J., Doe, A. B., & Lee, K. (2020). Title here."),
            vec!["J. Smith", "A. B. Doe", "K. Lee"]
        );
    }

    #[test]
    fn test_et_al_kept_literally() {
        assert_eq!(
            en("Smith, J., et al. (2020). Title here."),
            vec!["J. Smith", "et al."]
        );
    }

    #[test]
    fn test_mla_first_author_inverted() {
        assert_eq!(
            en(r#"Smith, John, and Jane Doe. "A Title." Journal, 2019."#),
            vec!["John Smith", "Jane Doe"]
        );
    }

    #[test]
    fn test_acm_given_first() {
        assert_eq!(
            en("Ashish Vaswani and Noam Shazeer. 2017. Attention is all you need."),
            vec!["Ashish Vaswani", "Noam Shazeer"]
        );
    }

    #[test]
    fn test_editor_marker_stripped() {
        assert_eq!(en("Smith, J. (Ed.). (2020). Handbook."), vec!["J. Smith"]);
    }

    #[test]
    fn test_japanese_comma_list() {
        assert_eq!(
            ja("坂部創一, 山崎秀夫 (2019). 研究. キャリア教育研究, 33, 139-146."),
            vec!["坂部創一", "山崎秀夫"]
        );
    }

    #[test]
    fn test_japanese_oversplit_merged() {
        assert_eq!(
            ja("坂部 創一, 山崎 秀夫 (2019). 研究."),
            vec!["坂部創一", "山崎秀夫"]
        );
    }

    #[test]
    fn test_japanese_role_marker_and_org() {
        assert_eq!(ja("佐藤花子編 (2018). 『教育学入門』"), vec!["佐藤花子"]);
        assert_eq!(ja("日本教育学会 (2018). 『教育白書』"), Vec::<String>::new());
    }

    #[test]
    fn test_japanese_et_al() {
        assert_eq!(ja("田中太郎 他 (2020). 『本』"), vec!["田中太郎", "et al."]);
    }

    #[test]
    fn test_editors() {
        let config = ParsingConfig::default();
        assert_eq!(
            extract_editors("S. Hall, D. Hobson, & A. Lowe", &config),
            vec!["S. Hall", "D. Hobson", "A. Lowe"]
        );
        assert_eq!(extract_editors("佐藤花子", &config), vec!["佐藤花子"]);
    }
}

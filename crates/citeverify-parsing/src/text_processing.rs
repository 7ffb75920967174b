use once_cell::sync::Lazy;
use regex::Regex;

/// Expand common typographic ligatures left behind by OCR and PDF copy-paste.
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// Collapse any run of whitespace into a single ASCII space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Hiragana, katakana, CJK unified ideographs, or the iteration mark 々.
pub fn is_japanese_char(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'
        | '\u{30A0}'..='\u{30FF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{3005}')
}

pub fn is_katakana(c: char) -> bool {
    matches!(c, '\u{30A0}'..='\u{30FF}')
}

pub fn contains_japanese(text: &str) -> bool {
    text.chars().any(is_japanese_char)
}

/// Length in characters (not bytes).
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Unify the dash family used in page ranges to an ASCII hyphen and drop inner spaces.
///
/// `"128 – 138"` → `"128-138"`
pub fn normalize_range(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' | '\u{30FC}' | '\u{FF0D}' | '~' | '\u{301C}' => '-',
            other => other,
        })
        .collect()
}

/// Trim whitespace, quote marks, and sentence punctuation from both ends.
pub fn trim_field(text: &str) -> &str {
    text.trim_matches(|c: char| {
        c.is_whitespace()
            || matches!(
                c,
                '.' | ',' | ';' | ':' | '"' | '\u{201C}' | '\u{201D}' | '\'' | '*' | '\u{3000}'
            )
    })
}

/// Remove one layer of surrounding quote or bracket marks, repeatedly, to reach
/// the innermost quoted text.
///
/// `"『「書名」』"` → `"書名"`
pub fn unwrap_quotes(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let mut chars = current.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return current;
        };
        let paired = matches!(
            (first, last),
            ('「', '」') | ('『', '』') | ('"', '"') | ('\u{201C}', '\u{201D}') | ('*', '*')
        );
        if !paired {
            return current;
        }
        current = chars.as_str().trim().to_string();
    }
}

/// Remove every occurrence of `needle` from `haystack` (no-op for an empty needle).
pub(crate) fn remove_fragment(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        haystack.to_string()
    } else {
        haystack.replace(needle, " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_ligatures() {
        assert_eq!(expand_ligatures("e\u{FB03}cient \u{FB01}eld"), "efficient field");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn test_japanese_chars() {
        assert!(is_japanese_char('あ'));
        assert!(is_japanese_char('カ'));
        assert!(is_japanese_char('漢'));
        assert!(is_japanese_char('々'));
        assert!(!is_japanese_char('a'));
        assert!(!is_japanese_char('、'));
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range("128–138"), "128-138");
        assert_eq!(normalize_range("12 — 34"), "12-34");
        assert_eq!(normalize_range("5"), "5");
    }

    #[test]
    fn test_trim_field() {
        assert_eq!(trim_field(" \"Title,\" "), "Title");
        assert_eq!(trim_field("*Nature*."), "Nature");
    }

    #[test]
    fn test_unwrap_quotes_innermost() {
        assert_eq!(unwrap_quotes("『「書名」』"), "書名");
        assert_eq!(unwrap_quotes("plain"), "plain");
        assert_eq!(unwrap_quotes("「」"), "");
    }
}

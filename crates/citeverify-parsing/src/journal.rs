use once_cell::sync::Lazy;
use regex::Regex;

use crate::language::Language;
use crate::text_processing::{char_len, trim_field, unwrap_quotes};
use crate::title::{ExtractedTitle, TitleSource};

/// How the journal/venue was found. Only non-residual sources count as
/// article evidence during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalSource {
    /// Markdown italics `*Journal*`.
    Italic,
    /// Segment right after a quoted title (`「題」『誌』`, `"Title." Journal, 3`).
    Quoted,
    /// Recognized journal-suffix word (研究, 紀要, Journal of …).
    Suffix,
    /// Whatever short segment follows the title.
    Residual,
    #[default]
    None,
}

impl JournalSource {
    /// Explicit venue evidence (anything but the residual fallback).
    pub fn is_evidence(self) -> bool {
        matches!(self, JournalSource::Italic | JournalSource::Quoted | JournalSource::Suffix)
    }
}

/// Japanese venue names end in one of these words.
static JA_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[^\s,.()「」『』:]+(?:学会誌|論文集|研究|学報|紀要|ジャーナル|会誌|評論|報告)(?:誌|集)?",
    )
    .unwrap()
});

/// English venue patterns, most specific first.
static EN_SUFFIX_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "Proceedings of",
            Regex::new(r"Proceedings of (?:the )?[^,.;()]+").unwrap(),
        ),
        ("Journal of", Regex::new(r"(?:[A-Z][\w&\-]*\s+)*Journal of [^,.;()]+").unwrap()),
        (
            "X Journal/Review",
            Regex::new(
                r"(?:[A-Z][\w&\-]*\s+)+(?:Journal|Review|Letters|Transactions|Quarterly|Annals|Bulletin|Magazine)(?: of [^,.;()]+)?",
            )
            .unwrap(),
        ),
    ]
});

/// Whether a string contains a Japanese or English journal-suffix word.
pub fn has_journal_suffix(text: &str) -> bool {
    JA_SUFFIX_RE.is_match(text) || EN_SUFFIX_PATTERNS.iter().any(|(_, re)| re.is_match(text))
}

/// Extract the journal/venue.
///
/// `outside_title` is the normalized text with the title span blanked out.
pub fn extract_journal(
    text: &str,
    outside_title: &str,
    title: &ExtractedTitle,
    language: Language,
) -> (String, JournalSource) {
    if !language.is_japanese()
        && let Some(journal) = italic_journal(text, title)
    {
        tracing::debug!(journal = %journal, "journal from italics");
        return (journal, JournalSource::Italic);
    }

    if let Some(journal) = quoted_adjacent_journal(text, title) {
        tracing::debug!(journal = %journal, "journal next to quoted title");
        return (journal, JournalSource::Quoted);
    }

    if let Some(journal) = suffix_journal(outside_title, language) {
        tracing::debug!(journal = %journal, "journal from suffix pattern");
        return (journal, JournalSource::Suffix);
    }

    if let Some(journal) = residual_journal(text, title) {
        tracing::debug!(journal = %journal, "journal from residual text");
        return (journal, JournalSource::Residual);
    }

    (String::new(), JournalSource::None)
}

fn italic_journal(text: &str, title: &ExtractedTitle) -> Option<String> {
    static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
    ITALIC_RE
        .captures_iter(text)
        .map(|caps| trim_field(&caps[1]).to_string())
        .find(|candidate| {
            !candidate.is_empty()
                && *candidate != title.title_with_subtitle
                && *candidate != title.title
        })
}

/// After 「chapter」 a 『container』 is the venue; after any quoted title a
/// segment followed by volume/pages is the venue.
fn quoted_adjacent_journal(text: &str, title: &ExtractedTitle) -> Option<String> {
    if title.source != TitleSource::Quoted {
        return None;
    }
    let (start, end) = title.span?;
    let after = &text[end..];

    static CONTAINER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*『([^』]+)』").unwrap());
    if text[start..].starts_with('「')
        && let Some(caps) = CONTAINER_RE.captures(after)
    {
        return Some(unwrap_quotes(&caps[1])).filter(|s| !s.is_empty());
    }

    static FOLLOWED_BY_NUMBERS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[\s,.]*([^,.()「」『』]+?)\s*,\s*(?:(?i:vol)\.?\s*)?\d").unwrap()
    });
    FOLLOWED_BY_NUMBERS
        .captures(after)
        .map(|caps| trim_field(&caps[1]).to_string())
        .filter(|s| !s.is_empty() && s.chars().any(char::is_alphabetic))
}

fn suffix_journal(outside_title: &str, language: Language) -> Option<String> {
    if language.is_japanese()
        && let Some(m) = JA_SUFFIX_RE.find(outside_title)
    {
        return Some(trim_field(m.as_str()).to_string());
    }
    for (name, re) in EN_SUFFIX_PATTERNS.iter() {
        if let Some(m) = re.find(outside_title) {
            let journal = trim_field(m.as_str());
            if !journal.is_empty() {
                tracing::trace!(pattern = name, "journal suffix pattern");
                return Some(journal.to_string());
            }
        }
    }
    None
}

/// The first short, non-numeric segment after the title.
fn residual_journal(text: &str, title: &ExtractedTitle) -> Option<String> {
    static DELIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.]\s+|[,.]$").unwrap());
    static META_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\d|^(?:pp?|vol|no|doi)\b|https?://").unwrap());
    static LEADING_IN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^In:?\s+").unwrap());

    let (_, end) = title.span?;
    DELIM
        .split(&text[end..])
        .map(|segment| LEADING_IN.replace(trim_field(segment), "").to_string())
        .map(|segment| unwrap_quotes(&segment))
        .find(|segment| !segment.is_empty())
        .filter(|segment| {
            let len = char_len(segment);
            (3..=30).contains(&len)
                && segment.chars().any(char::is_alphabetic)
                && !META_RE.is_match(segment)
                && !title.title_with_subtitle.contains(segment.as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingConfig;
    use crate::title::extract_title;

    fn journal_of(text: &str, language: Language) -> (String, JournalSource) {
        let title = extract_title(text, language, &ParsingConfig::default());
        let outside = match title.span {
            Some((s, e)) => format!("{} {}", &text[..s], &text[e..]),
            None => text.to_string(),
        };
        extract_journal(text, &outside, &title, language)
    }

    #[test]
    fn test_journal_of() {
        assert_eq!(
            journal_of(
                "Smith, J. (2020). Machine learning in healthcare. Journal of Medical Research, 45(3), 123-145.",
                Language::English
            ),
            ("Journal of Medical Research".to_string(), JournalSource::Suffix)
        );
    }

    #[test]
    fn test_italic() {
        assert_eq!(
            journal_of("Doe, A. (2019). Deep nets. *Nature*, 521, 436-444.", Language::English),
            ("Nature".to_string(), JournalSource::Italic)
        );
    }

    #[test]
    fn test_italic_book_title_is_not_journal() {
        let (journal, source) =
            journal_of("Doe, A. (2019). *A history of reading*. Penguin.", Language::English);
        assert_ne!(source, JournalSource::Italic);
        assert_eq!(journal, "Penguin");
    }

    #[test]
    fn test_japanese_suffix_excludes_title() {
        assert_eq!(
            journal_of(
                "坂部創一, 山崎秀夫 (2019). インターネット利用が新型うつ傾向へ及ぼす悪影響と予防策の縦断研究. キャリア教育研究, 33, 139-146.",
                Language::Japanese
            ),
            ("キャリア教育研究".to_string(), JournalSource::Suffix)
        );
    }

    #[test]
    fn test_container_after_chapter_quote() {
        assert_eq!(
            journal_of("鈴木一郎 (2015). 「近代文学の成立」『日本文学史』 45-60.", Language::Japanese),
            ("日本文学史".to_string(), JournalSource::Quoted)
        );
    }

    #[test]
    fn test_mla_quoted_adjacent() {
        assert_eq!(
            journal_of(
                r#"Smith, John. "The Title of the Article." Modern Philology, vol. 3, 2019, pp. 1-10."#,
                Language::English
            ),
            ("Modern Philology".to_string(), JournalSource::Quoted)
        );
    }

    #[test]
    fn test_residual() {
        assert_eq!(
            journal_of("Doe, A. (2019). Deep nets for vision. Nature, 521, 436-444.", Language::English),
            ("Nature".to_string(), JournalSource::Residual)
        );
    }

    #[test]
    fn test_no_journal() {
        assert_eq!(journal_of("", Language::English), (String::new(), JournalSource::None));
    }

    #[test]
    fn test_evidence() {
        assert!(JournalSource::Suffix.is_evidence());
        assert!(!JournalSource::Residual.is_evidence());
        assert!(has_journal_suffix("Journal of Things"));
        assert!(has_journal_suffix("キャリア教育研究"));
        assert!(!has_journal_suffix("Culture, Media, Language"));
    }
}

//! Record-type classification: article, book, or book chapter.
//!
//! The decision runs in a fixed order so a record never holds two types:
//!
//! 1. chapter patterns (`In <Book>, pp.`, `〜編『書名』`, `第N章`, `所収`);
//! 2. explicit article evidence (volume/issue with pages, journal-suffix venue);
//! 3. a recognized publisher makes it a book;
//! 4. otherwise a titled, authored record with no volume/issue/pages/venue is a
//!    book, and everything else an article.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::RecordKind;
use crate::authors::extract_editors;
use crate::config::ParsingConfig;
use crate::journal::JournalSource;
use crate::text_processing::{normalize_range, trim_field, unwrap_quotes};
use crate::volume::{has_pages, has_volume_issue_marker};

/// Fields extracted before classification.
#[derive(Debug, Clone, Default)]
pub struct PartialFields<'a> {
    pub title: &'a str,
    pub authors: &'a [String],
    pub volume: &'a str,
    pub issue: &'a str,
    pub pages: &'a str,
    pub journal: &'a str,
    pub journal_source: JournalSource,
    /// Publisher found after the title, if any.
    pub publisher: Option<&'a str>,
}

/// The containing book of a chapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterInfo {
    pub book_title: String,
    pub editors: Vec<String>,
    pub pages: String,
    pub pattern: &'static str,
}

/// Outcome of [`detect_type`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: RecordKind,
    /// Set when `kind` is [`RecordKind::BookChapter`].
    pub chapter: Option<ChapterInfo>,
    /// Which rule decided the type.
    pub rule: &'static str,
}

struct ChapterPattern {
    name: &'static str,
    re: Regex,
    /// Only detects a trailing `<title>, <pages>` shape; rejected when a
    /// separate volume/issue marker exists.
    needs_veto_check: bool,
    /// Also requires a page range somewhere in the citation.
    needs_pages: bool,
    /// Matched against the whole citation instead of the text after the title.
    whole_text: bool,
}

static CHAPTER_PATTERNS: Lazy<Vec<ChapterPattern>> = Lazy::new(|| {
    let pattern = |name: &'static str,
                   re: &str,
                   needs_veto_check: bool,
                   needs_pages: bool,
                   whole_text: bool| ChapterPattern {
        name,
        re: Regex::new(re).unwrap(),
        needs_veto_check,
        needs_pages,
        whole_text,
    };
    vec![
        // In S. Hall & D. Hobson (Eds.), Culture, Media, Language (pp. 128-138)
        pattern(
            "In <Editors> (Eds.), <Book>",
            r"(?:^|[.,]\s+)In:?\s+(?P<editors>[^()]+?)\s*\((?:[Ee]ds?|[Hh]rsg)\.?\)\s*,?\s*(?P<book>[^()]+?)\s*(?:\(|\.(?:\s|$)|$)",
            false,
            false,
            false,
        ),
        // In Culture, Media, Language (pp. 128-138)
        pattern(
            "In <Book> (pp. N-M)",
            r"(?:^|[.,]\s+)In:?\s+(?P<book>[^()]+?)\s*\(\s*pp?\.\s*(?P<pages>\d+\s*[-–—]\s*\d+)\s*\)",
            false,
            false,
            false,
        ),
        // In Culture, Media, Language, 128-138
        pattern(
            "In <Book>, <pages>",
            r"(?:^|[.,]\s+)In:?\s+(?P<book>[^()]+?),\s*(?:pp?\.\s*)?(?P<pages>\d+\s*[-–—]\s*\d+)",
            true,
            false,
            false,
        ),
        // 佐藤花子 編『教育学入門』
        pattern(
            "〜編『書名』",
            r"(?P<editors>[^\s,.()「」『』:]+)\s*(?:編著|編|監修)\s*[『「](?P<book>[^』」]+)[』」]",
            false,
            false,
            false,
        ),
        // 『書名』所収
        pattern(
            "所収",
            r"[『「](?P<book>[^』」]+)[』」]\s*(?:所収|収録)",
            false,
            false,
            true,
        ),
        // 第3章
        pattern("第N章", r"第\s*\d+\s*章", false, false, true),
        // 「章題」『書名』 45-60
        pattern(
            "「chapter」『book』, pages",
            r"「[^」]+」\s*『(?P<book>[^』]+)』",
            true,
            true,
            true,
        ),
    ]
});

/// Classify a citation as article, book, or book chapter.
///
/// `text` is the normalized citation; `after_title` is the text following the
/// title (or the whole text when there is no title).
pub fn detect_type(
    text: &str,
    after_title: &str,
    fields: &PartialFields<'_>,
    config: &ParsingConfig,
) -> Classification {
    if let Some(chapter) = detect_chapter(text, after_title, fields, config) {
        tracing::debug!(pattern = chapter.pattern, book = %chapter.book_title, "book chapter");
        return Classification {
            kind: RecordKind::BookChapter,
            rule: chapter.pattern,
            chapter: Some(chapter),
        };
    }

    let classification = |kind: RecordKind, rule: &'static str| {
        tracing::debug!(?kind, rule, "record type decided");
        Classification {
            kind,
            chapter: None,
            rule,
        }
    };

    let has_volume = !fields.volume.is_empty() || !fields.issue.is_empty();
    let has_pages = !fields.pages.is_empty();
    if has_volume && has_pages {
        return classification(RecordKind::Article, "volume/issue with pages");
    }
    if fields.journal_source == JournalSource::Suffix {
        return classification(RecordKind::Article, "journal suffix");
    }

    if fields.publisher.is_some() {
        return classification(RecordKind::Book, "publisher");
    }

    let has_venue = !fields.journal.is_empty() && fields.journal_source.is_evidence();
    if !fields.title.is_empty()
        && !fields.authors.is_empty()
        && !has_volume
        && !has_pages
        && !has_venue
    {
        return classification(RecordKind::Book, "no journal evidence");
    }

    classification(RecordKind::Article, "default")
}

fn detect_chapter(
    text: &str,
    after_title: &str,
    fields: &PartialFields<'_>,
    config: &ParsingConfig,
) -> Option<ChapterInfo> {
    for pattern in CHAPTER_PATTERNS.iter() {
        let haystack = if pattern.whole_text { text } else { after_title };
        let Some(caps) = pattern.re.captures(haystack) else {
            continue;
        };

        if pattern.needs_veto_check && has_volume_issue_marker(text) {
            tracing::trace!(pattern = pattern.name, "chapter pattern vetoed by volume/issue marker");
            continue;
        }
        if pattern.needs_pages && fields.pages.is_empty() && !has_pages(after_title) {
            continue;
        }

        return Some(chapter_from(pattern.name, &caps, text, fields, config));
    }
    None
}

fn chapter_from(
    name: &'static str,
    caps: &Captures<'_>,
    text: &str,
    fields: &PartialFields<'_>,
    config: &ParsingConfig,
) -> ChapterInfo {
    let book_title = caps
        .name("book")
        .map(|m| clean_book_title(m.as_str()))
        .filter(|b| !b.is_empty())
        .or_else(|| first_book_quote(text, fields.title))
        .unwrap_or_else(|| fields.journal.to_string());

    let editors = caps
        .name("editors")
        .map(|m| extract_editors(m.as_str(), config))
        .unwrap_or_default();

    let pages = caps
        .name("pages")
        .map(|m| normalize_range(m.as_str()))
        .unwrap_or_else(|| fields.pages.to_string());

    ChapterInfo {
        book_title,
        editors,
        pages,
        pattern: name,
    }
}

/// Drop a leading `editor 編` prefix and unwrap the innermost quotes.
pub fn clean_book_title(raw: &str) -> String {
    static EDITOR_PREFIX: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[^『「]*?(?:編著|編|著|監修)\s*").unwrap());
    let raw = trim_field(raw);
    let stripped = match EDITOR_PREFIX.find(raw) {
        Some(m) if raw[m.end()..].starts_with(['『', '「']) => &raw[m.end()..],
        _ => raw,
    };
    trim_field(&unwrap_quotes(stripped)).to_string()
}

/// The first 『』 segment that is not the title.
fn first_book_quote(text: &str, title: &str) -> Option<String> {
    static BOOK_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"『([^』]+)』").unwrap());
    BOOK_QUOTE
        .captures_iter(text)
        .map(|caps| clean_book_title(&caps[1]))
        .find(|b| !b.is_empty() && b != title)
}

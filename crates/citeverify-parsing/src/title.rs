use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::ParsingConfig;
use crate::language::Language;
use crate::text_processing::{char_len, contains_japanese, is_katakana, trim_field, unwrap_quotes};

/// Abbreviations whose trailing period is never a sentence boundary.
static MID_SENTENCE_ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "vs", "eg", "ie", "cf", "al", "etc", "fig", "figs", "eq", "eqs", "sec", "ch", "pt", "no",
        "vol", "ed", "eds", "pp", "st", "dr", "jr", "mr", "mrs", "ms",
    ]
    .into_iter()
    .collect()
});

/// Which step of the title cascade produced the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleSource {
    /// 「」『』 or "…"/“…” quoted segment.
    Quoted,
    /// Sentence after the `(YEAR)` parenthesis.
    AfterYear,
    /// Sentence after an ACM-style `. YEAR.` marker.
    AcmYear,
    /// Longest delimited segment that doesn't look like metadata.
    LongestSegment,
    #[default]
    None,
}

/// Title extraction result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTitle {
    /// Display title (Japanese subtitle removed).
    pub title: String,
    /// Title including any subtitle.
    pub title_with_subtitle: String,
    pub source: TitleSource,
    /// Byte range in the normalized text covered by the title, quote marks included.
    pub span: Option<(usize, usize)>,
}

impl ExtractedTitle {
    pub fn is_empty(&self) -> bool {
        self.title_with_subtitle.is_empty()
    }
}

/// Byte offsets of a title candidate: `span` includes quote marks, `inner` does not.
#[derive(Debug, Clone, Copy)]
struct TitleMatch {
    span: (usize, usize),
    inner: (usize, usize),
}

type TitleStep = fn(&str, Language, &ParsingConfig) -> Option<TitleMatch>;

/// The title cascade, tried in order until a step yields a non-empty title.
const TITLE_STEPS: &[(TitleSource, TitleStep)] = &[
    (TitleSource::Quoted, try_quoted),
    (TitleSource::AfterYear, try_after_year),
    (TitleSource::AcmYear, try_acm_year),
    (TitleSource::LongestSegment, try_longest_segment),
];

/// Extract the title from normalized citation text.
pub fn extract_title(text: &str, language: Language, config: &ParsingConfig) -> ExtractedTitle {
    for (source, step) in TITLE_STEPS {
        let Some(m) = step(text, language, config) else {
            continue;
        };
        let full = unwrap_quotes(trim_field(&text[m.inner.0..m.inner.1]));
        let full = trim_field(&full).to_string();
        if full.is_empty() {
            continue;
        }

        let title = if language.is_japanese() {
            split_japanese_subtitle(&full)
        } else {
            full.clone()
        };
        tracing::debug!(step = ?source, title = %full, "title extracted");
        return ExtractedTitle {
            title,
            title_with_subtitle: full,
            source: *source,
            span: Some(m.span),
        };
    }

    tracing::debug!("no title found");
    ExtractedTitle::default()
}

/// Cut a Japanese title at the first subtitle dash that is not a katakana
/// long-vowel mark (i.e. not preceded by katakana).
pub fn split_japanese_subtitle(full: &str) -> String {
    let mut prev: Option<char> = None;
    for (i, c) in full.char_indices() {
        let is_dash = matches!(
            c,
            '\u{30FC}' | '\u{2014}' | '\u{2010}' | '\u{2212}' | '\u{2013}' | '\u{2015}'
        );
        if i > 0 && is_dash && !prev.is_some_and(is_katakana) {
            let main = trim_field(&full[..i]);
            if !main.is_empty() {
                return main.to_string();
            }
        }
        prev = Some(c);
    }
    full.to_string()
}

// ───────────────── Cascade steps ─────────────────

fn try_quoted(text: &str, language: Language, _config: &ParsingConfig) -> Option<TitleMatch> {
    static QUOTE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
        vec![
            Regex::new(r"「([^」]+)」").unwrap(),
            Regex::new(r"『([^』]+)』").unwrap(),
            Regex::new(r#""([^"]+)""#).unwrap(),
            Regex::new(r"\u{201C}([^\u{201D}]+)\u{201D}").unwrap(),
        ]
    });

    QUOTE_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?;
            Some(TitleMatch {
                span: (whole.start(), whole.end()),
                inner: (inner.start(), inner.end()),
            })
        })
        .filter(|m| !is_container_quote(text, m))
        .filter(|m| {
            let opener = text[m.span.0..].chars().next();
            let western = matches!(opener, Some('"' | '\u{201C}'));
            !western || language.is_japanese() || western_quote_is_title(text, m)
        })
        .min_by_key(|m| m.span.0)
}

/// A quoted segment introduced by an editor/"In" marker, or followed by 所収,
/// names the containing book rather than the cited work.
fn is_container_quote(text: &str, m: &TitleMatch) -> bool {
    static IN_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[\s.,])[Ii]n:?$").unwrap());
    let before = text[..m.span.0].trim_end();
    let after = text[m.span.1..].trim_start();
    ["編", "編著", "監修", "所収"].iter().any(|marker| before.ends_with(marker))
        || IN_MARKER.is_match(before)
        || after.starts_with("所収")
        || after.starts_with("収録")
}

/// MLA/Chicago quote titles end with punctuation inside or right after the
/// closing mark; a quoted word in running text does not.
fn western_quote_is_title(text: &str, m: &TitleMatch) -> bool {
    let inner = text[m.inner.0..m.inner.1].trim_end();
    if inner.ends_with(['.', ',', '?', '!']) {
        return true;
    }
    let after = &text[m.span.1..];
    after.is_empty() || after.starts_with(['.', ',', ':', ';']) || after.trim_start().starts_with("In ")
}

fn try_after_year(text: &str, language: Language, _config: &ParsingConfig) -> Option<TitleMatch> {
    static YEAR_PAREN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\(\s*(?:19|20)\d{2}[a-z]?[^)]{0,20}\)\.?\s*").unwrap()
    });
    let m = YEAR_PAREN.find(text)?;
    sentence_from(text, m.end(), language)
}

fn try_acm_year(text: &str, language: Language, _config: &ParsingConfig) -> Option<TitleMatch> {
    static ACM_YEAR: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\.\s+(?:19|20)\d{2}[a-z]?\.\s+").unwrap());
    let m = ACM_YEAR.find(text)?;
    sentence_from(text, m.end(), language)
}

/// The sentence starting at byte `start`, rejected when it is trailing metadata
/// (`(2020): 123-145`) or has no letters at all.
fn sentence_from(text: &str, start: usize, language: Language) -> Option<TitleMatch> {
    let rest = &text[start..];
    if rest.is_empty() || rest.starts_with([':', ',', ';']) {
        return None;
    }
    let end = start + find_sentence_end(rest, language);
    let candidate = &text[start..end];
    if !candidate.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(TitleMatch {
        span: (start, end),
        inner: (start, end),
    })
}

/// Byte offset where the leading sentence of `s` ends.
///
/// English: a period followed by whitespace/end that does not close an initial
/// or a known abbreviation; `?`/`!` only when a venue follows. Japanese: the
/// first such period, else the first comma.
pub(crate) fn find_sentence_end(s: &str, language: Language) -> usize {
    for (i, c) in s.char_indices() {
        let after = &s[i + c.len_utf8()..];
        let at_boundary = after.is_empty() || after.starts_with(char::is_whitespace);
        match c {
            '.' if at_boundary => {
                if language.is_japanese() || !ends_with_abbreviation(&s[..i]) {
                    return i;
                }
            }
            '?' | '!' if !language.is_japanese() && at_boundary && venue_follows(after) => {
                return i + c.len_utf8();
            }
            _ => {}
        }
    }
    if language.is_japanese()
        && let Some(comma) = s.find(',')
    {
        return comma;
    }
    s.len()
}

fn ends_with_abbreviation(prefix: &str) -> bool {
    let last = prefix
        .rsplit(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("");
    let letters = last.chars().count();
    (letters == 1 && last.chars().all(char::is_alphabetic))
        || MID_SENTENCE_ABBREVIATIONS.contains(last.to_lowercase().as_str())
}

/// `? In …` or `? Journal Name, 12` after a question-mark title.
fn venue_follows(after: &str) -> bool {
    static VENUE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\s+(?:In:?\s|[A-Z][^.?!]*,\s*\d)").unwrap());
    VENUE_RE.is_match(after)
}

fn try_longest_segment(text: &str, language: Language, config: &ParsingConfig) -> Option<TitleMatch> {
    static DELIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.]\s+|[,.]$").unwrap());

    let org_words = config.resolved_organization_words();
    let mut best: Option<(usize, TitleMatch)> = None;
    let mut seg_start = 0;
    let bounds = DELIM
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .chain(std::iter::once((text.len(), text.len())));

    for (delim_start, delim_end) in bounds {
        let raw = &text[seg_start..delim_start];
        let lead = raw.len() - raw.trim_start().len();
        let segment = raw.trim();
        let start = seg_start + lead;
        seg_start = delim_end;

        if segment.is_empty() || looks_like_metadata(segment, &org_words) {
            continue;
        }
        let long_enough = if language.is_japanese() {
            contains_japanese(segment) && char_len(segment) >= config.min_title_chars_ja
        } else {
            segment.split_whitespace().count() >= config.min_title_words_en
        };
        if !long_enough {
            continue;
        }
        let len = char_len(segment);
        if best.as_ref().is_none_or(|(best_len, _)| len > *best_len) {
            let range = (start, start + segment.len());
            best = Some((len, TitleMatch { span: range, inner: range }));
        }
    }

    best.map(|(_, m)| m)
}

fn looks_like_metadata(segment: &str, org_words: &[String]) -> bool {
    static META_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^\d|\bdoi\b|https?://|^(?:vol|no|pp?|eds?)\b|\d+\s*[-–]\s*\d+|\(\s*(?:19|20)\d{2}")
            .unwrap()
    });
    let digits = segment.chars().filter(char::is_ascii_digit).count();
    META_RE.is_match(segment)
        || digits * 2 > char_len(segment)
        || org_words.iter().any(|w| segment.contains(w.as_str()))
}

//! Render a candidate back into APA, MLA or Chicago text.
//!
//! The output is a list of segments, each marked by whether the candidate's
//! value agrees with the parsed citation, so a front end can highlight
//! mismatches. Fields the candidate lacks are filled from the parsed citation
//! and marked neutral.

use std::fmt;
use std::str::FromStr;

use citeverify_parsing::{CandidateRecord, ParsedCitation, RecordKind};
use serde::{Deserialize, Serialize};

use crate::authors::{author_similarity, is_et_al, split_name};
use crate::matching::{similarity, split_subtitle};

const AUTHOR_UNKNOWN: &str = "[Author unknown]";
const PUBLISHER_UNKNOWN: &str = "[Publisher unknown]";
const NO_DATE: &str = "n.d.";
/// Text fields at or above this similarity are shown as matching.
const TEXT_MATCH: f64 = 90.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Chicago,
}

impl CitationStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Mla => "mla",
            CitationStyle::Chicago => "chicago",
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CitationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "mla" => Ok(CitationStyle::Mla),
            "chicago" => Ok(CitationStyle::Chicago),
            other => Err(format!(
                "unknown citation style '{other}' (expected apa, mla or chicago)"
            )),
        }
    }
}

/// Agreement between a rendered field and the parsed citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Match,
    Mismatch,
    /// Punctuation, placeholders, or a field only one side has.
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub mark: Mark,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCitation {
    pub segments: Vec<Segment>,
}

impl RenderedCitation {
    /// The citation as plain text, markup-free apart from `*italics*`.
    pub fn plain(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn has_mismatch(&self) -> bool {
        self.segments.iter().any(|s| s.mark == Mark::Mismatch)
    }

    fn push(&mut self, text: impl Into<String>, mark: Mark) {
        let mut text = text.into();
        // "n.d." or "G. A." followed by a closing period
        if mark == Mark::Neutral
            && text.starts_with('.')
            && self.segments.last().is_some_and(|s| s.text.ends_with('.'))
        {
            text.remove(0);
        }
        if text.is_empty() {
            return;
        }
        // Merge adjacent punctuation
        if mark == Mark::Neutral
            && let Some(last) = self.segments.last_mut()
            && last.mark == Mark::Neutral
        {
            last.text.push_str(&text);
            return;
        }
        self.segments.push(Segment { text, mark });
    }

    fn lit(&mut self, text: &str) {
        self.push(text, Mark::Neutral);
    }

    fn field(&mut self, field: &Field) {
        self.push(field.text.clone(), field.mark);
    }

    fn title(&mut self, title: &TitleField) {
        self.push(title.main.clone(), title.main_mark);
        if let Some((ref sub, mark)) = title.subtitle {
            self.lit(": ");
            self.push(sub.clone(), mark);
        }
    }
}

impl fmt::Display for RenderedCitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plain())
    }
}

/// A rendered field value with its mark.
#[derive(Debug, Clone)]
struct Field {
    text: String,
    mark: Mark,
}

impl Field {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone)]
struct TitleField {
    main: String,
    main_mark: Mark,
    subtitle: Option<(String, Mark)>,
}

fn text_mark(parsed: &str, candidate: &str) -> Mark {
    if parsed.trim().is_empty() || candidate.trim().is_empty() {
        Mark::Neutral
    } else if similarity(parsed, candidate) >= TEXT_MATCH {
        Mark::Match
    } else {
        Mark::Mismatch
    }
}

fn exact_mark(parsed: &str, candidate: &str) -> Mark {
    let norm = |s: &str| {
        s.trim()
            .replace(['–', '—', '－'], "-")
            .split_whitespace()
            .collect::<String>()
    };
    if parsed.trim().is_empty() || candidate.trim().is_empty() {
        Mark::Neutral
    } else if norm(parsed).eq_ignore_ascii_case(&norm(candidate)) {
        Mark::Match
    } else {
        Mark::Mismatch
    }
}

/// Candidate value when present, else the parsed value (neutral).
fn pick(parsed: &str, candidate: &str, mark: fn(&str, &str) -> Mark) -> Field {
    if candidate.trim().is_empty() {
        Field {
            text: parsed.trim().to_string(),
            mark: Mark::Neutral,
        }
    } else {
        Field {
            text: candidate.trim().to_string(),
            mark: mark(parsed, candidate),
        }
    }
}

fn pick_title(parsed: &ParsedCitation, candidate: &CandidateRecord) -> TitleField {
    let parsed_title = parsed.search_title();
    if candidate.title.trim().is_empty() {
        return TitleField {
            main: parsed_title.trim().to_string(),
            main_mark: Mark::Neutral,
            subtitle: None,
        };
    }
    let (cand_main, cand_sub) = split_subtitle(&candidate.title);
    let (parsed_main, parsed_sub) = split_subtitle(parsed_title);
    let sub_mark = match (parsed_sub, cand_sub) {
        (Some(p), Some(c)) => text_mark(p, c),
        (None, Some(_)) if !parsed_main.is_empty() => Mark::Mismatch,
        _ => Mark::Neutral,
    };
    TitleField {
        main: cand_main.to_string(),
        main_mark: text_mark(parsed_main, cand_main),
        subtitle: cand_sub.map(|s| (s.to_string(), sub_mark)),
    }
}

fn list_mark(parsed: &[String], candidate: &[String]) -> Mark {
    match author_similarity(parsed, candidate) {
        Some(s) if s >= 100.0 => Mark::Match,
        Some(_) => Mark::Mismatch,
        None => Mark::Neutral,
    }
}

/// `"Ursula K."` → `"U. K."`, `"Jean-Paul"` → `"J.-P."`.
fn initials(given: &str) -> String {
    given
        .split_whitespace()
        .map(|tok| {
            tok.split('-')
                .filter_map(|part| part.chars().next())
                .map(|c| format!("{c}."))
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Last, Given` (or `Last, G.` with initials). Japanese names stay whole.
fn inverted(name: &str, use_initials: bool) -> String {
    let (given, surname) = split_name(name);
    match (given.is_empty(), use_initials) {
        (true, _) => surname,
        (false, true) => format!("{surname}, {}", initials(&given)),
        (false, false) => format!("{surname}, {given}"),
    }
}

/// `Given Last` (or `G. Last`).
fn direct(name: &str, use_initials: bool) -> String {
    let (given, surname) = split_name(name);
    match (given.is_empty(), use_initials) {
        (true, _) => surname,
        (false, true) => format!("{} {surname}", initials(&given)),
        (false, false) => format!("{given} {surname}"),
    }
}

/// English name list: `a`, `a and b`, `a, b, and c` with the given conjunction.
fn join_english(names: &[String], conjunction: &str, pair_comma: bool) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] if pair_comma => format!("{a}, {conjunction} {b}"),
        [a, b] => format!("{a} {conjunction} {b}"),
        [rest @ .., last] => format!("{}, {conjunction} {last}", rest.join(", ")),
    }
}

fn format_authors(names: &[String], style: CitationStyle, japanese: bool) -> String {
    let had_et_al = names.iter().any(|n| is_et_al(n));
    let names: Vec<&String> = names.iter().filter(|n| !is_et_al(n)).collect();
    if names.is_empty() {
        return String::new();
    }

    if japanese {
        let joined = names.iter().map(|n| n.as_str()).collect::<Vec<_>>().join("・");
        return if had_et_al { format!("{joined}他") } else { joined };
    }

    let formatted = match style {
        CitationStyle::Apa => {
            let inv: Vec<String> = names.iter().map(|n| inverted(n, true)).collect();
            join_english(&inv, "&", true)
        }
        CitationStyle::Mla => match names.as_slice() {
            [one] => inverted(one, false),
            [a, b] => format!("{}, and {}", inverted(a, false), direct(b, false)),
            [first, ..] => return format!("{}, et al", inverted(first, false)),
            [] => String::new(),
        },
        CitationStyle::Chicago => {
            let list: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, n)| if i == 0 { inverted(n, false) } else { direct(n, false) })
                .collect();
            join_english(&list, "and", false)
        }
    };
    if had_et_al {
        format!("{formatted}, et al")
    } else {
        formatted
    }
}

fn format_editors(names: &[String], style: CitationStyle, japanese: bool) -> String {
    let names: Vec<String> = names.iter().filter(|n| !is_et_al(n)).cloned().collect();
    if japanese {
        return names.join("・");
    }
    let direct_names: Vec<String> = names
        .iter()
        .map(|n| direct(n, style == CitationStyle::Apa))
        .collect();
    match style {
        CitationStyle::Apa => join_english(&direct_names, "&", false),
        _ => join_english(&direct_names, "and", false),
    }
}

/// All fields resolved for rendering.
struct Resolved {
    authors: Field,
    editors: Field,
    year: Field,
    title: TitleField,
    journal: Field,
    book_title: Field,
    volume: Field,
    issue: Field,
    pages: Field,
    publisher: Field,
    doi: String,
}

fn resolve(parsed: &ParsedCitation, candidate: &CandidateRecord, style: CitationStyle) -> Resolved {
    let japanese = parsed.language.is_japanese();

    let authors = if candidate.authors.is_empty() {
        Field {
            text: format_authors(&parsed.authors, style, japanese),
            mark: Mark::Neutral,
        }
    } else {
        Field {
            text: format_authors(&candidate.authors, style, japanese),
            mark: list_mark(&parsed.authors, &candidate.authors),
        }
    };
    let authors = if authors.is_empty() {
        Field {
            text: AUTHOR_UNKNOWN.to_string(),
            mark: Mark::Neutral,
        }
    } else {
        authors
    };

    let editors = if candidate.editors.is_empty() {
        Field {
            text: format_editors(&parsed.editors, style, japanese),
            mark: Mark::Neutral,
        }
    } else {
        Field {
            text: format_editors(&candidate.editors, style, japanese),
            mark: list_mark(&parsed.editors, &candidate.editors),
        }
    };

    let mut year = pick(&parsed.year, &candidate.year, exact_mark);
    if year.is_empty() {
        year.text = NO_DATE.to_string();
    }

    let parsed_book = if parsed.book_title.is_empty() {
        &parsed.journal
    } else {
        &parsed.book_title
    };
    let cand_book = if candidate.book_title.is_empty() && candidate.is_book_chapter() {
        &candidate.journal
    } else {
        &candidate.book_title
    };

    let mut publisher = pick(&parsed.publisher, &candidate.publisher, text_mark);
    if publisher.is_empty() {
        publisher.text = PUBLISHER_UNKNOWN.to_string();
    }

    Resolved {
        authors,
        editors,
        year,
        title: pick_title(parsed, candidate),
        journal: pick(&parsed.journal, &candidate.journal, text_mark),
        book_title: pick(parsed_book, cand_book, text_mark),
        volume: pick(&parsed.volume, &candidate.volume, exact_mark),
        issue: pick(&parsed.issue, &candidate.issue, exact_mark),
        pages: pick(&parsed.pages, &candidate.pages, exact_mark),
        publisher,
        doi: if candidate.doi.trim().is_empty() {
            parsed.doi.trim().to_string()
        } else {
            candidate.doi.trim().to_string()
        },
    }
}

/// Render `candidate` in `style`, marking each field against `parsed`.
///
/// The record kind and the language conventions follow the candidate's kind
/// and the parsed citation's language. A DOI is always appended as a
/// `https://doi.org/` link.
pub fn render(
    parsed: &ParsedCitation,
    candidate: &CandidateRecord,
    style: CitationStyle,
) -> RenderedCitation {
    let fields = resolve(parsed, candidate, style);
    let mut out = RenderedCitation::default();
    let kind = candidate.kind;

    if parsed.language.is_japanese() {
        render_japanese(&mut out, &fields, kind, style);
    } else {
        render_english(&mut out, &fields, kind, style);
    }

    if !fields.doi.is_empty() {
        out.lit(" ");
        let mark = exact_mark(&parsed.doi, &fields.doi);
        out.push(format!("https://doi.org/{}", fields.doi), mark);
    }
    out
}

fn italic(out: &mut RenderedCitation, field: &Field) {
    out.lit("*");
    out.field(field);
    out.lit("*");
}

fn italic_title(out: &mut RenderedCitation, title: &TitleField) {
    out.lit("*");
    out.title(title);
    out.lit("*");
}

fn render_english(out: &mut RenderedCitation, f: &Resolved, kind: RecordKind, style: CitationStyle) {
    match style {
        CitationStyle::Apa => {
            out.field(&f.authors);
            out.lit(" (");
            out.field(&f.year);
            out.lit("). ");
            match kind {
                RecordKind::Article => {
                    out.title(&f.title);
                    out.lit(".");
                    if !f.journal.is_empty() {
                        out.lit(" ");
                        italic(out, &f.journal);
                        if !f.volume.is_empty() {
                            out.lit(", ");
                            italic(out, &f.volume);
                        }
                        if !f.issue.is_empty() {
                            out.lit("(");
                            out.field(&f.issue);
                            out.lit(")");
                        }
                        if !f.pages.is_empty() {
                            out.lit(", ");
                            out.field(&f.pages);
                        }
                        out.lit(".");
                    }
                }
                RecordKind::Book => {
                    italic_title(out, &f.title);
                    out.lit(". ");
                    out.field(&f.publisher);
                    out.lit(".");
                }
                RecordKind::BookChapter => {
                    out.title(&f.title);
                    out.lit(". In ");
                    if !f.editors.is_empty() {
                        out.field(&f.editors);
                        out.lit(if f.editors.text.contains(" & ") {
                            " (Eds.), "
                        } else {
                            " (Ed.), "
                        });
                    }
                    italic(out, &f.book_title);
                    if !f.pages.is_empty() {
                        out.lit(" (pp. ");
                        out.field(&f.pages);
                        out.lit(")");
                    }
                    out.lit(". ");
                    out.field(&f.publisher);
                    out.lit(".");
                }
            }
        }
        CitationStyle::Mla => {
            out.field(&f.authors);
            out.lit(". ");
            match kind {
                RecordKind::Article => {
                    out.lit("\"");
                    out.title(&f.title);
                    out.lit(".\"");
                    if !f.journal.is_empty() {
                        out.lit(" ");
                        italic(out, &f.journal);
                    }
                    if !f.volume.is_empty() {
                        out.lit(", vol. ");
                        out.field(&f.volume);
                    }
                    if !f.issue.is_empty() {
                        out.lit(", no. ");
                        out.field(&f.issue);
                    }
                    out.lit(", ");
                    out.field(&f.year);
                    if !f.pages.is_empty() {
                        out.lit(", pp. ");
                        out.field(&f.pages);
                    }
                    out.lit(".");
                }
                RecordKind::Book => {
                    italic_title(out, &f.title);
                    out.lit(". ");
                    out.field(&f.publisher);
                    out.lit(", ");
                    out.field(&f.year);
                    out.lit(".");
                }
                RecordKind::BookChapter => {
                    out.lit("\"");
                    out.title(&f.title);
                    out.lit(".\" ");
                    italic(out, &f.book_title);
                    if !f.editors.is_empty() {
                        out.lit(", edited by ");
                        out.field(&f.editors);
                    }
                    out.lit(", ");
                    out.field(&f.publisher);
                    out.lit(", ");
                    out.field(&f.year);
                    if !f.pages.is_empty() {
                        out.lit(", pp. ");
                        out.field(&f.pages);
                    }
                    out.lit(".");
                }
            }
        }
        CitationStyle::Chicago => {
            out.field(&f.authors);
            out.lit(". ");
            match kind {
                RecordKind::Article => {
                    out.lit("\"");
                    out.title(&f.title);
                    out.lit(".\"");
                    if !f.journal.is_empty() {
                        out.lit(" ");
                        italic(out, &f.journal);
                    }
                    if !f.volume.is_empty() {
                        out.lit(" ");
                        out.field(&f.volume);
                    }
                    if !f.issue.is_empty() {
                        out.lit(", no. ");
                        out.field(&f.issue);
                    }
                    out.lit(" (");
                    out.field(&f.year);
                    out.lit(")");
                    if !f.pages.is_empty() {
                        out.lit(": ");
                        out.field(&f.pages);
                    }
                    out.lit(".");
                }
                RecordKind::Book => {
                    italic_title(out, &f.title);
                    out.lit(". ");
                    out.field(&f.publisher);
                    out.lit(", ");
                    out.field(&f.year);
                    out.lit(".");
                }
                RecordKind::BookChapter => {
                    out.lit("\"");
                    out.title(&f.title);
                    out.lit(".\" In ");
                    italic(out, &f.book_title);
                    if !f.editors.is_empty() {
                        out.lit(", edited by ");
                        out.field(&f.editors);
                    }
                    if !f.pages.is_empty() {
                        out.lit(", ");
                        out.field(&f.pages);
                    }
                    out.lit(". ");
                    out.field(&f.publisher);
                    out.lit(", ");
                    out.field(&f.year);
                    out.lit(".");
                }
            }
        }
    }
}

/// Volume and issue in Japanese article form: `33(2)`, or `33巻2号` for MLA.
fn japanese_volume(out: &mut RenderedCitation, f: &Resolved, style: CitationStyle) {
    let mla = style == CitationStyle::Mla;
    if !f.volume.is_empty() {
        out.field(&f.volume);
        if mla {
            out.lit("巻");
        }
    }
    if !f.issue.is_empty() {
        if mla {
            out.field(&f.issue);
            out.lit("号");
        } else {
            out.lit("(");
            out.field(&f.issue);
            out.lit(")");
        }
    }
}

fn render_japanese(
    out: &mut RenderedCitation,
    f: &Resolved,
    kind: RecordKind,
    style: CitationStyle,
) {
    out.field(&f.authors);
    match style {
        CitationStyle::Apa => {
            out.lit(" (");
            out.field(&f.year);
            out.lit("). ");
        }
        CitationStyle::Chicago => {
            out.lit(". ");
            out.field(&f.year);
            out.lit(". ");
        }
        CitationStyle::Mla => out.lit(". "),
    }

    match kind {
        RecordKind::Article => {
            out.lit("「");
            out.title(&f.title);
            out.lit("」");
            if !f.journal.is_empty() {
                out.lit("『");
                out.field(&f.journal);
                out.lit("』");
            }
            japanese_volume(out, f, style);
            if style == CitationStyle::Mla {
                out.lit(", ");
                out.field(&f.year);
            }
            if !f.pages.is_empty() {
                out.lit(if style == CitationStyle::Chicago { ": " } else { ", " });
                out.field(&f.pages);
            }
            out.lit(".");
        }
        RecordKind::Book => {
            out.lit("『");
            out.title(&f.title);
            out.lit("』");
            out.field(&f.publisher);
            if style == CitationStyle::Mla {
                out.lit(", ");
                out.field(&f.year);
            }
            out.lit(".");
        }
        RecordKind::BookChapter => {
            out.lit("「");
            out.title(&f.title);
            out.lit("」");
            if !f.editors.is_empty() {
                out.field(&f.editors);
                out.lit("編");
            }
            out.lit("『");
            out.field(&f.book_title);
            out.lit("』");
            out.field(&f.publisher);
            if style == CitationStyle::Mla {
                out.lit(", ");
                out.field(&f.year);
            }
            if !f.pages.is_empty() {
                out.lit(", ");
                out.field(&f.pages);
            }
            out.lit(".");
        }
    }
}

use serde::{Deserialize, Serialize};

pub mod authors;
pub mod classify;
pub mod config;
pub mod extractor;
pub mod identifiers;
pub mod journal;
pub mod language;
pub mod names;
pub mod normalize;
pub mod publisher;
pub mod text_processing;
pub mod title;
pub mod volume;

pub use classify::{ChapterInfo, Classification, detect_type};
pub use config::{ListOverride, ParsingConfig, ParsingConfigBuilder};
pub use extractor::CitationExtractor;
pub use language::{Language, detect_language};
pub use names::{normalize_author_name, normalize_authors};
pub use normalize::normalize;

/// The kind of bibliographic record. Exactly one holds for any citation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    #[default]
    Article,
    Book,
    BookChapter,
}

impl RecordKind {
    pub fn is_book(self) -> bool {
        self == RecordKind::Book
    }

    pub fn is_book_chapter(self) -> bool {
        self == RecordKind::BookChapter
    }

    pub fn is_article(self) -> bool {
        self == RecordKind::Article
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Article => "article",
            RecordKind::Book => "book",
            RecordKind::BookChapter => "book-chapter",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured fields parsed from one raw citation line.
///
/// Absent fields are empty strings / vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedCitation {
    /// The original input line.
    pub raw: String,
    /// Display title, subtitle trimmed for Japanese titles.
    pub title: String,
    /// Title including any subtitle; used for scoring.
    pub title_with_subtitle: String,
    pub authors: Vec<String>,
    /// Editors of the containing book (chapters only).
    pub editors: Vec<String>,
    pub year: String,
    pub doi: String,
    pub url: String,
    /// Journal or venue. For chapters this is the book title.
    pub journal: String,
    pub volume: String,
    pub issue: String,
    pub pages: String,
    pub publisher: String,
    /// Containing book (chapters only).
    pub book_title: String,
    pub language: Language,
    pub kind: RecordKind,
}

impl ParsedCitation {
    pub fn is_book(&self) -> bool {
        self.kind.is_book()
    }

    pub fn is_book_chapter(&self) -> bool {
        self.kind.is_book_chapter()
    }

    /// The title used for searching and scoring: the full title when known.
    pub fn search_title(&self) -> &str {
        if self.title_with_subtitle.is_empty() {
            &self.title
        } else {
            &self.title_with_subtitle
        }
    }
}

/// A record returned by an external literature source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Which source produced the record (`CrossRef`, `CiNii`, ...).
    pub source: String,
    pub title: String,
    pub authors: Vec<String>,
    pub editors: Vec<String>,
    pub year: String,
    pub doi: String,
    pub url: String,
    pub journal: String,
    pub volume: String,
    pub issue: String,
    pub pages: String,
    pub publisher: String,
    pub book_title: String,
    pub kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    /// Raw source payload, kept for traceability only.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub original_data: serde_json::Value,
}

impl CandidateRecord {
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn is_book(&self) -> bool {
        self.kind.is_book()
    }

    pub fn is_book_chapter(&self) -> bool {
        self.kind.is_book_chapter()
    }
}

/// The parsed citation viewed as a record of its own, for rendering when no
/// source returned a usable candidate.
impl From<&ParsedCitation> for CandidateRecord {
    fn from(parsed: &ParsedCitation) -> Self {
        Self {
            source: "input".into(),
            title: parsed.search_title().to_string(),
            authors: parsed.authors.clone(),
            editors: parsed.editors.clone(),
            year: parsed.year.clone(),
            doi: parsed.doi.clone(),
            url: parsed.url.clone(),
            journal: parsed.journal.clone(),
            volume: parsed.volume.clone(),
            issue: parsed.issue.clone(),
            pages: parsed.pages.clone(),
            publisher: parsed.publisher.clone(),
            book_title: parsed.book_title.clone(),
            kind: parsed.kind,
            isbn: None,
            original_data: serde_json::Value::Null,
        }
    }
}

/// Parse a raw citation line with the default configuration.
///
/// Pipeline:
/// 1. Normalize punctuation and known typos
/// 2. Detect the language by script ratio
/// 3. Extract DOI, URL and year
/// 4. Extract title, authors, volume/issue/pages, journal and publisher
/// 5. Classify as article, book or book chapter and fill chapter fields
pub fn parse_citation(raw: &str) -> ParsedCitation {
    CitationExtractor::new().parse(raw)
}

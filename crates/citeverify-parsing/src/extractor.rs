use crate::classify::{self, Classification, PartialFields};
use crate::config::ParsingConfig;
use crate::journal::{self, JournalSource};
use crate::language::{self, Language};
use crate::text_processing::remove_fragment;
use crate::title::{self, ExtractedTitle};
use crate::{ParsedCitation, RecordKind};
use crate::{authors, identifiers, normalize, publisher, volume};

/// A configurable citation parsing pipeline.
///
/// Holds a [`ParsingConfig`] and exposes each pipeline step as a method.
/// The default constructor uses built-in defaults; use
/// [`CitationExtractor::with_config`] to supply custom lists and thresholds.
#[derive(Debug, Clone)]
pub struct CitationExtractor {
    config: ParsingConfig,
}

impl Default for CitationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationExtractor {
    /// Create an extractor with default configuration.
    pub fn new() -> Self {
        Self {
            config: ParsingConfig::default(),
        }
    }

    /// Create an extractor with a custom configuration.
    pub fn with_config(config: ParsingConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the current config.
    pub fn config(&self) -> &ParsingConfig {
        &self.config
    }

    /// Normalize punctuation and known typos (step 1).
    pub fn normalize(&self, raw: &str) -> String {
        normalize::normalize(raw)
    }

    /// Decide Japanese vs English (step 2).
    pub fn detect_language(&self, text: &str) -> Language {
        language::detect_language(text, self.config.japanese_ratio_threshold)
    }

    /// Extract the title (step 3).
    pub fn extract_title(&self, text: &str, language: Language) -> ExtractedTitle {
        title::extract_title(text, language, &self.config)
    }

    /// Parse one raw citation line into a [`ParsedCitation`].
    ///
    /// Never fails: every field that cannot be found is left empty.
    pub fn parse(&self, raw: &str) -> ParsedCitation {
        let text = self.normalize(raw);
        let language = self.detect_language(&text);
        tracing::debug!(%language, text = %text, "parsing citation");

        let doi = identifiers::extract_doi(&text).unwrap_or_default();
        let url = identifiers::extract_url(&text).unwrap_or_default();
        let year = identifiers::extract_year(&text, &doi, &url).unwrap_or_default();

        let title = self.extract_title(&text, language);
        let (outside_title, after_title) = match title.span {
            Some((start, end)) => (format!("{} {}", &text[..start], &text[end..]), &text[end..]),
            None => (text.clone(), text.as_str()),
        };
        let strip_ids = |s: &str| remove_fragment(&remove_fragment(s, &url), &doi);

        let authors = authors::extract_authors(&text, language, &self.config);
        let volume_info = volume::extract_volume_info(&strip_ids(&outside_title));
        let (journal, journal_source) =
            journal::extract_journal(&text, &outside_title, &title, language);
        let publisher = publisher::extract_publisher(&strip_ids(after_title), &self.config);

        let fields = PartialFields {
            title: &title.title_with_subtitle,
            authors: &authors,
            volume: &volume_info.volume,
            issue: &volume_info.issue,
            pages: &volume_info.pages,
            journal: &journal,
            journal_source,
            publisher: publisher.as_deref(),
        };
        let Classification { kind, chapter, rule } =
            classify::detect_type(&text, after_title, &fields, &self.config);
        tracing::debug!(?kind, rule, "citation classified");

        let mut parsed = ParsedCitation {
            raw: raw.to_string(),
            title: title.title,
            title_with_subtitle: title.title_with_subtitle,
            authors,
            year,
            doi,
            url,
            volume: volume_info.volume,
            issue: volume_info.issue,
            pages: volume_info.pages,
            language,
            kind,
            ..Default::default()
        };

        match kind {
            RecordKind::BookChapter => {
                let chapter = chapter.unwrap_or_default();
                parsed.journal = chapter.book_title.clone();
                parsed.book_title = chapter.book_title;
                parsed.editors = chapter.editors;
                if parsed.pages.is_empty() {
                    parsed.pages = chapter.pages;
                }
                parsed.publisher = publisher.unwrap_or_default();
            }
            RecordKind::Book => {
                // A residual venue on a book is really the publisher
                parsed.publisher = match (publisher, journal_source) {
                    (Some(p), _) => p,
                    (None, JournalSource::Residual) => journal,
                    (None, _) => String::new(),
                };
            }
            RecordKind::Article => {
                parsed.journal = journal;
            }
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_article() {
        let parsed = CitationExtractor::new().parse(
            "Smith, J. (2020). Machine learning in healthcare. Journal of Medical Research, 45(3), 123-145.",
        );
        assert_eq!(parsed.kind, RecordKind::Article);
        assert_eq!(parsed.authors, vec!["J. Smith"]);
        assert_eq!(parsed.year, "2020");
        assert_eq!(parsed.journal, "Journal of Medical Research");
        assert!(parsed.publisher.is_empty());
    }

    #[test]
    fn test_parse_book_residual_publisher() {
        let parsed =
            CitationExtractor::new().parse("Doe, J. (2019). A history of reading. Hutchinson.");
        assert_eq!(parsed.kind, RecordKind::Book);
        assert_eq!(parsed.publisher, "Hutchinson");
        assert!(parsed.journal.is_empty());
    }

    #[test]
    fn test_parse_chapter_with_editors() {
        let parsed = CitationExtractor::new().parse(
            "Hall, S. (1980). Encoding/decoding. In S. Hall, D. Hobson, & A. Lowe (Eds.), Culture, Media, Language (pp. 128-138). London: Hutchinson.",
        );
        assert_eq!(parsed.kind, RecordKind::BookChapter);
        assert_eq!(parsed.book_title, "Culture, Media, Language");
        assert_eq!(parsed.journal, parsed.book_title);
        assert_eq!(parsed.editors, vec!["S. Hall", "D. Hobson", "A. Lowe"]);
        assert_eq!(parsed.pages, "128-138");
        assert_eq!(parsed.publisher, "Hutchinson");
    }

    #[test]
    fn test_parse_doi_and_url() {
        let parsed = CitationExtractor::new().parse(
            "Doe, A. (2019). Deep nets for vision. Nature, 521, 436-444. https://doi.org/10.1038/nature14539",
        );
        assert_eq!(parsed.doi, "10.1038/nature14539");
        assert_eq!(parsed.url, "https://doi.org/10.1038/nature14539");
        assert_eq!(parsed.volume, "521");
        assert_eq!(parsed.pages, "436-444");
        assert_eq!(parsed.journal, "Nature");
    }

    #[test]
    fn test_parse_empty() {
        let parsed = CitationExtractor::new().parse("   ");
        assert!(parsed.title.is_empty());
        assert!(parsed.authors.is_empty());
        assert_eq!(parsed.kind, RecordKind::Article);
    }

    #[test]
    fn test_custom_threshold() {
        let config = crate::ParsingConfigBuilder::new()
            .japanese_ratio_threshold(0.99)
            .build()
            .unwrap();
        let parsed = CitationExtractor::with_config(config).parse("田中太郎 (2020). 『人工知能と社会』");
        assert_eq!(parsed.language, Language::English);
    }
}

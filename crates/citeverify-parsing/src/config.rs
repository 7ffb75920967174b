use regex::Regex;

/// Controls how a list of patterns/values is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Publishers recognized by name even without a Press/出版/書店 suffix.
pub const DEFAULT_KNOWN_PUBLISHERS: &[&str] = &[
    "Springer",
    "Elsevier",
    "Wiley",
    "Routledge",
    "SAGE Publications",
    "Sage",
    "Pearson",
    "McGraw-Hill",
    "Palgrave Macmillan",
    "Macmillan",
    "Penguin",
    "HarperCollins",
    "Academic Press",
    "Addison-Wesley",
    "Prentice Hall",
    "O'Reilly",
    "Basic Books",
    "W. W. Norton",
    "Blackwell",
    "Gallimard",
    "Hachette",
    "Suhrkamp",
    "有斐閣",
    "丸善",
    "誠文堂新光社",
    "培風館",
    "勁草書房",
    "岩波書店",
    "講談社",
    "新曜社",
];

/// Words marking an institutional (non-person) name. Tokens containing one are
/// dropped from author lists and segments containing one are never taken as a title.
pub const DEFAULT_ORGANIZATION_WORDS: &[&str] = &[
    "大学",
    "研究所",
    "研究科",
    "学会",
    "協会",
    "委員会",
    "財団",
    "機構",
    "センター",
    "文部科学省",
    "厚生労働省",
    "内閣府",
    "University",
    "Institute",
    "Association",
    "Committee",
    "Ministry",
    "Department",
    "Society",
    "Organization",
    "Council",
    "Foundation",
];

/// Configuration for citation parsing.
///
/// Use [`ParsingConfigBuilder`] to construct with string patterns.
#[derive(Debug, Clone)]
pub struct ParsingConfig {
    // ── language.rs ──
    /// Japanese-character ratio above which a citation counts as Japanese (default: 0.3).
    pub(crate) japanese_ratio_threshold: f64,

    // ── title.rs ──
    /// Minimum characters for a Japanese fallback title segment (default: 5).
    pub(crate) min_title_chars_ja: usize,
    /// Minimum words for an English fallback title segment (default: 3).
    pub(crate) min_title_words_en: usize,

    // ── authors.rs ──
    /// Maximum number of authors to retain per citation (default: 30).
    pub(crate) max_authors: usize,
    /// Institutional words dropped from author lists.
    pub(crate) organization_words: ListOverride<String>,

    // ── publisher.rs ──
    /// Publisher names matched literally.
    pub(crate) known_publishers: ListOverride<String>,
    /// Additional publisher regexes, tried after the built-in patterns.
    /// The publisher name is capture group 1, or the whole match if there is none.
    pub(crate) publisher_patterns: Vec<Regex>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            japanese_ratio_threshold: 0.3,
            min_title_chars_ja: 5,
            min_title_words_en: 3,
            max_authors: 30,
            organization_words: ListOverride::Default,
            known_publishers: ListOverride::Default,
            publisher_patterns: Vec::new(),
        }
    }
}

impl ParsingConfig {
    pub fn japanese_ratio_threshold(&self) -> f64 {
        self.japanese_ratio_threshold
    }

    pub fn max_authors(&self) -> usize {
        self.max_authors
    }

    pub(crate) fn resolved_organization_words(&self) -> Vec<String> {
        self.organization_words.resolve(&owned(DEFAULT_ORGANIZATION_WORDS))
    }

    pub(crate) fn resolved_known_publishers(&self) -> Vec<String> {
        self.known_publishers.resolve(&owned(DEFAULT_KNOWN_PUBLISHERS))
    }
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Builder for [`ParsingConfig`].
///
/// Accepts string patterns that are compiled to `Regex` in [`build()`](Self::build).
/// Fails fast with `regex::Error` if any pattern is invalid.
#[derive(Debug, Clone, Default)]
pub struct ParsingConfigBuilder {
    japanese_ratio_threshold: Option<f64>,
    min_title_chars_ja: Option<usize>,
    min_title_words_en: Option<usize>,
    max_authors: Option<usize>,
    organization_words: ListOverride<String>,
    known_publishers: ListOverride<String>,
    publisher_patterns: Vec<String>,
}

impl ParsingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Scalars ──

    pub fn japanese_ratio_threshold(mut self, ratio: f64) -> Self {
        self.japanese_ratio_threshold = Some(ratio);
        self
    }

    pub fn min_title_chars_ja(mut self, n: usize) -> Self {
        self.min_title_chars_ja = Some(n);
        self
    }

    pub fn min_title_words_en(mut self, n: usize) -> Self {
        self.min_title_words_en = Some(n);
        self
    }

    pub fn max_authors(mut self, n: usize) -> Self {
        self.max_authors = Some(n);
        self
    }

    // ── Organization words ──

    pub fn set_organization_words(mut self, words: Vec<String>) -> Self {
        self.organization_words = ListOverride::Replace(words);
        self
    }

    pub fn add_organization_word(mut self, word: String) -> Self {
        match &mut self.organization_words {
            ListOverride::Extend(v) => v.push(word),
            _ => self.organization_words = ListOverride::Extend(vec![word]),
        }
        self
    }

    // ── Publishers ──

    pub fn set_known_publishers(mut self, publishers: Vec<String>) -> Self {
        self.known_publishers = ListOverride::Replace(publishers);
        self
    }

    pub fn add_known_publisher(mut self, publisher: String) -> Self {
        match &mut self.known_publishers {
            ListOverride::Extend(v) => v.push(publisher),
            _ => self.known_publishers = ListOverride::Extend(vec![publisher]),
        }
        self
    }

    pub fn add_publisher_pattern(mut self, pattern: String) -> Self {
        self.publisher_patterns.push(pattern);
        self
    }

    /// Compile all string patterns into regexes and produce a [`ParsingConfig`].
    pub fn build(self) -> Result<ParsingConfig, regex::Error> {
        let publisher_patterns = self
            .publisher_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let defaults = ParsingConfig::default();
        Ok(ParsingConfig {
            japanese_ratio_threshold: self
                .japanese_ratio_threshold
                .unwrap_or(defaults.japanese_ratio_threshold),
            min_title_chars_ja: self.min_title_chars_ja.unwrap_or(defaults.min_title_chars_ja),
            min_title_words_en: self.min_title_words_en.unwrap_or(defaults.min_title_words_en),
            max_authors: self.max_authors.unwrap_or(defaults.max_authors),
            organization_words: self.organization_words,
            known_publishers: self.known_publishers,
            publisher_patterns,
        })
    }
}

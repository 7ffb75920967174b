//! Search source trait and adapters for the literature APIs.
//!
//! Every adapter translates its native response (JSON or RSS/XML) into
//! [`CandidateRecord`]s: authors as a flat `Vec<String>`, the source's type
//! taxonomy mapped onto [`RecordKind`], and the raw payload kept in
//! `original_data`. Response parsing lives in pure `parse_*` functions so it
//! can be tested against fixtures without the network.

pub mod cinii;
pub mod crossref;
pub mod google_books;
pub mod mock;
pub mod ndl;
pub mod semantic_scholar;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use citeverify_parsing::{CandidateRecord, Language, RecordKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::rate_limit::{SourceError, check_response_status};

/// Which record kinds a query should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindFilter {
    #[default]
    All,
    Books,
}

/// One search request against a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub title: String,
    /// Author to narrow by (usually the first parsed author).
    pub author: Option<String>,
    /// Journal/venue to narrow by.
    pub journal: Option<String>,
    pub kind: KindFilter,
    pub language: Language,
}

impl SearchQuery {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = Some(journal.into());
        self
    }

    pub fn books_only(mut self) -> Self {
        self.kind = KindFilter::Books;
        self
    }

    pub fn in_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

/// Boxed future returned by [`SearchSource::search`].
pub type SearchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<CandidateRecord>, SourceError>> + Send + 'a>>;

/// A literature source that can be searched for candidate records.
pub trait SearchSource: Send + Sync {
    /// The canonical name of this source (e.g., "CrossRef", "CiNii").
    fn name(&self) -> &str;

    /// Whether this source is queried without HTTP (skips rate limiting).
    fn is_local(&self) -> bool {
        false
    }

    /// Run one search. A single attempt; retry is applied by the caller.
    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SearchFuture<'a>;
}

pub(crate) const USER_AGENT: &str = concat!("citeverify/", env!("CARGO_PKG_VERSION"));

/// Send a request and decode a JSON body, mapping HTTP failures to [`SourceError`].
pub(crate) async fn fetch_json(request: reqwest::RequestBuilder) -> Result<Value, SourceError> {
    let resp = request.send().await?;
    check_response_status(&resp)?;
    resp.json::<Value>()
        .await
        .map_err(|e| SourceError::Malformed(e.to_string()))
}

/// Send a request and return the body text, mapping HTTP failures to [`SourceError`].
pub(crate) async fn fetch_text(request: reqwest::RequestBuilder) -> Result<String, SourceError> {
    let resp = request.send().await?;
    check_response_status(&resp)?;
    Ok(resp.text().await?)
}

// ───────────────── JSON helpers shared by adapters ─────────────────

/// A string field that may be a string, a number, the first element of an
/// array, or an object carrying `@value`/`name`/`value`.
pub(crate) fn json_str(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => return items.iter().find_map(json_str),
        Value::Object(map) => {
            return ["@value", "name", "value", "literal"]
                .iter()
                .find_map(|key| map.get(*key).and_then(json_str));
        }
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Every string in a field that may be a single value or an array of values.
pub(crate) fn json_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(json_str).collect(),
        other => json_str(other).into_iter().collect(),
    }
}

/// First four-digit year in a date string (`2019-03`, `2019年`, `[2019]`).
pub(crate) fn year_from_date(date: &str) -> String {
    static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(1[5-9]|20)\d{2}").unwrap());
    YEAR_RE
        .find(date)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Strip JATS/HTML markup some sources embed in titles (`<i>`, `<sub>`).
pub(crate) fn strip_markup(text: &str) -> String {
    static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z:][^>]*>").unwrap());
    TAG_RE.replace_all(text, "").trim().to_string()
}

/// `start`/`end` page pair as a range.
pub(crate) fn page_range(start: &str, end: &str) -> String {
    match (start.trim(), end.trim()) {
        ("", _) => String::new(),
        (s, "") => s.to_string(),
        (s, e) if s == e => s.to_string(),
        (s, e) => format!("{s}-{e}"),
    }
}

/// Map a free-form type label onto a record kind.
pub(crate) fn kind_from_label(label: &str) -> RecordKind {
    let label = label.to_lowercase();
    if label.contains("chapter") || label.contains("section") || label.contains("part") {
        RecordKind::BookChapter
    } else if label.contains("book") || label.contains("monograph") || label.contains("図書") {
        RecordKind::Book
    } else {
        RecordKind::Article
    }
}

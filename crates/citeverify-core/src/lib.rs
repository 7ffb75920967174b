use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod authors;
pub mod checker;
pub mod config_file;
pub mod db;
pub mod matching;
pub mod orchestrator;
pub mod rate_limit;
pub mod render;
pub mod scoring;

// Re-export for convenience
pub use checker::Verifier;
pub use citeverify_parsing::{
    CandidateRecord, Language, ParsedCitation, ParsingConfig, RecordKind, parse_citation,
};
pub use db::{KindFilter, SearchQuery, SearchSource};
pub use orchestrator::{SourceSearch, build_source_list, search_all_sources};
pub use rate_limit::{AdaptiveLimiter, LimiterClock, RateLimiters, RetryPolicy, SourceError};
pub use render::{CitationStyle, Mark, RenderedCitation, Segment, render};
pub use scoring::{
    ScoreWeights, ScoredCandidate, ScoringConfig, Similarities, Thresholds, rank_candidates,
};

/// Verification status of a citation, from its best candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Found,
    Similar,
    NotFound,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Found => "found",
            Status::Similar => "similar",
            Status::NotFound => "not_found",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one source while a line is being verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceProgress {
    Searching,
    /// Finished with this many unique candidates.
    Completed(usize),
    Error(String),
}

/// Outcome of querying a single source for one citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Returned at least one candidate.
    Found,
    /// Answered, but with nothing.
    Empty,
    /// Gave up after 429 responses.
    RateLimited,
    Timeout,
    Error,
}

/// Result from querying a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: String,
    pub status: SourceStatus,
    /// Unique candidates returned across all search stages.
    pub candidates: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// The result of verifying a single citation line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub parsed: ParsedCitation,
    /// Ranked candidates, best first.
    pub candidates: Vec<ScoredCandidate>,
    pub status: Status,
    /// The best candidate rendered in the requested style, or the parsed
    /// citation itself when nothing matched.
    pub rendered: RenderedCitation,
    pub sources: Vec<SourceResult>,
}

impl VerifyResult {
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.candidates.first()
    }

    /// Names of sources that failed for this line.
    pub fn failed_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    SourceStatus::Error | SourceStatus::Timeout | SourceStatus::RateLimited
                )
            })
            .map(|s| s.source.as_str())
            .collect()
    }
}

/// Progress events emitted while verifying a batch of lines.
#[derive(Debug, Clone)]
pub enum VerifyEvent {
    Checking {
        index: usize,
        total: usize,
        line: String,
    },
    Source {
        index: usize,
        source: String,
        progress: SourceProgress,
    },
    Result {
        index: usize,
        total: usize,
        result: Box<VerifyResult>,
    },
}

/// Summary statistics for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyStats {
    pub total: usize,
    pub found: usize,
    pub similar: usize,
    pub not_found: usize,
}

impl VerifyStats {
    pub fn from_results(results: &[VerifyResult]) -> Self {
        results.iter().fold(
            Self {
                total: results.len(),
                ..Default::default()
            },
            |mut stats, r| {
                match r.status {
                    Status::Found => stats.found += 1,
                    Status::Similar => stats.similar += 1,
                    Status::NotFound => stats.not_found += 1,
                }
                stats
            },
        )
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config_file::ConfigError),
}

/// Configuration for verification.
#[derive(Clone)]
pub struct Config {
    pub s2_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
    pub google_books_api_key: Option<String>,
    pub cinii_appid: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    /// A source stops running further search stages once it has this many
    /// unique results.
    pub good_enough: usize,
    /// Source names to skip (case-insensitive).
    pub disabled_sources: Vec<String>,
    pub scoring: ScoringConfig,
    pub parsing: ParsingConfig,
    pub rate_limiters: Arc<RateLimiters>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("s2_api_key", &self.s2_api_key.as_ref().map(|_| "***"))
            .field(
                "crossref_mailto",
                &self.crossref_mailto.as_ref().map(|_| "***"),
            )
            .field(
                "google_books_api_key",
                &self.google_books_api_key.as_ref().map(|_| "***"),
            )
            .field("cinii_appid", &self.cinii_appid.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .field("good_enough", &self.good_enough)
            .field("disabled_sources", &self.disabled_sources)
            .field("scoring", &self.scoring)
            .field("parsing", &self.parsing)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            s2_api_key: None,
            crossref_mailto: None,
            google_books_api_key: None,
            cinii_appid: None,
            timeout_secs: 10,
            retry: RetryPolicy::default(),
            good_enough: 5,
            disabled_sources: vec![],
            scoring: ScoringConfig::default(),
            parsing: ParsingConfig::default(),
            rate_limiters: Arc::new(RateLimiters::default()),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rebuild the rate limiters for the configured keys (a CrossRef mailto
    /// and an S2 key both allow faster request rates).
    pub fn refresh_rate_limiters(&mut self) {
        self.rate_limiters = Arc::new(RateLimiters::new(
            self.crossref_mailto.is_some(),
            self.s2_api_key.is_some(),
        ));
    }

    pub fn is_source_enabled(&self, name: &str) -> bool {
        !self
            .disabled_sources
            .iter()
            .any(|d| d.eq_ignore_ascii_case(name))
    }
}

/// Verify a batch of citation lines, one after another.
///
/// Progress events are emitted via the callback. Lines not yet started when
/// `cancel` fires are left out of the result.
pub async fn verify_lines(
    lines: Vec<String>,
    config: Config,
    style: CitationStyle,
    progress: impl Fn(VerifyEvent) + Send + Sync,
    cancel: CancellationToken,
) -> Result<Vec<VerifyResult>, CoreError> {
    checker::verify_lines(lines, config, style, progress, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&Status::NotFound).unwrap(), "\"not_found\"");
        assert_eq!(Status::Similar.to_string(), "similar");
    }

    #[test]
    fn test_config_debug_redacts_keys() {
        let config = Config {
            s2_api_key: Some("secret-key".into()),
            crossref_mailto: Some("me@example.org".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(!debug.contains("me@example.org"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_disabled_sources_case_insensitive() {
        let config = Config {
            disabled_sources: vec!["crossref".into()],
            ..Default::default()
        };
        assert!(!config.is_source_enabled("CrossRef"));
        assert!(config.is_source_enabled("CiNii"));
    }

    #[test]
    fn test_refresh_rate_limiters() {
        let mut config = Config {
            crossref_mailto: Some("me@example.org".into()),
            ..Default::default()
        };
        config.refresh_rate_limiters();
        let limiter = config.rate_limiters.get("CrossRef").unwrap();
        assert_eq!(limiter.base_period(), Duration::from_millis(334));
    }
}

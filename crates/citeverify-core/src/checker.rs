use std::sync::Arc;

use citeverify_parsing::{CandidateRecord, CitationExtractor, ParsedCitation};
use tokio_util::sync::CancellationToken;

use crate::db::{SearchSource, USER_AGENT};
use crate::orchestrator::{build_source_list, search_all_sources};
use crate::render::{CitationStyle, render};
use crate::scoring::{decide_status, rank_candidates};
use crate::{Config, CoreError, SourceProgress, Status, VerifyEvent, VerifyResult};

/// Parses citation lines and verifies them against the configured sources.
pub struct Verifier {
    config: Arc<Config>,
    client: reqwest::Client,
    extractor: CitationExtractor,
    /// Fixed source list, replacing the per-citation choice.
    sources: Option<Vec<Arc<dyn SearchSource>>>,
}

impl Verifier {
    pub fn new(config: Config) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let extractor = CitationExtractor::with_config(config.parsing.clone());
        Ok(Self {
            config: Arc::new(config),
            client,
            extractor,
            sources: None,
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Query these sources for every citation instead of choosing by
    /// language and kind. Disabled sources are still skipped.
    pub fn with_sources(mut self, sources: Vec<Arc<dyn SearchSource>>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse a line without searching.
    pub fn parse(&self, line: &str) -> ParsedCitation {
        self.extractor.parse(line)
    }

    fn sources_for(&self, parsed: &ParsedCitation) -> Vec<Arc<dyn SearchSource>> {
        match &self.sources {
            Some(sources) => sources
                .iter()
                .filter(|s| self.config.is_source_enabled(s.name()))
                .cloned()
                .collect(),
            None => build_source_list(&self.config, parsed),
        }
    }

    /// Verify one citation line.
    ///
    /// Lines that are empty or yield no title are reported `not_found`
    /// without searching, with the raw line standing in for the title.
    /// Source failures are reported per source and never fail the line.
    pub async fn verify(
        &self,
        line: &str,
        style: CitationStyle,
        progress: &(dyn Fn(&str, SourceProgress) + Send + Sync),
    ) -> VerifyResult {
        let mut parsed = self.parse(line);

        if line.trim().is_empty() || parsed.search_title().trim().is_empty() {
            tracing::debug!(line, "no title extracted, skipping search");
            parsed.title = line.trim().to_string();
            let rendered = render(&parsed, &CandidateRecord::from(&parsed), style);
            return VerifyResult {
                parsed,
                candidates: vec![],
                status: Status::NotFound,
                rendered,
                sources: vec![],
            };
        }

        let sources = self.sources_for(&parsed);
        let search =
            search_all_sources(&sources, &parsed, &self.config, &self.client, progress).await;

        let candidates = rank_candidates(&parsed, search.candidates, &self.config.scoring);
        let status = decide_status(
            candidates.first().map(|c| c.overall_score),
            &self.config.scoring.thresholds,
        );
        let rendered = match candidates.first() {
            Some(best) => render(&parsed, &best.record, style),
            None => render(&parsed, &CandidateRecord::from(&parsed), style),
        };

        tracing::info!(
            title = parsed.search_title(),
            %status,
            candidates = candidates.len(),
            "verified"
        );

        VerifyResult {
            parsed,
            candidates,
            status,
            rendered,
            sources: search.results,
        }
    }

    /// Verify lines one after another, stopping when `cancel` fires.
    pub async fn verify_all(
        &self,
        lines: &[String],
        style: CitationStyle,
        progress: impl Fn(VerifyEvent) + Send + Sync,
        cancel: CancellationToken,
    ) -> Vec<VerifyResult> {
        let total = lines.len();
        let mut results = Vec::with_capacity(total);

        for (index, line) in lines.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            progress(VerifyEvent::Checking {
                index,
                total,
                line: line.clone(),
            });

            let on_source = |source: &str, p: SourceProgress| {
                progress(VerifyEvent::Source {
                    index,
                    source: source.to_string(),
                    progress: p,
                });
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.verify(line, style, &on_source) => result,
            };

            progress(VerifyEvent::Result {
                index,
                total,
                result: Box::new(result.clone()),
            });
            results.push(result);
        }

        results
    }
}

/// Build a [`Verifier`] from `config` and verify every line.
pub async fn verify_lines(
    lines: Vec<String>,
    config: Config,
    style: CitationStyle,
    progress: impl Fn(VerifyEvent) + Send + Sync,
    cancel: CancellationToken,
) -> Result<Vec<VerifyResult>, CoreError> {
    let verifier = Verifier::new(config)?;
    Ok(verifier.verify_all(&lines, style, progress, cancel).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{MockResponse, MockSource};

    fn no_progress(_: &str, _: SourceProgress) {}

    fn verifier_with(source: MockSource) -> (Verifier, Arc<MockSource>) {
        let mock = Arc::new(source);
        let verifier = Verifier::new(Config::default())
            .unwrap()
            .with_sources(vec![mock.clone() as Arc<dyn SearchSource>]);
        (verifier, mock)
    }

    #[tokio::test]
    async fn test_empty_line_skips_search() {
        let (verifier, mock) = verifier_with(MockSource::with_records("Mock", vec![]));
        let result = verifier.verify("   ", CitationStyle::Apa, &no_progress).await;
        assert_eq!(result.status, Status::NotFound);
        assert!(result.candidates.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_candidates_renders_parsed() {
        let (verifier, mock) = verifier_with(MockSource::new("Mock", MockResponse::empty()));
        let result = verifier
            .verify(
                "Smith, J. (2020). A study of things. Journal of Stuff, 1(2), 3-4.",
                CitationStyle::Apa,
                &no_progress,
            )
            .await;
        assert_eq!(result.status, Status::NotFound);
        assert!(mock.call_count() >= 1);
        assert!(result.rendered.plain().contains("A study of things"));
        assert_eq!(result.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_fixed_source_skipped() {
        let mock = Arc::new(MockSource::with_records("Mock", vec![]));
        let config = Config {
            disabled_sources: vec!["mock".into()],
            ..Default::default()
        };
        let verifier = Verifier::new(config)
            .unwrap()
            .with_sources(vec![mock.clone() as Arc<dyn SearchSource>]);
        let result = verifier
            .verify(
                "Smith, J. (2020). A study of things. Journal of Stuff, 1(2), 3-4.",
                CitationStyle::Apa,
                &no_progress,
            )
            .await;
        assert!(result.sources.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_all_honors_cancellation() {
        let (verifier, mock) = verifier_with(MockSource::new("Mock", MockResponse::empty()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = verifier
            .verify_all(
                &["Smith, J. (2020). A study of things.".to_string()],
                CitationStyle::Apa,
                |_| {},
                cancel,
            )
            .await;
        assert!(results.is_empty());
        assert_eq!(mock.call_count(), 0);
    }
}

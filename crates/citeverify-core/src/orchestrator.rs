use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use citeverify_parsing::identifiers::get_query_words;
use citeverify_parsing::{CandidateRecord, ParsedCitation};

use crate::authors::{is_et_al, split_name};
use crate::db::{SearchQuery, SearchSource};
use crate::matching::normalize_title;
use crate::rate_limit::{SourceError, query_with_retry};
use crate::{Config, SourceProgress, SourceResult, SourceStatus};

/// Words of the title kept for the author-centric stage.
const AUTHOR_STAGE_WORDS: usize = 3;

/// Candidates and per-source outcomes from searching every source for one citation.
#[derive(Debug, Clone, Default)]
pub struct SourceSearch {
    /// Candidates from all sources, in source order.
    pub candidates: Vec<CandidateRecord>,
    pub results: Vec<SourceResult>,
}

/// Build the list of sources to query for a citation, in query order.
///
/// Japanese citations go to CiNii, NDL, then CrossRef. English citations go
/// to CrossRef and Semantic Scholar, plus Google Books for books and
/// chapters. Disabled sources are skipped.
pub fn build_source_list(config: &Config, parsed: &ParsedCitation) -> Vec<Arc<dyn SearchSource>> {
    use crate::db::*;

    let mut sources: Vec<Arc<dyn SearchSource>> = Vec::new();
    let should_include = |name: &str| config.is_source_enabled(name);

    if parsed.language.is_japanese() {
        if should_include("CiNii") {
            sources.push(Arc::new(cinii::CiNii {
                appid: config.cinii_appid.clone(),
            }));
        }
        if should_include("NDL") {
            sources.push(Arc::new(ndl::Ndl));
        }
        if should_include("CrossRef") {
            sources.push(Arc::new(crossref::CrossRef {
                mailto: config.crossref_mailto.clone(),
            }));
        }
    } else {
        if should_include("CrossRef") {
            sources.push(Arc::new(crossref::CrossRef {
                mailto: config.crossref_mailto.clone(),
            }));
        }
        if should_include("Semantic Scholar") {
            sources.push(Arc::new(semantic_scholar::SemanticScholar {
                api_key: config.s2_api_key.clone(),
            }));
        }
        if (parsed.is_book() || parsed.is_book_chapter()) && should_include("Google Books") {
            sources.push(Arc::new(google_books::GoogleBooks {
                api_key: config.google_books_api_key.clone(),
            }));
        }
    }

    sources
}

/// The author used to narrow queries: the first real author, surname only
/// for Western names.
fn query_author(parsed: &ParsedCitation) -> Option<String> {
    let first = parsed.authors.iter().find(|a| !is_et_al(a))?;
    let author = if parsed.language.is_japanese() {
        first.trim().to_string()
    } else {
        split_name(first).1
    };
    (!author.is_empty()).then_some(author)
}

/// The query sequence for one citation, broadest first.
///
/// 1. title only (books only for book citations)
/// 2. title + first author
/// 3. title + first author + journal
/// 4. a few title words + first author
///
/// Stages that need a missing field are left out, as are repeats.
pub fn search_stages(parsed: &ParsedCitation) -> Vec<SearchQuery> {
    let title = parsed.search_title().trim();
    if title.is_empty() {
        return vec![];
    }

    let mut base = SearchQuery::title(title).in_language(parsed.language);
    if parsed.is_book() {
        base = base.books_only();
    }

    let mut stages = vec![base.clone()];
    if let Some(author) = query_author(parsed) {
        stages.push(base.clone().with_author(author.clone()));
        if !parsed.journal.trim().is_empty() {
            stages.push(
                base.clone()
                    .with_author(author.clone())
                    .with_journal(parsed.journal.trim()),
            );
        }
        let words = get_query_words(title, AUTHOR_STAGE_WORDS);
        if !words.is_empty() {
            let sep = if parsed.language.is_japanese() { "" } else { " " };
            stages.push(SearchQuery {
                title: words.join(sep),
                ..base.with_author(author)
            });
        }
    }

    let mut seen = Vec::new();
    stages.retain(|q| {
        if seen.contains(q) {
            false
        } else {
            seen.push(q.clone());
            true
        }
    });
    stages
}

/// Run the search stages against one source.
///
/// Candidates whose normalized title was already seen are dropped. Later
/// stages run only while fewer than `config.good_enough` unique candidates
/// have been collected. A failure in the first stage fails the source; a
/// failure in a later stage keeps what was already found.
pub async fn search_source(
    source: &dyn SearchSource,
    stages: &[SearchQuery],
    config: &Config,
    client: &reqwest::Client,
) -> Result<Vec<CandidateRecord>, SourceError> {
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut found: Vec<CandidateRecord> = Vec::new();

    for (stage, query) in stages.iter().enumerate() {
        if stage > 0 && found.len() >= config.good_enough {
            tracing::debug!(source = source.name(), stage, "good enough, skipping later stages");
            break;
        }

        let records = match query_with_retry(
            source,
            query,
            client,
            config.timeout(),
            &config.rate_limiters,
            &config.retry,
        )
        .await
        {
            Ok(records) => records,
            Err(err) if stage == 0 => return Err(err),
            Err(err) => {
                tracing::warn!(source = source.name(), stage, error = %err, "search stage failed");
                break;
            }
        };

        for mut record in records {
            let key = normalize_title(&record.title);
            if key.is_empty() || !seen_titles.insert(key) {
                continue;
            }
            if record.source.is_empty() {
                record.source = source.name().to_string();
            }
            found.push(record);
        }
    }

    Ok(found)
}

fn status_for_error(err: &SourceError) -> SourceStatus {
    match err {
        SourceError::RateLimited { .. } => SourceStatus::RateLimited,
        SourceError::Timeout => SourceStatus::Timeout,
        _ => SourceStatus::Error,
    }
}

/// Query each source in turn for one citation.
///
/// `progress` is called with `Searching` before each source and exactly once
/// more with `Completed` or `Error` when it finishes. A failing source
/// contributes no candidates and does not stop the others.
pub async fn search_all_sources(
    sources: &[Arc<dyn SearchSource>],
    parsed: &ParsedCitation,
    config: &Config,
    client: &reqwest::Client,
    progress: &(dyn Fn(&str, SourceProgress) + Send + Sync),
) -> SourceSearch {
    let stages = search_stages(parsed);
    let mut search = SourceSearch::default();
    if stages.is_empty() {
        return search;
    }

    for source in sources {
        let name = source.name().to_string();
        progress(&name, SourceProgress::Searching);
        let start = Instant::now();
        let outcome = search_source(source.as_ref(), &stages, config, client).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(records) => {
                tracing::info!(source = %name, count = records.len(), elapsed_ms, "source finished");
                progress(&name, SourceProgress::Completed(records.len()));
                search.results.push(SourceResult {
                    source: name,
                    status: if records.is_empty() {
                        SourceStatus::Empty
                    } else {
                        SourceStatus::Found
                    },
                    candidates: records.len(),
                    elapsed_ms,
                    error_message: None,
                });
                search.candidates.extend(records);
            }
            Err(err) => {
                tracing::warn!(source = %name, error = %err, "source failed");
                progress(&name, SourceProgress::Error(err.to_string()));
                search.results.push(SourceResult {
                    source: name,
                    status: status_for_error(&err),
                    candidates: 0,
                    elapsed_ms,
                    error_message: Some(err.to_string()),
                });
            }
        }
    }

    search
}

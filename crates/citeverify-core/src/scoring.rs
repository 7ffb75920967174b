//! Candidate scoring and ranking.
//!
//! Each candidate gets per-field similarities against the parsed citation
//! and a weighted overall score over the fields present on both sides.

use std::collections::HashSet;

use citeverify_parsing::{CandidateRecord, ParsedCitation};
use serde::{Deserialize, Serialize};

use crate::Status;
use crate::authors::author_similarity;
use crate::matching::{journal_similarity, title_similarity, year_similarity};

/// Field weights for the overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub title: f64,
    pub author: f64,
    pub year: f64,
    pub journal: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            title: 50.0,
            author: 15.0,
            year: 20.0,
            journal: 15.0,
        }
    }
}

/// Score cut-offs for ranking and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Candidates scoring below this are discarded.
    pub min_score: f64,
    /// Best score at or above this is `found`.
    pub found: f64,
    /// Best score at or above this (but below `found`) is `similar`.
    pub similar: f64,
    /// Maximum number of ranked candidates kept.
    pub max_candidates: usize,
    /// Years within this distance count as matching.
    pub year_tolerance: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_score: 50.0,
            found: 90.0,
            similar: 66.0,
            max_candidates: 8,
            year_tolerance: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub thresholds: Thresholds,
}

/// Per-field similarities in 0–100, `None` when the field is missing on either side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Similarities {
    pub title: Option<f64>,
    pub author: Option<f64>,
    pub year: Option<f64>,
    pub journal: Option<f64>,
}

impl Similarities {
    /// Weighted mean over the present fields. Zero when nothing is present.
    pub fn overall(&self, weights: &ScoreWeights) -> f64 {
        let fields = [
            (self.title, weights.title),
            (self.author, weights.author),
            (self.year, weights.year),
            (self.journal, weights.journal),
        ];
        let (sum, total) = fields
            .iter()
            .filter_map(|(s, w)| s.map(|s| (s * w, *w)))
            .fold((0.0, 0.0), |(sum, total), (sw, w)| (sum + sw, total + w));
        if total > 0.0 { sum / total } else { 0.0 }
    }
}

/// A candidate with its similarities and overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub record: CandidateRecord,
    pub similarities: Similarities,
    pub overall_score: f64,
}

/// Compare one candidate field by field against the parsed citation.
pub fn similarities(
    parsed: &ParsedCitation,
    candidate: &CandidateRecord,
    config: &ScoringConfig,
) -> Similarities {
    Similarities {
        title: title_similarity(parsed.search_title(), &candidate.title),
        author: author_similarity(&parsed.authors, &candidate.authors),
        year: year_similarity(
            &parsed.year,
            &candidate.year,
            config.thresholds.year_tolerance,
        ),
        journal: journal_similarity(&parsed.journal, comparable_venue(candidate)),
    }
}

/// The candidate field that plays the role of the parsed `journal`.
fn comparable_venue(candidate: &CandidateRecord) -> &str {
    if candidate.is_book_chapter() && !candidate.book_title.is_empty() {
        &candidate.book_title
    } else {
        &candidate.journal
    }
}

/// Score a single candidate.
pub fn score_candidate(
    parsed: &ParsedCitation,
    candidate: CandidateRecord,
    config: &ScoringConfig,
) -> ScoredCandidate {
    let sims = similarities(parsed, &candidate, config);
    let overall_score = sims.overall(&config.weights);
    ScoredCandidate {
        record: candidate,
        similarities: sims,
        overall_score,
    }
}

/// Rank candidates from all sources.
///
/// Untitled candidates are discarded, the rest scored; those below the
/// minimum score are dropped, DOI duplicates removed (first wins,
/// case-insensitive), then sorted by score descending and truncated.
pub fn rank_candidates(
    parsed: &ParsedCitation,
    candidates: Vec<CandidateRecord>,
    config: &ScoringConfig,
) -> Vec<ScoredCandidate> {
    let thresholds = &config.thresholds;
    let mut seen_dois: HashSet<String> = HashSet::new();

    let mut ranked: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| !c.title.trim().is_empty())
        .map(|c| score_candidate(parsed, c, config))
        .filter(|sc| sc.overall_score >= thresholds.min_score)
        .filter(|sc| {
            let doi = sc.record.doi.trim().to_lowercase();
            doi.is_empty() || seen_dois.insert(doi)
        })
        .collect();

    // Stable sort keeps source order among equal scores
    ranked.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
    ranked.truncate(thresholds.max_candidates);

    tracing::debug!(
        kept = ranked.len(),
        best = ranked.first().map(|c| c.overall_score),
        "ranked candidates"
    );
    ranked
}

/// Status from the best candidate's score.
pub fn decide_status(best_score: Option<f64>, thresholds: &Thresholds) -> Status {
    match best_score {
        Some(s) if s >= thresholds.found => Status::Found,
        Some(s) if s >= thresholds.similar => Status::Similar,
        _ => Status::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeverify_parsing::RecordKind;

    fn parsed() -> ParsedCitation {
        ParsedCitation {
            title: "Attention is all you need".into(),
            authors: vec!["A. Vaswani".into(), "N. Shazeer".into()],
            year: "2017".into(),
            journal: "Advances in Neural Information Processing Systems".into(),
            ..Default::default()
        }
    }

    fn record(title: &str, doi: &str) -> CandidateRecord {
        CandidateRecord {
            doi: doi.into(),
            ..CandidateRecord::new("Mock", title)
        }
    }

    #[test]
    fn test_overall_renormalizes_over_present_fields() {
        let weights = ScoreWeights::default();
        let sims = Similarities {
            title: Some(100.0),
            author: None,
            year: Some(0.0),
            journal: None,
        };
        // (50*100 + 20*0) / 70
        assert!((sims.overall(&weights) - 5000.0 / 70.0).abs() < 1e-9);
        assert_eq!(Similarities::default().overall(&weights), 0.0);
    }

    #[test]
    fn test_exact_candidate_scores_100() {
        let cand = CandidateRecord {
            authors: vec!["Ashish Vaswani".into(), "Noam Shazeer".into()],
            year: "2017".into(),
            journal: "Advances in Neural Information Processing Systems".into(),
            ..record("Attention Is All You Need", "")
        };
        let scored = score_candidate(&parsed(), cand, &ScoringConfig::default());
        assert_eq!(scored.similarities.title, Some(100.0));
        assert_eq!(scored.similarities.author, Some(100.0));
        assert_eq!(scored.similarities.year, Some(100.0));
        assert!((scored.overall_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_never_rises_as_title_shortens() {
        let config = ScoringConfig::default();
        let full: Vec<char> = "Attention Is All You Need".chars().collect();
        let mut last = f64::INFINITY;
        for len in (1..=full.len()).rev() {
            let cand = CandidateRecord {
                authors: vec!["Ashish Vaswani".into(), "Noam Shazeer".into()],
                year: "2017".into(),
                journal: "Advances in Neural Information Processing Systems".into(),
                ..record(&full[..len].iter().collect::<String>(), "")
            };
            let score = score_candidate(&parsed(), cand, &config).overall_score;
            assert!(score <= last + 1e-9, "len {len}: {score} > {last}");
            last = score;
        }
        assert!(last < 100.0);
    }

    #[test]
    fn test_chapter_venue_is_book_title() {
        let parsed = ParsedCitation {
            title: "Encoding/decoding".into(),
            journal: "Culture, Media, Language".into(),
            kind: RecordKind::BookChapter,
            ..Default::default()
        };
        let cand = CandidateRecord {
            kind: RecordKind::BookChapter,
            book_title: "Culture, Media, Language".into(),
            ..record("Encoding/decoding", "")
        };
        let sims = similarities(&parsed, &cand, &ScoringConfig::default());
        assert_eq!(sims.journal, Some(100.0));
    }

    #[test]
    fn test_rank_filters_dedupes_sorts() {
        let candidates = vec![
            record("", "10.1/empty"),
            record("Attention is all you need (extended)", "10.1/A"),
            record("Attention is all you need", "10.1/a"),
            record("Attention is all you need", "10.1/b"),
            record("Completely unrelated work on cats", ""),
        ];
        let ranked = rank_candidates(&parsed(), candidates, &ScoringConfig::default());
        let dois: Vec<&str> = ranked.iter().map(|c| c.record.doi.as_str()).collect();
        // 10.1/a is a case-insensitive duplicate of 10.1/A, which came first
        assert_eq!(dois, vec!["10.1/b", "10.1/A"]);
        assert!(ranked[0].overall_score >= ranked[1].overall_score);
    }

    #[test]
    fn test_rank_truncates() {
        let candidates = (0..12)
            .map(|i| record("Attention is all you need", &format!("10.1/{i}")))
            .collect();
        let ranked = rank_candidates(&parsed(), candidates, &ScoringConfig::default());
        assert_eq!(ranked.len(), 8);
    }

    #[test]
    fn test_decide_status() {
        let t = Thresholds::default();
        assert_eq!(decide_status(Some(95.0), &t), Status::Found);
        assert_eq!(decide_status(Some(90.0), &t), Status::Found);
        assert_eq!(decide_status(Some(70.0), &t), Status::Similar);
        assert_eq!(decide_status(Some(60.0), &t), Status::NotFound);
        assert_eq!(decide_status(None, &t), Status::NotFound);
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let mut config = ScoringConfig::default();
        config.thresholds.min_score = 99.0;
        let ranked = rank_candidates(
            &parsed(),
            vec![record("Attention is all you need!", "")],
            &config,
        );
        assert!(ranked.is_empty());
    }
}

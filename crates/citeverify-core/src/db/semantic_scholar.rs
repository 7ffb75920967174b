use super::{SearchFuture, SearchQuery, SearchSource, USER_AGENT, fetch_json, json_str, json_strings};
use citeverify_parsing::identifiers::get_query_words;
use citeverify_parsing::{CandidateRecord, RecordKind, normalize_authors};
use serde_json::Value;
use std::time::Duration;

const FIELDS: &str = "title,authors,year,venue,journal,externalIds,url,publicationTypes";

pub struct SemanticScholar {
    pub api_key: Option<String>,
}

impl SearchSource for SemanticScholar {
    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SearchFuture<'a> {
        Box::pin(async move {
            let mut words = get_query_words(&query.title, 8);
            if let Some(ref author) = query.author {
                words.push(author.clone());
            }
            let url = format!(
                "https://api.semanticscholar.org/graph/v1/paper/search?query={}&limit=10&fields={}",
                urlencoding::encode(&words.join(" ")),
                FIELDS
            );

            let mut request = client
                .get(&url)
                .header("User-Agent", USER_AGENT)
                .timeout(timeout);
            if let Some(ref key) = self.api_key {
                request = request.header("x-api-key", key);
            }

            let data = fetch_json(request).await?;
            Ok(parse_search(&data))
        })
    }
}

/// Parse a `/paper/search` response into candidates.
pub fn parse_search(data: &Value) -> Vec<CandidateRecord> {
    data["data"]
        .as_array()
        .map(|items| items.iter().filter_map(parse_paper).collect())
        .unwrap_or_default()
}

fn parse_paper(item: &Value) -> Option<CandidateRecord> {
    let title = json_str(&item["title"])?;
    let names: Vec<String> = item["authors"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|a| json_str(&a["name"])).collect())
        .unwrap_or_default();

    let types = json_strings(&item["publicationTypes"]);
    let kind = if types.iter().any(|t| t.eq_ignore_ascii_case("Book")) {
        RecordKind::Book
    } else if types.iter().any(|t| t.eq_ignore_ascii_case("BookSection")) {
        RecordKind::BookChapter
    } else {
        RecordKind::Article
    };

    let journal = json_str(&item["journal"]["name"])
        .or_else(|| json_str(&item["venue"]))
        .unwrap_or_default();
    let doi = json_str(&item["externalIds"]["DOI"]).unwrap_or_default();

    Some(CandidateRecord {
        source: "Semantic Scholar".into(),
        title,
        authors: normalize_authors(&names, Some("semantic_scholar")),
        year: json_str(&item["year"]).unwrap_or_default(),
        url: json_str(&item["url"]).unwrap_or_default(),
        doi,
        book_title: if kind == RecordKind::BookChapter {
            journal.clone()
        } else {
            String::new()
        },
        journal,
        volume: json_str(&item["journal"]["volume"]).unwrap_or_default(),
        pages: json_str(&item["journal"]["pages"])
            .map(|p| p.trim().replace(['–', '—'], "-"))
            .unwrap_or_default(),
        kind,
        original_data: item.clone(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search() {
        let data = json!({
            "total": 2,
            "data": [
                {
                    "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
                    "title": "Attention is All you Need",
                    "authors": [{"authorId": "1", "name": "Ashish Vaswani"}, {"name": "Noam M. Shazeer"}],
                    "year": 2017,
                    "venue": "Neural Information Processing Systems",
                    "journal": {"name": "", "pages": " 5998-6008", "volume": "30"},
                    "externalIds": {"ArXiv": "1706.03762", "DOI": "10.5555/3295222.3295349"},
                    "url": "https://www.semanticscholar.org/paper/204e",
                    "publicationTypes": ["JournalArticle", "Conference"]
                },
                {"paperId": "x", "title": null}
            ]
        });
        let records = parse_search(&data);
        assert_eq!(records.len(), 1);
        let paper = &records[0];
        assert_eq!(paper.title, "Attention is All you Need");
        assert_eq!(paper.authors, vec!["Ashish Vaswani", "Noam M. Shazeer"]);
        assert_eq!(paper.year, "2017");
        assert_eq!(paper.journal, "Neural Information Processing Systems");
        assert_eq!(paper.volume, "30");
        assert_eq!(paper.pages, "5998-6008");
        assert_eq!(paper.doi, "10.5555/3295222.3295349");
        assert_eq!(paper.kind, RecordKind::Article);
    }

    #[test]
    fn test_book_type() {
        let data = json!({"data": [{"title": "Deep Learning", "publicationTypes": ["Book"]}]});
        assert_eq!(parse_search(&data)[0].kind, RecordKind::Book);
    }

    #[test]
    fn test_missing_data() {
        assert!(parse_search(&json!({"total": 0})).is_empty());
    }
}

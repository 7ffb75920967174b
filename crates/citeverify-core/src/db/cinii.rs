use super::{
    KindFilter, SearchFuture, SearchQuery, SearchSource, USER_AGENT, fetch_json, json_str,
    json_strings, kind_from_label, page_range, year_from_date,
};
use citeverify_parsing::{CandidateRecord, RecordKind, normalize_authors};
use serde_json::Value;
use std::time::Duration;

/// CiNii Research OpenSearch (JSON-LD flavour).
pub struct CiNii {
    pub appid: Option<String>,
}

impl CiNii {
    fn url(&self, query: &SearchQuery) -> String {
        let endpoint = match query.kind {
            KindFilter::Books => "books",
            KindFilter::All => "all",
        };
        let mut url = format!(
            "https://cir.nii.ac.jp/opensearch/{endpoint}?title={}&count=20&format=json",
            urlencoding::encode(&query.title)
        );
        if let Some(ref author) = query.author {
            url.push_str(&format!("&creator={}", urlencoding::encode(author)));
        }
        if let Some(ref journal) = query.journal {
            url.push_str(&format!("&publicationTitle={}", urlencoding::encode(journal)));
        }
        if let Some(ref appid) = self.appid {
            url.push_str(&format!("&appid={}", urlencoding::encode(appid)));
        }
        url
    }
}

impl SearchSource for CiNii {
    fn name(&self) -> &str {
        "CiNii"
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SearchFuture<'a> {
        Box::pin(async move {
            let request = client
                .get(self.url(query))
                .header("User-Agent", USER_AGENT)
                .timeout(timeout);
            let data = fetch_json(request).await?;
            Ok(parse_opensearch(&data))
        })
    }
}

/// Parse an OpenSearch JSON response into candidates.
pub fn parse_opensearch(data: &Value) -> Vec<CandidateRecord> {
    data["items"]
        .as_array()
        .map(|items| items.iter().filter_map(parse_item).collect())
        .unwrap_or_default()
}

fn parse_item(item: &Value) -> Option<CandidateRecord> {
    let title = json_str(&item["title"]).or_else(|| json_str(&item["dc:title"]))?;

    let kind = json_str(&item["dc:type"])
        .map(|t| kind_from_label(&t))
        .unwrap_or_default();

    let doi = item["dc:identifier"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|id| {
            id["@type"]
                .as_str()
                .is_some_and(|t| t.to_ascii_uppercase().ends_with("DOI"))
        })
        .and_then(|id| json_str(&id["@value"]))
        .unwrap_or_default();
    let isbn = item["dc:identifier"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|id| {
            id["@type"]
                .as_str()
                .is_some_and(|t| t.to_ascii_uppercase().ends_with("ISBN"))
        })
        .and_then(|id| json_str(&id["@value"]));

    let field = |key: &str| json_str(&item[key]).unwrap_or_default();
    let journal = field("prism:publicationName");

    Some(CandidateRecord {
        source: "CiNii".into(),
        title,
        authors: normalize_authors(&json_strings(&item["dc:creator"]), Some("cinii")),
        year: year_from_date(&field("prism:publicationDate")),
        url: json_str(&item["link"]["@id"])
            .or_else(|| json_str(&item["@id"]))
            .unwrap_or_default(),
        doi,
        volume: field("prism:volume"),
        issue: field("prism:number"),
        pages: page_range(&field("prism:startingPage"), &field("prism:endingPage")),
        publisher: json_strings(&item["dc:publisher"])
            .into_iter()
            .next()
            .unwrap_or_default(),
        book_title: if kind == RecordKind::BookChapter {
            journal.clone()
        } else {
            String::new()
        },
        journal: if kind == RecordKind::Book {
            String::new()
        } else {
            journal
        },
        kind,
        isbn,
        original_data: item.clone(),
        ..Default::default()
    })
}

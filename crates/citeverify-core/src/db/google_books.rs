use super::{
    SearchFuture, SearchQuery, SearchSource, USER_AGENT, fetch_json, json_str, json_strings,
    year_from_date,
};
use citeverify_parsing::{CandidateRecord, RecordKind, normalize_authors};
use serde_json::Value;
use std::time::Duration;

pub struct GoogleBooks {
    pub api_key: Option<String>,
}

impl GoogleBooks {
    fn url(&self, query: &SearchQuery) -> String {
        let mut q = format!("intitle:{}", query.title);
        if let Some(ref author) = query.author {
            q.push_str(&format!(" inauthor:{author}"));
        }
        let mut url = format!(
            "https://www.googleapis.com/books/v1/volumes?q={}&maxResults=10&printType=books",
            urlencoding::encode(&q)
        );
        if let Some(ref key) = self.api_key {
            url.push_str(&format!("&key={}", urlencoding::encode(key)));
        }
        url
    }
}

impl SearchSource for GoogleBooks {
    fn name(&self) -> &str {
        "Google Books"
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
            Ok(parse_volumes(&data))
        })
    }
}

/// Parse a `/volumes` response into book candidates.
pub fn parse_volumes(data: &Value) -> Vec<CandidateRecord> {
    data["items"]
        .as_array()
        .map(|items| items.iter().filter_map(parse_volume).collect())
        .unwrap_or_default()
}

fn parse_volume(item: &Value) -> Option<CandidateRecord> {
    let info = &item["volumeInfo"];
    let mut title = json_str(&info["title"])?;
    if let Some(subtitle) = json_str(&info["subtitle"]) {
        title = format!("{title}: {subtitle}");
    }

    let identifiers = info["industryIdentifiers"].as_array();
    let isbn_of = |kind: &str| {
        identifiers
            .into_iter()
            .flatten()
            .find(|id| id["type"].as_str() == Some(kind))
            .and_then(|id| json_str(&id["identifier"]))
    };

    Some(CandidateRecord {
        source: "Google Books".into(),
        title,
        authors: normalize_authors(&json_strings(&info["authors"]), Some("google_books")),
        year: year_from_date(&json_str(&info["publishedDate"]).unwrap_or_default()),
        publisher: json_str(&info["publisher"]).unwrap_or_default(),
        url: json_str(&info["infoLink"])
            .or_else(|| json_str(&item["selfLink"]))
            .unwrap_or_default(),
        kind: RecordKind::Book,
        isbn: isbn_of("ISBN_13").or_else(|| isbn_of("ISBN_10")),
        original_data: item.clone(),
        ..Default::default()
    })
}

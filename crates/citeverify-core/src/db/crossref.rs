use super::{
    KindFilter, SearchFuture, SearchQuery, SearchSource, USER_AGENT, fetch_json, json_str,
    json_strings, kind_from_label, strip_markup,
};
use citeverify_parsing::identifiers::get_query_words;
use citeverify_parsing::{CandidateRecord, RecordKind, normalize_authors};
use serde_json::Value;
use std::time::Duration;

pub struct CrossRef {
    pub mailto: Option<String>,
}

impl CrossRef {
    fn url(&self, query: &SearchQuery) -> String {
        let words = get_query_words(&query.title, 10);
        let mut url = format!(
            "https://api.crossref.org/works?query.bibliographic={}&rows=10",
            urlencoding::encode(&words.join(" "))
        );
        if let Some(ref author) = query.author {
            url.push_str(&format!("&query.author={}", urlencoding::encode(author)));
        }
        if let Some(ref journal) = query.journal {
            url.push_str(&format!(
                "&query.container-title={}",
                urlencoding::encode(journal)
            ));
        }
        if query.kind == KindFilter::Books {
            url.push_str("&filter=type:book,type:monograph,type:edited-book,type:book-chapter");
        }
        if let Some(ref email) = self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(email)));
        }
        url
    }
}

impl SearchSource for CrossRef {
    fn name(&self) -> &str {
        "CrossRef"
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SearchFuture<'a> {
        Box::pin(async move {
            let user_agent = match self.mailto {
                Some(ref email) => format!("{USER_AGENT} (mailto:{email})"),
                None => USER_AGENT.to_string(),
            };
            let request = client
                .get(self.url(query))
                .header("User-Agent", user_agent)
                .timeout(timeout);
            let data = fetch_json(request).await?;
            Ok(parse_works(&data))
        })
    }
}

/// Parse a `/works` response into candidates.
pub fn parse_works(data: &Value) -> Vec<CandidateRecord> {
    data["message"]["items"]
        .as_array()
        .map(|items| items.iter().filter_map(parse_item).collect())
        .unwrap_or_default()
}

fn parse_item(item: &Value) -> Option<CandidateRecord> {
    let mut title = strip_markup(&json_str(&item["title"])?);
    if let Some(subtitle) = json_str(&item["subtitle"]) {
        let subtitle = strip_markup(&subtitle);
        if !title.to_lowercase().contains(&subtitle.to_lowercase()) {
            title = format!("{title}: {subtitle}");
        }
    }

    let kind = item["type"]
        .as_str()
        .map(kind_from_label)
        .unwrap_or_default();
    let container = json_str(&item["container-title"]).map(|c| strip_markup(&c)).unwrap_or_default();

    let year = ["issued", "published-print", "published-online", "created"]
        .iter()
        .find_map(|key| item[*key]["date-parts"][0][0].as_i64())
        .map(|y| y.to_string())
        .unwrap_or_default();

    let doi = json_str(&item["DOI"]).unwrap_or_default();
    let url = if doi.is_empty() {
        json_str(&item["URL"]).unwrap_or_default()
    } else {
        format!("https://doi.org/{doi}")
    };

    Some(CandidateRecord {
        source: "CrossRef".into(),
        title,
        authors: normalize_authors(&people(&item["author"]), Some("crossref")),
        editors: normalize_authors(&people(&item["editor"]), Some("crossref")),
        year,
        doi,
        url,
        journal: container.clone(),
        volume: json_str(&item["volume"]).unwrap_or_default(),
        issue: json_str(&item["issue"]).unwrap_or_default(),
        pages: json_str(&item["page"])
            .map(|p| p.replace(['–', '—'], "-"))
            .unwrap_or_default(),
        publisher: if kind == RecordKind::Article {
            String::new()
        } else {
            json_str(&item["publisher"]).unwrap_or_default()
        },
        book_title: if kind == RecordKind::BookChapter {
            container
        } else {
            String::new()
        },
        kind,
        isbn: json_strings(&item["ISBN"]).into_iter().next(),
        original_data: item.clone(),
    })
}

/// CrossRef people are `{given, family}` or `{name}` for organizations.
fn people(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|a| {
                    let given = a["given"].as_str().unwrap_or("");
                    let family = a["family"].as_str().unwrap_or("");
                    let name = format!("{given} {family}").trim().to_string();
                    if name.is_empty() {
                        json_str(&a["name"])
                    } else {
                        Some(name)
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

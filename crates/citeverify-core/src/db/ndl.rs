use super::{
    KindFilter, SearchFuture, SearchQuery, SearchSource, USER_AGENT, fetch_text, kind_from_label,
    year_from_date,
};
use crate::rate_limit::SourceError;
use citeverify_parsing::{CandidateRecord, RecordKind, normalize_authors};
use std::time::Duration;

/// National Diet Library Search, OpenSearch RSS endpoint.
pub struct Ndl;

impl Ndl {
    fn url(query: &SearchQuery) -> String {
        let mut url = format!(
            "https://ndlsearch.ndl.go.jp/api/opensearch?title={}&cnt=10",
            urlencoding::encode(&query.title)
        );
        if let Some(ref author) = query.author {
            url.push_str(&format!("&creator={}", urlencoding::encode(author)));
        }
        if query.kind == KindFilter::Books {
            url.push_str("&mediatype=1");
        }
        url
    }
}

impl SearchSource for Ndl {
    fn name(&self) -> &str {
        "NDL"
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> SearchFuture<'a> {
        Box::pin(async move {
            let request = client
                .get(Self::url(query))
                .header("User-Agent", USER_AGENT)
                .timeout(timeout);
            let body = fetch_text(request).await?;
            parse_rss(&body)
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Creator,
    Publisher,
    Issued,
    Date,
    Isbn,
    Category,
    Volume,
}

#[derive(Default)]
struct Item {
    title: String,
    link: String,
    creators: Vec<String>,
    publisher: String,
    issued: String,
    date: String,
    isbn: String,
    category: String,
    volume: String,
}

impl Item {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Creator => match self.creators.last_mut() {
                Some(last) => last,
                None => return,
            },
            Field::Publisher => &mut self.publisher,
            Field::Issued => &mut self.issued,
            Field::Date => &mut self.date,
            Field::Isbn => &mut self.isbn,
            Field::Category => &mut self.category,
            Field::Volume => &mut self.volume,
        };
        slot.push_str(text);
    }

    fn into_record(self) -> Option<CandidateRecord> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        let kind = if self.category.trim().is_empty() {
            RecordKind::Book
        } else {
            kind_from_label(&self.category)
        };
        let year = match year_from_date(&self.issued) {
            y if y.is_empty() => year_from_date(&self.date),
            y => y,
        };
        let isbn = self.isbn.trim().replace('-', "");
        let original_data = serde_json::json!({
            "title": title,
            "link": self.link.trim(),
            "creators": self.creators,
            "publisher": self.publisher.trim(),
            "issued": self.issued.trim(),
            "category": self.category.trim(),
        });

        Some(CandidateRecord {
            source: "NDL".into(),
            title,
            authors: normalize_authors(&self.creators, Some("ndl")),
            year,
            url: self.link.trim().to_string(),
            volume: self.volume.trim().to_string(),
            publisher: self.publisher.trim().to_string(),
            kind,
            isbn: (!isbn.is_empty()).then_some(isbn),
            original_data,
            ..Default::default()
        })
    }
}

/// Parse an NDL OpenSearch RSS document into candidates.
pub fn parse_rss(xml: &str) -> Result<Vec<CandidateRecord>, SourceError> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut records = Vec::new();
    let mut current: Option<Item> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                let prefix = e.name().prefix().map(|p| p.as_ref().to_vec());
                match local.as_ref() {
                    b"item" => current = Some(Item::default()),
                    _ if current.is_none() => {}
                    // <title> and <dc:title> repeat each other; keep the first.
                    b"title" if current.as_ref().is_some_and(|i| i.title.is_empty()) => {
                        field = Some(Field::Title)
                    }
                    b"link" => field = Some(Field::Link),
                    b"creator" => {
                        if let Some(item) = current.as_mut() {
                            item.creators.push(String::new());
                        }
                        field = Some(Field::Creator);
                    }
                    b"publisher" => field = Some(Field::Publisher),
                    b"issued" => field = Some(Field::Issued),
                    b"date" => field = Some(Field::Date),
                    b"category" => field = Some(Field::Category),
                    b"volume" if prefix.as_deref() == Some(&b"dcndl"[..]) => {
                        field = Some(Field::Volume)
                    }
                    b"identifier" => {
                        let is_isbn = e.attributes().flatten().any(|attr| {
                            attr.key.local_name().as_ref() == b"type"
                                && String::from_utf8_lossy(&attr.value)
                                    .to_ascii_uppercase()
                                    .ends_with("ISBN")
                        });
                        if is_isbn {
                            field = Some(Field::Isbn);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    let text = e.unescape().unwrap_or_default();
                    item.push(f, &text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    item.push(f, &String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"item"
                    && let Some(record) = current.take().and_then(Item::into_record)
                {
                    records.push(record);
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Malformed(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:dcterms="http://purl.org/dc/terms/"
     xmlns:dcndl="http://ndl.go.jp/dcndl/terms/"
     xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <channel>
    <title>人工知能 - 国立国会図書館サーチ</title>
    <item>
      <title>人工知能と社会</title>
      <link>https://ndlsearch.ndl.go.jp/books/R100000002-I000001</link>
      <author>田中, 太郎, 1970-</author>
      <category>図書</category>
      <dc:title>人工知能と社会</dc:title>
      <dc:creator>田中, 太郎, 1970-</dc:creator>
      <dc:creator>佐藤／花子</dc:creator>
      <dc:publisher>学術出版社</dc:publisher>
      <dcterms:issued xsi:type="dcterms:W3CDTF">2020.4</dcterms:issued>
      <dc:identifier xsi:type="dcndl:ISBN">978-4-00-000000-0</dc:identifier>
    </item>
    <item>
      <title>統計学入門 &amp; 演習</title>
      <dc:date>1998</dc:date>
    </item>
    <item>
      <title></title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_book_item() {
        let records = parse_rss(FEED).unwrap();
        assert_eq!(records.len(), 2);
        let book = &records[0];
        assert_eq!(book.title, "人工知能と社会");
        assert_eq!(book.authors, vec!["田中太郎", "佐藤花子"]);
        assert_eq!(book.publisher, "学術出版社");
        assert_eq!(book.year, "2020");
        assert_eq!(book.isbn.as_deref(), Some("9784000000000"));
        assert_eq!(book.kind, RecordKind::Book);
        assert_eq!(book.url, "https://ndlsearch.ndl.go.jp/books/R100000002-I000001");
    }

    #[test]
    fn test_entities_and_date_fallback() {
        let records = parse_rss(FEED).unwrap();
        assert_eq!(records[1].title, "統計学入門 & 演習");
        assert_eq!(records[1].year, "1998");
        assert!(records[1].authors.is_empty());
    }

    #[test]
    fn test_channel_title_ignored() {
        let records = parse_rss(FEED).unwrap();
        assert!(records.iter().all(|r| !r.title.contains("国立国会図書館")));
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_rss("<rss><item><title>x</item>").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;
use crate::text_processing::{char_len, trim_field};

/// Built-in publisher patterns in priority order. The name is the `name` group.
static PUBLISHER_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            // 東京: 学術出版社 / 岩波書店 / 講談社
            "japanese suffix",
            Regex::new(
                r"(?:[^\s,.:()「」『』]+\s*:\s*)?(?P<name>[^\s,.:()「」『』]+?(?:出版社|出版会|出版部|出版|書店|書房|新社|社))(?:$|[\s,.()「」『』:])",
            )
            .unwrap(),
        ),
        (
            // Oxford University Press / Basic Books / Springer Verlag
            "english press",
            Regex::new(
                r"(?P<name>(?:[A-Z][\w'&\-]*\s+)*(?:[A-Z][\w\-]*-)?(?:University Press|Press|Publishing(?: Group| Company)?|Publishers|Books|Verlag))\b",
            )
            .unwrap(),
        ),
        (
            // Éditions Gallimard / Presses Universitaires de France
            "french editions",
            Regex::new(r"(?P<name>(?:Éditions|Editions|Presses)(?:\s+(?:de\s+|du\s+)?\p{Lu}[\w'\-]*)+)")
                .unwrap(),
        ),
        (
            // New York: Routledge / New York: Farrar, Straus and Giroux
            "city: publisher",
            Regex::new(
                r"(?:^|\.\s+)\p{Lu}[\p{L} .]*?:\s*(?P<name>\p{Lu}[^,.;()]*(?:,\s*\p{Lu}[^,.;()]*)*)",
            )
            .unwrap(),
        ),
    ]
});

/// Find the publisher in the text after the title.
///
/// Every pattern (built-in, known-publisher list, configured extras) is tried;
/// the longest name wins and ties go to the earlier pattern.
pub fn extract_publisher(after_title: &str, config: &ParsingConfig) -> Option<String> {
    let mut candidates: Vec<(usize, &str, String)> = Vec::new();

    for (priority, (name, re)) in PUBLISHER_PATTERNS.iter().enumerate() {
        for caps in re.captures_iter(after_title) {
            if let Some(m) = caps.name("name") {
                candidates.push((priority, *name, trim_field(m.as_str()).to_string()));
            }
        }
    }

    let known_priority = PUBLISHER_PATTERNS.len();
    for publisher in config.resolved_known_publishers() {
        if after_title.contains(publisher.as_str()) {
            candidates.push((known_priority, "known publisher", publisher));
        }
    }

    for re in &config.publisher_patterns {
        for caps in re.captures_iter(after_title) {
            let m = caps.get(1).or_else(|| caps.get(0));
            if let Some(m) = m {
                candidates.push((known_priority + 1, "configured", trim_field(m.as_str()).to_string()));
            }
        }
    }

    let (_, pattern, publisher) = candidates
        .into_iter()
        .filter(|(_, _, name)| !name.is_empty())
        .max_by(|(pa, _, a), (pb, _, b)| char_len(a).cmp(&char_len(b)).then(pb.cmp(pa)))?;

    tracing::debug!(pattern, publisher = %publisher, "publisher extracted");
    Some(publisher)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(text: &str) -> Option<String> {
        extract_publisher(text, &ParsingConfig::default())
    }

    #[test]
    fn test_japanese_location_prefixed() {
        assert_eq!(publisher(" 東京: 学術出版社."), Some("学術出版社".into()));
        assert_eq!(publisher(" 岩波書店."), Some("岩波書店".into()));
    }

    #[test]
    fn test_japanese_suffix_needs_boundary() {
        assert_eq!(publisher(" 教育社会学研究, 33, 1-10."), None);
    }

    #[test]
    fn test_english_press() {
        assert_eq!(publisher(". Oxford: Oxford University Press."), Some("Oxford University Press".into()));
        assert_eq!(publisher(". New York: Basic Books."), Some("Basic Books".into()));
    }

    #[test]
    fn test_known_publisher() {
        assert_eq!(publisher(". London: Routledge."), Some("Routledge".into()));
    }

    #[test]
    fn test_city_publisher_longest_wins() {
        assert_eq!(publisher(". Berlin: Springer Nature."), Some("Springer Nature".into()));
    }

    #[test]
    fn test_city_publisher_keeps_comma_names() {
        assert_eq!(
            publisher(". New York: Farrar, Straus and Giroux."),
            Some("Farrar, Straus and Giroux".into())
        );
        assert_eq!(publisher(". London: Routledge, 2019."), Some("Routledge".into()));
    }

    #[test]
    fn test_french() {
        assert_eq!(publisher(". Paris: Éditions Gallimard."), Some("Éditions Gallimard".into()));
    }

    #[test]
    fn test_none_for_journal_tail() {
        assert_eq!(publisher(". Journal of Medical Research, 45(3), 123-145."), None);
    }

    #[test]
    fn test_configured_pattern() {
        let config = crate::config::ParsingConfigBuilder::new()
            .add_publisher_pattern(r"(Editorial \w+)".to_string())
            .build()
            .unwrap();
        assert_eq!(
            extract_publisher(". Madrid: editorial. Editorial Gredos.", &config),
            Some("Editorial Gredos".into())
        );
    }
}

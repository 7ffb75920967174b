use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::text_processing::normalize_range;

/// Volume, issue and page range pulled from a citation. Empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeInfo {
    pub volume: String,
    pub issue: String,
    pub pages: String,
}

impl VolumeInfo {
    pub fn is_empty(&self) -> bool {
        self.volume.is_empty() && self.issue.is_empty() && self.pages.is_empty()
    }

    /// Fill still-empty fields from the named groups of a match.
    fn fill_from(&mut self, caps: &Captures<'_>) -> bool {
        let mut filled = false;
        for (group, field) in [
            ("volume", &mut self.volume),
            ("issue", &mut self.issue),
            ("pages", &mut self.pages),
        ] {
            if field.is_empty()
                && let Some(m) = caps.name(group)
            {
                *field = if group == "volume" {
                    m.as_str().to_string()
                } else {
                    normalize_range(m.as_str())
                };
                filled = true;
            }
        }
        filled
    }
}

const PAGE_RANGE: &str = r"\d+\s*[-–—]\s*\d+";

/// Combined volume/issue/pages forms, most specific first.
static COMBINED: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            // 45(3), 123-145 / 45(3-4): e12
            "volume(issue), pages",
            Regex::new(&format!(
                r"(?P<volume>\d+)\s*\(\s*(?P<issue>\d{{1,3}}(?:\s*[-–/]\s*\d{{1,3}})?)\s*\)\s*[,:]\s*(?:pp?\.\s*)?(?P<pages>{PAGE_RANGE}|[A-Za-z]?\d+)"
            ))
            .unwrap(),
        ),
        (
            // vol. 12, no. 3, pp. 45-67
            "vol. no. pp.",
            Regex::new(&format!(
                r"(?i)(?:^|[^a-z])vol(?:ume)?\.?\s*(?P<volume>\d+)\s*,?\s*(?:no\.|issue|num\.)\s*(?P<issue>\d+)(?:\s*,?\s*(?:pp?\.\s*)?(?P<pages>{PAGE_RANGE}))?"
            ))
            .unwrap(),
        ),
        (
            // 第12巻第3号 (when the normalizer left it intact)
            "巻号",
            Regex::new(r"第?\s*(?P<volume>\d+)\s*巻\s*,?\s*第?\s*(?P<issue>\d+)\s*号").unwrap(),
        ),
        (
            // Journal, 33, 139-146
            "journal, volume, pages",
            Regex::new(&format!(
                r",\s*(?P<volume>\d{{1,4}})\s*,\s*(?:pp?\.\s*)?(?P<pages>{PAGE_RANGE})"
            ))
            .unwrap(),
        ),
        (
            // 45(3)
            "volume(issue)",
            Regex::new(r"(?P<volume>\d+)\s*\(\s*(?P<issue>\d{1,3})\s*\)").unwrap(),
        ),
    ]
});

static VOLUME_ONLY: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("vol.", Regex::new(r"(?i)(?:^|[^a-z])vol(?:ume)?\.?\s*(?P<volume>\d+)").unwrap()),
        ("巻", Regex::new(r"第?\s*(?P<volume>\d+)\s*巻").unwrap()),
    ]
});

static ISSUE_ONLY: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("no.", Regex::new(r"(?i)(?:^|[^a-z])(?:no\.|issue)\s*(?P<issue>\d+)").unwrap()),
        ("号", Regex::new(r"第?\s*(?P<issue>\d+)\s*号").unwrap()),
    ]
});

static PAGES_ONLY: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "pp.",
            Regex::new(&format!(r"(?i)(?:^|[^a-z])pp?\.\s*(?P<pages>{PAGE_RANGE}|\d+)")).unwrap(),
        ),
        (
            "頁",
            Regex::new(&format!(r"(?P<pages>{PAGE_RANGE}|\d+)\s*(?:頁|ページ)")).unwrap(),
        ),
        ("range", Regex::new(&format!(r"(?P<pages>{PAGE_RANGE})")).unwrap()),
    ]
});

/// `1998-2004` is a span of years, not pages.
fn is_year_range(range: &str) -> bool {
    let ends: Vec<&str> = range
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect();
    ends.len() == 2
        && ends
            .iter()
            .all(|e| e.len() == 4 && (e.starts_with("19") || e.starts_with("20")))
}

fn usable(caps: &Captures<'_>) -> bool {
    caps.name("pages").is_none_or(|p| !is_year_range(p.as_str()))
}

/// Extract volume/issue/pages: combined forms first, then volume-only,
/// issue-only and page-only patterns for whatever is still missing.
///
/// `text` should already have the title, DOI and URL removed.
pub fn extract_volume_info(text: &str) -> VolumeInfo {
    let mut info = VolumeInfo::default();

    'combined: for (name, re) in COMBINED.iter() {
        for caps in re.captures_iter(text) {
            if usable(&caps) && info.fill_from(&caps) {
                tracing::debug!(pattern = name, "volume/issue/pages matched");
                break 'combined;
            }
        }
    }

    for (patterns, missing) in [
        (&*VOLUME_ONLY, info.volume.is_empty()),
        (&*ISSUE_ONLY, info.issue.is_empty()),
        (&*PAGES_ONLY, info.pages.is_empty()),
    ] {
        if !missing {
            continue;
        }
        'single: for (name, re) in patterns.iter() {
            for caps in re.captures_iter(text) {
                if usable(&caps) && info.fill_from(&caps) {
                    tracing::trace!(pattern = name, "single field matched");
                    break 'single;
                }
            }
        }
    }

    info
}

/// Whether the text carries a volume/issue marker: `N(M)`, `vol.`, `no.`,
/// `巻`, `号`, or the bare `, N, P-Q` journal shape.
pub fn has_volume_issue_marker(text: &str) -> bool {
    static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\d+\s*\(\s*\d{1,3}(?:\s*[-–/]\s*\d{1,3})?\s*\)|(?:^|[^a-z])(?:vol\.|volume\s+\d|no\.\s*\d)|\d+\s*巻|\d+\s*号").unwrap()
    });
    MARKER_RE.is_match(text)
        || COMBINED
            .iter()
            .find(|(name, _)| *name == "journal, volume, pages")
            .is_some_and(|(_, re)| re.captures_iter(text).any(|caps| usable(&caps)))
}

/// Whether the text shows a page range or `pp.`/頁 page marker.
pub fn has_pages(text: &str) -> bool {
    PAGES_ONLY
        .iter()
        .any(|(_, re)| re.captures_iter(text).any(|caps| usable(&caps)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vip(volume: &str, issue: &str, pages: &str) -> VolumeInfo {
        VolumeInfo {
            volume: volume.into(),
            issue: issue.into(),
            pages: pages.into(),
        }
    }

    #[test]
    fn test_volume_issue_pages() {
        assert_eq!(
            extract_volume_info("Journal of Medical Research, 45(3), 123-145."),
            vip("45", "3", "123-145")
        );
    }

    #[test]
    fn test_vol_no_pp() {
        assert_eq!(
            extract_volume_info("Journal Name, vol. 12, no. 3, pp. 45–67, 2019."),
            vip("12", "3", "45-67")
        );
    }

    #[test]
    fn test_bare_volume_pages() {
        assert_eq!(extract_volume_info("キャリア教育研究, 33, 139-146."), vip("33", "", "139-146"));
    }

    #[test]
    fn test_japanese_kan_go() {
        assert_eq!(extract_volume_info("教育研究, 第12巻第3号, 45-67頁"), vip("12", "3", "45-67"));
    }

    #[test]
    fn test_volume_issue_without_pages() {
        assert_eq!(extract_volume_info("Nature, 45(3)."), vip("45", "3", ""));
    }

    #[test]
    fn test_pages_only() {
        assert_eq!(
            extract_volume_info("In Culture, Media, Language, 128 – 138."),
            vip("", "", "128-138")
        );
        assert_eq!(extract_volume_info("Book (pp. 10-20)."), vip("", "", "10-20"));
    }

    #[test]
    fn test_year_range_is_not_pages() {
        assert_eq!(extract_volume_info("Survey data, 1998-2004."), VolumeInfo::default());
    }

    #[test]
    fn test_year_paren_is_not_issue() {
        assert_eq!(extract_volume_info("Smith, J. (2020)."), VolumeInfo::default());
    }

    #[test]
    fn test_volume_issue_marker() {
        assert!(has_volume_issue_marker("Journal, 45(3), 1-2"));
        assert!(has_volume_issue_marker("vol. 3"));
        assert!(has_volume_issue_marker("教育研究, 33, 139-146."));
        assert!(has_volume_issue_marker("12巻"));
        assert!(!has_volume_issue_marker("Hall, S. (1980). Encoding/decoding. In Culture, Media, Language, 128–138."));
    }
}

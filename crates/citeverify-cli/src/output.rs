use std::io::Write;

use citeverify_core::{
    Mark, ParsedCitation, RenderedCitation, SourceStatus, Status, VerifyResult, VerifyStats,
};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn status_label(status: Status, color: ColorMode) -> String {
    let label = match status {
        Status::Found => "FOUND",
        Status::Similar => "SIMILAR",
        Status::NotFound => "NOT FOUND",
    };
    if !color.enabled() {
        return label.to_string();
    }
    match status {
        Status::Found => label.green().to_string(),
        Status::Similar => label.yellow().to_string(),
        Status::NotFound => label.red().to_string(),
    }
}

/// The citation text with mismatching segments highlighted.
///
/// Without color, mismatches are wrapped in `[[...]]`.
pub fn format_rendered(rendered: &RenderedCitation, color: ColorMode) -> String {
    rendered
        .segments
        .iter()
        .map(|seg| match (seg.mark, color.enabled()) {
            (Mark::Match, true) => seg.text.green().to_string(),
            (Mark::Mismatch, true) => seg.text.red().bold().to_string(),
            (Mark::Mismatch, false) => format!("[[{}]]", seg.text),
            _ => seg.text.clone(),
        })
        .collect()
}

/// Print one verification result.
pub fn print_result(
    w: &mut dyn Write,
    index: usize,
    result: &VerifyResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let score = result
        .best()
        .map(|b| format!(" {:.1}", b.overall_score))
        .unwrap_or_default();
    let source = result
        .best()
        .map(|b| format!(" ({})", b.record.source))
        .unwrap_or_default();
    writeln!(
        w,
        "[{}] {}{}{}",
        index + 1,
        status_label(result.status, color),
        score,
        source
    )?;

    let input = truncate(&result.parsed.raw, 200);
    if color.enabled() {
        writeln!(w, "  Input:  {}", input.dimmed())?;
    } else {
        writeln!(w, "  Input:  {}", input)?;
    }
    writeln!(w, "  Output: {}", format_rendered(&result.rendered, color))?;

    let failed: Vec<String> = result
        .sources
        .iter()
        .filter(|s| !matches!(s.status, SourceStatus::Found | SourceStatus::Empty))
        .map(|s| match &s.error_message {
            Some(msg) => format!("{}: {}", s.source, msg),
            None => s.source.clone(),
        })
        .collect();
    if !failed.is_empty() {
        let msg = format!("Failed sources: {}", failed.join(", "));
        if color.enabled() {
            writeln!(w, "  {}", msg.yellow())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print the fields parsed from one line.
pub fn print_parsed(
    w: &mut dyn Write,
    index: usize,
    parsed: &ParsedCitation,
    color: ColorMode,
) -> std::io::Result<()> {
    let header = format!("[{}] {} {}", index + 1, parsed.language, parsed.kind.as_str());
    if color.enabled() {
        writeln!(w, "{}", header.bold().yellow())?;
    } else {
        writeln!(w, "{}", header)?;
    }

    let fields = [
        ("Title", parsed.search_title().to_string()),
        ("Authors", parsed.authors.join("; ")),
        ("Editors", parsed.editors.join("; ")),
        ("Year", parsed.year.clone()),
        ("Journal", parsed.journal.clone()),
        ("Book", parsed.book_title.clone()),
        ("Volume", parsed.volume.clone()),
        ("Issue", parsed.issue.clone()),
        ("Pages", parsed.pages.clone()),
        ("Publisher", parsed.publisher.clone()),
        ("DOI", parsed.doi.clone()),
        ("URL", parsed.url.clone()),
    ];
    for (name, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        writeln!(w, "  {:<10} {}", format!("{name}:"), value)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print the final summary.
pub fn print_summary(w: &mut dyn Write, stats: &VerifyStats, color: ColorMode) -> std::io::Result<()> {
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Citations checked: {}", stats.total)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Found:".green(), stats.found)?;
        writeln!(w, "  {} {}", "Similar:".yellow(), stats.similar)?;
        writeln!(w, "  {} {}", "Not found:".red(), stats.not_found)?;
    } else {
        writeln!(w, "  Found: {}", stats.found)?;
        writeln!(w, "  Similar: {}", stats.similar)?;
        writeln!(w, "  Not found: {}", stats.not_found)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Shorten to at most `max` characters, appending "..." when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeverify_core::Segment;

    fn rendered() -> RenderedCitation {
        RenderedCitation {
            segments: vec![
                Segment {
                    text: "Smith, J.".into(),
                    mark: Mark::Match,
                },
                Segment {
                    text: " (2020). ".into(),
                    mark: Mark::Neutral,
                },
                Segment {
                    text: "Wrong title".into(),
                    mark: Mark::Mismatch,
                },
            ],
        }
    }

    #[test]
    fn test_format_rendered_plain_marks_mismatch() {
        assert_eq!(
            format_rendered(&rendered(), ColorMode(false)),
            "Smith, J. (2020). [[Wrong title]]"
        );
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("日本語の研究", 3), "日本語...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_print_parsed_skips_empty_fields() {
        let parsed = ParsedCitation {
            title: "A study".into(),
            year: "2020".into(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        print_parsed(&mut buf, 0, &parsed, ColorMode(false)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("[1] en article"));
        assert!(text.contains("Title:     A study"));
        assert!(text.contains("Year:      2020"));
        assert!(!text.contains("Journal"));
    }

    #[test]
    fn test_print_summary_counts() {
        let stats = VerifyStats {
            total: 3,
            found: 1,
            similar: 1,
            not_found: 1,
        };
        let mut buf = Vec::new();
        print_summary(&mut buf, &stats, ColorMode(false)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Citations checked: 3"));
        assert!(text.contains("Not found: 1"));
    }
}

//! Punctuation and typo normalization applied before any extraction.
//!
//! Japanese citations mix full-width punctuation (、。，：；（）) with ASCII, and
//! OCR'd input carries a handful of recurring misreadings. Everything
//! downstream assumes half-width punctuation and single spaces, so this runs
//! first. The transformation is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text_processing::{collapse_whitespace, expand_ligatures};

/// Known OCR/typo fixes, applied in order after width folding.
static KNOWN_FIXES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // 第33巻第2号 / 33巻2号 → 33(2)
        (
            Regex::new(r"(?:第\s*)?(\d+)\s*巻\s*,?\s*第?\s*(\d+)\s*号").unwrap(),
            "$1($2)",
        ),
        // 巻 33 号 2 → 33(2)
        (Regex::new(r"巻\s*(\d+)\s*,?\s*号\s*(\d+)").unwrap(), "$1($2)"),
        // Long-vowel mark misread for the kanji 一 after a kanji given-name stem
        (Regex::new(r"創ー").unwrap(), "創一"),
    ]
});

/// Normalize punctuation, width, whitespace and known typos in a raw citation.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '、' | '，' => out.push_str(", "),
            '。' | '．' => out.push_str(". "),
            '：' => out.push_str(": "),
            '；' => out.push_str("; "),
            '（' => out.push('('),
            '）' => out.push(')'),
            '\u{3000}' => out.push(' '),
            '」' | '』' => {
                out.push(c);
                // Separate a closing bracket glued to the following word
                if chars.peek().is_some_and(|next| next.is_alphanumeric()) {
                    out.push(' ');
                }
            }
            // Remaining full-width ASCII forms (letters, digits, symbols)
            '\u{FF01}'..='\u{FF5E}' => {
                out.push(char::from_u32(c as u32 - 0xFEE0).unwrap_or(c));
            }
            _ => out.push(c),
        }
    }

    let mut text = expand_ligatures(&out);
    for (re, replacement) in KNOWN_FIXES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }

    let text = collapse_whitespace(&text);

    static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:)])").unwrap());
    static SPACE_AFTER_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s+").unwrap());
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    SPACE_AFTER_OPEN.replace_all(&text, "(").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_japanese_punctuation() {
        assert_eq!(
            normalize("田中太郎（2020）。『人工知能と社会』東京：学術出版社。"),
            "田中太郎(2020). 『人工知能と社会』 東京: 学術出版社."
        );
    }

    #[test]
    fn test_ideographic_comma_and_space() {
        assert_eq!(normalize("坂部創一、山崎秀夫\u{3000}(2019)"), "坂部創一, 山崎秀夫 (2019)");
    }

    #[test]
    fn test_full_width_digits() {
        assert_eq!(normalize("第３３巻第２号"), "33(2)");
    }

    #[test]
    fn test_volume_issue_fix() {
        assert_eq!(normalize("教育研究, 12巻3号, 45-67"), "教育研究, 12(3), 45-67");
        assert_eq!(normalize("教育研究 12巻3号"), "教育研究 12(3)");
        assert_eq!(normalize("紀要 第 5 巻 第 1 号"), "紀要 5(1)");
        assert_eq!(normalize("教育研究, 巻 12 号 3, 45-67"), "教育研究, 12(3), 45-67");
    }

    #[test]
    fn test_ocr_fix() {
        assert_eq!(normalize("坂部創ー"), "坂部創一");
    }

    #[test]
    fn test_space_before_punctuation() {
        assert_eq!(normalize("Smith , J . ( 2020 )"), "Smith, J. (2020)");
    }

    #[test]
    fn test_ascii_untouched() {
        let s = "Smith, J. (2020). Machine learning in healthcare. Journal of Medical Research, 45(3), 123-145.";
        assert_eq!(normalize(s), s);
    }

    #[test]
    fn test_bracket_before_volume_keeps_space() {
        assert_eq!(
            normalize("「地域社会の再生」『社会学評論』70巻2号, 123-145."),
            "「地域社会の再生」『社会学評論』 70(2), 123-145."
        );
    }

    #[test]
    fn test_keeps_corner_brackets() {
        assert_eq!(normalize("「章題」『書名』"), "「章題」『書名』");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "田中太郎（2020）。『人工知能と社会』東京：学術出版社。",
            "坂部創ー、山崎秀夫 (2019). 研究. キャリア教育研究, 33, 139-146.",
            "Hall, S. (1980). Encoding/decoding. In Culture, Media, Language, 128–138.",
            "  Smith ,  J .  ( 2020 ) .  Ｔｉｔｌｅ  ",
            "第３３巻第２号、pp．１２－３４",
            "「a」『b』c」d",
            "山田太郎 (2019). 「地域社会の再生ー住民参加の可能性」『社会学評論』70巻2号, 123-145.",
            "『社会学評論』70巻2号",
            "教育研究 12巻3号",
            "教育研究, 12巻3号, 45-67",
            "",
            " , . ; ",
            "e\u{FB03}cient",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }
}

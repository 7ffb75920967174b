use serde::{Deserialize, Serialize};

use crate::text_processing::is_japanese_char;

/// Language of a citation, decided by script ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Japanese,
    #[default]
    English,
}

impl Language {
    pub fn is_japanese(self) -> bool {
        self == Language::Japanese
    }

    /// Short code as used by catalog APIs (`ja` / `en`).
    pub fn code(self) -> &'static str {
        match self {
            Language::Japanese => "ja",
            Language::English => "en",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Fraction of code points that are hiragana, katakana, CJK ideographs or 々.
pub fn japanese_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let japanese = text.chars().filter(|&c| is_japanese_char(c)).count();
    japanese as f64 / total as f64
}

/// Japanese when the Japanese-character ratio exceeds `threshold`, else English.
pub fn detect_language(text: &str, threshold: f64) -> Language {
    if japanese_ratio(text) > threshold {
        Language::Japanese
    } else {
        Language::English
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use citeverify_parsing::ParsingConfigBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Config;
use crate::rate_limit::RateLimiters;

/// File name looked up in the working directory.
pub const CWD_CONFIG_FILE: &str = ".citeverify.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid publisher pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("{0}")]
    Invalid(String),
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub sources: Option<SourcesConfig>,
    pub network: Option<NetworkConfig>,
    pub scoring: Option<ScoringSection>,
    pub parsing: Option<ParsingSection>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub s2_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
    pub google_books_api_key: Option<String>,
    pub cinii_appid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub disabled: Option<Vec<String>>,
    pub good_enough: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub max_retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringSection {
    pub title_weight: Option<f64>,
    pub author_weight: Option<f64>,
    pub year_weight: Option<f64>,
    pub journal_weight: Option<f64>,
    pub min_score: Option<f64>,
    pub found_threshold: Option<f64>,
    pub similar_threshold: Option<f64>,
    pub max_candidates: Option<usize>,
    pub year_tolerance: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsingSection {
    pub japanese_ratio_threshold: Option<f64>,
    pub max_authors: Option<usize>,
    /// Publishers added to the built-in list.
    pub extra_publishers: Option<Vec<String>>,
    /// Organization words added to the built-in list.
    pub extra_organization_words: Option<Vec<String>>,
    /// Extra publisher regexes, tried after the built-in ones.
    pub publisher_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default citation style (`apa`, `mla` or `chicago`).
    pub style: Option<String>,
}

/// Field-wise overlay where `overlay` values win.
trait Merge {
    fn merge(self, overlay: Self) -> Self;
}

fn merge_section<T: Merge>(base: Option<T>, overlay: Option<T>) -> Option<T> {
    match (base, overlay) {
        (Some(b), Some(o)) => Some(b.merge(o)),
        (b, o) => o.or(b),
    }
}

impl Merge for ApiKeysConfig {
    fn merge(self, o: Self) -> Self {
        Self {
            s2_api_key: o.s2_api_key.or(self.s2_api_key),
            crossref_mailto: o.crossref_mailto.or(self.crossref_mailto),
            google_books_api_key: o.google_books_api_key.or(self.google_books_api_key),
            cinii_appid: o.cinii_appid.or(self.cinii_appid),
        }
    }
}

impl Merge for SourcesConfig {
    fn merge(self, o: Self) -> Self {
        Self {
            disabled: o.disabled.or(self.disabled),
            good_enough: o.good_enough.or(self.good_enough),
        }
    }
}

impl Merge for NetworkConfig {
    fn merge(self, o: Self) -> Self {
        Self {
            timeout_secs: o.timeout_secs.or(self.timeout_secs),
            max_attempts: o.max_attempts.or(self.max_attempts),
            max_retry_after_secs: o.max_retry_after_secs.or(self.max_retry_after_secs),
        }
    }
}

impl Merge for ScoringSection {
    fn merge(self, o: Self) -> Self {
        Self {
            title_weight: o.title_weight.or(self.title_weight),
            author_weight: o.author_weight.or(self.author_weight),
            year_weight: o.year_weight.or(self.year_weight),
            journal_weight: o.journal_weight.or(self.journal_weight),
            min_score: o.min_score.or(self.min_score),
            found_threshold: o.found_threshold.or(self.found_threshold),
            similar_threshold: o.similar_threshold.or(self.similar_threshold),
            max_candidates: o.max_candidates.or(self.max_candidates),
            year_tolerance: o.year_tolerance.or(self.year_tolerance),
        }
    }
}

impl Merge for ParsingSection {
    fn merge(self, o: Self) -> Self {
        Self {
            japanese_ratio_threshold: o.japanese_ratio_threshold.or(self.japanese_ratio_threshold),
            max_authors: o.max_authors.or(self.max_authors),
            extra_publishers: o.extra_publishers.or(self.extra_publishers),
            extra_organization_words: o.extra_organization_words.or(self.extra_organization_words),
            publisher_patterns: o.publisher_patterns.or(self.publisher_patterns),
        }
    }
}

impl Merge for OutputConfig {
    fn merge(self, o: Self) -> Self {
        Self {
            style: o.style.or(self.style),
        }
    }
}

/// Platform config directory path: `<config_dir>/citeverify/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citeverify").join("config.toml"))
}

/// Load config by cascading CWD `.citeverify.toml` over platform config.
/// CWD values override platform values. Missing files are skipped.
pub fn load_config() -> Result<ConfigFile, ConfigError> {
    let platform = match config_path() {
        Some(p) => load_from_path(&p)?,
        None => None,
    };
    let cwd = load_from_path(Path::new(CWD_CONFIG_FILE))?;

    Ok(match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    })
}

/// Load a config from a specific path. Returns `Ok(None)` if the file
/// doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let file = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Some(file))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api_keys: merge_section(base.api_keys, overlay.api_keys),
        sources: merge_section(base.sources, overlay.sources),
        network: merge_section(base.network, overlay.network),
        scoring: merge_section(base.scoring, overlay.scoring),
        parsing: merge_section(base.parsing, overlay.parsing),
        output: merge_section(base.output, overlay.output),
    }
}

impl ConfigFile {
    /// Apply the file's values on top of `config`.
    ///
    /// `config` is left untouched when any value is invalid. The rate
    /// limiters are rebuilt since their intervals depend on the configured
    /// keys.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        let mut next = config.clone();
        self.apply_to(&mut next)?;
        *config = next;
        Ok(())
    }

    fn apply_to(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(keys) = &self.api_keys {
            set_if_some(&mut config.s2_api_key, &keys.s2_api_key);
            set_if_some(&mut config.crossref_mailto, &keys.crossref_mailto);
            set_if_some(&mut config.google_books_api_key, &keys.google_books_api_key);
            set_if_some(&mut config.cinii_appid, &keys.cinii_appid);
        }

        if let Some(sources) = &self.sources {
            if let Some(disabled) = &sources.disabled {
                config.disabled_sources = disabled.clone();
            }
            if let Some(n) = sources.good_enough {
                config.good_enough = n;
            }
        }

        if let Some(network) = &self.network {
            if let Some(secs) = network.timeout_secs {
                config.timeout_secs = secs;
            }
            if let Some(n) = network.max_attempts {
                if n == 0 {
                    return Err(ConfigError::Invalid(
                        "network.max_attempts must be at least 1".into(),
                    ));
                }
                config.retry.max_attempts = n;
            }
            if let Some(secs) = network.max_retry_after_secs {
                config.retry.max_retry_after = Duration::from_secs(secs);
            }
        }

        if let Some(scoring) = &self.scoring {
            apply_scoring(scoring, config)?;
        }

        if let Some(parsing) = &self.parsing {
            config.parsing = build_parsing_config(parsing)?;
        }

        config.rate_limiters = Arc::new(RateLimiters::new(
            config.crossref_mailto.is_some(),
            config.s2_api_key.is_some(),
        ));
        Ok(())
    }
}

fn set_if_some(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

fn apply_scoring(section: &ScoringSection, config: &mut Config) -> Result<(), ConfigError> {
    let weights = &mut config.scoring.weights;
    for (value, target, name) in [
        (section.title_weight, &mut weights.title, "title_weight"),
        (section.author_weight, &mut weights.author, "author_weight"),
        (section.year_weight, &mut weights.year, "year_weight"),
        (section.journal_weight, &mut weights.journal, "journal_weight"),
    ] {
        if let Some(v) = value {
            if v < 0.0 || v.is_nan() {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{name} must be non-negative, got {v}"
                )));
            }
            *target = v;
        }
    }

    let thresholds = &mut config.scoring.thresholds;
    if let Some(v) = section.min_score {
        thresholds.min_score = v;
    }
    if let Some(v) = section.found_threshold {
        thresholds.found = v;
    }
    if let Some(v) = section.similar_threshold {
        thresholds.similar = v;
    }
    if let Some(v) = section.max_candidates {
        thresholds.max_candidates = v;
    }
    if let Some(v) = section.year_tolerance {
        thresholds.year_tolerance = v;
    }
    if thresholds.similar > thresholds.found {
        return Err(ConfigError::Invalid(format!(
            "scoring.similar_threshold ({}) exceeds found_threshold ({})",
            thresholds.similar, thresholds.found
        )));
    }
    Ok(())
}

fn build_parsing_config(
    section: &ParsingSection,
) -> Result<citeverify_parsing::ParsingConfig, ConfigError> {
    let mut builder = ParsingConfigBuilder::new();
    if let Some(ratio) = section.japanese_ratio_threshold {
        builder = builder.japanese_ratio_threshold(ratio);
    }
    if let Some(n) = section.max_authors {
        builder = builder.max_authors(n);
    }
    for publisher in section.extra_publishers.iter().flatten() {
        builder = builder.add_known_publisher(publisher.clone());
    }
    for word in section.extra_organization_words.iter().flatten() {
        builder = builder.add_organization_word(word.clone());
    }
    for pattern in section.publisher_patterns.iter().flatten() {
        builder = builder.add_publisher_pattern(pattern.clone());
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"
[api_keys]
crossref_mailto = "me@example.org"

[sources]
disabled = ["NDL"]
"#,
        );
        let config = load_from_path(file.path()).unwrap().unwrap();
        assert_eq!(
            config.api_keys.unwrap().crossref_mailto.as_deref(),
            Some("me@example.org")
        );
        assert_eq!(config.sources.unwrap().disabled, Some(vec!["NDL".to_string()]));
        assert!(config.network.is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(load_from_path(&path).unwrap().is_none());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let file = write_config("[network\ntimeout_secs = ");
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                s2_api_key: Some("base-key".into()),
                crossref_mailto: Some("base@example.org".into()),
                ..Default::default()
            }),
            network: Some(NetworkConfig {
                timeout_secs: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                s2_api_key: Some("cwd-key".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let keys = merged.api_keys.unwrap();
        assert_eq!(keys.s2_api_key.as_deref(), Some("cwd-key"));
        assert_eq!(keys.crossref_mailto.as_deref(), Some("base@example.org"));
        assert_eq!(merged.network.unwrap().timeout_secs, Some(30));
    }

    #[test]
    fn test_apply_to_config() {
        let file = write_config(
            r#"
[api_keys]
crossref_mailto = "me@example.org"

[sources]
good_enough = 3

[network]
timeout_secs = 20
max_attempts = 5

[scoring]
found_threshold = 95.0
title_weight = 60.0

[parsing]
max_authors = 4
extra_publishers = ["Example Press"]
"#,
        );
        let file = load_from_path(file.path()).unwrap().unwrap();
        let mut config = Config::default();
        file.apply(&mut config).unwrap();

        assert_eq!(config.crossref_mailto.as_deref(), Some("me@example.org"));
        assert_eq!(config.good_enough, 3);
        assert_eq!(config.timeout_secs, 20);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.scoring.thresholds.found, 95.0);
        assert_eq!(config.scoring.weights.title, 60.0);
        assert_eq!(config.parsing.max_authors(), 4);
        assert_eq!(
            config.rate_limiters.get("CrossRef").unwrap().base_period(),
            Duration::from_millis(334)
        );
    }

    #[test]
    fn test_failed_apply_leaves_config_untouched() {
        let file = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                crossref_mailto: Some("me@example.org".into()),
                ..Default::default()
            }),
            network: Some(NetworkConfig {
                timeout_secs: Some(30),
                ..Default::default()
            }),
            parsing: Some(ParsingSection {
                publisher_patterns: Some(vec!["(unclosed".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut config = Config::default();
        assert!(matches!(
            file.apply(&mut config),
            Err(ConfigError::Pattern(_))
        ));
        assert_eq!(config.crossref_mailto, None);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(
            config.rate_limiters.get("CrossRef").unwrap().base_period(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_apply_rejects_inverted_thresholds() {
        let file = ConfigFile {
            scoring: Some(ScoringSection {
                similar_threshold: Some(95.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            file.apply(&mut Config::default()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_apply_rejects_bad_pattern() {
        let file = ConfigFile {
            parsing: Some(ParsingSection {
                publisher_patterns: Some(vec!["(unclosed".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            file.apply(&mut Config::default()),
            Err(ConfigError::Pattern(_))
        ));
    }
}

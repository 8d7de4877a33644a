use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `cache.request_time_limit_minutes`.
pub const REQUEST_TIME_LIMIT_ENV: &str = "REQUEST_TIME_LIMIT";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_request_time_limit")]
    pub request_time_limit_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            request_time_limit_minutes: default_request_time_limit(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".favfilt")
}
fn default_request_time_limit() -> u64 {
    60
}

impl CacheConfig {
    pub fn request_lock_path(&self) -> PathBuf {
        self.dir.join("request.lock")
    }

    pub fn tags_path(&self) -> PathBuf {
        self.dir.join("tags.json")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join("favorites.json")
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_secs(self.request_time_limit_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Twitter,
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            path: None,
            api_base: default_api_base(),
            user_id: None,
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.twitter.com".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicsConfig {
    #[serde(default = "default_num_topics")]
    pub num_topics: usize,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_words_per_topic")]
    pub words_per_topic: usize,
    #[serde(default = "default_bigrams")]
    pub bigrams: bool,
    #[serde(default)]
    pub stopwords_file: Option<PathBuf>,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            num_topics: default_num_topics(),
            iterations: default_iterations(),
            alpha: default_alpha(),
            beta: default_beta(),
            seed: default_seed(),
            words_per_topic: default_words_per_topic(),
            bigrams: default_bigrams(),
            stopwords_file: None,
        }
    }
}

fn default_num_topics() -> usize {
    4
}
fn default_iterations() -> usize {
    200
}
fn default_alpha() -> f64 {
    0.1
}
fn default_beta() -> f64 {
    0.01
}
fn default_seed() -> u64 {
    42
}
fn default_words_per_topic() -> usize {
    10
}
fn default_bigrams() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct TagsConfig {
    /// Maximum number of keywords offered for selection; `0` means all.
    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            top_keywords: default_top_keywords(),
        }
    }
}

fn default_top_keywords() -> usize {
    15
}

impl TagsConfig {
    pub fn keyword_limit(&self) -> Option<usize> {
        (self.top_keywords > 0).then_some(self.top_keywords)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

/// Load configuration from an optional TOML file, then apply environment
/// overrides and validate.
///
/// A missing `path` means built-in defaults. A given path that cannot be
/// read or parsed is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    let env_limit = std::env::var(REQUEST_TIME_LIMIT_ENV).ok();
    finalize(config, env_limit.as_deref())
}

/// Parse a TOML document into a [`Config`] without env overrides.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn finalize(mut config: Config, env_limit: Option<&str>) -> Result<Config> {
    if let Some(raw) = env_limit {
        config.cache.request_time_limit_minutes = raw.trim().parse().with_context(|| {
            format!(
                "{} must be a whole number of minutes, got '{}'",
                REQUEST_TIME_LIMIT_ENV, raw
            )
        })?;
    }

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.topics.num_topics == 0 {
        bail!("topics.num_topics must be > 0");
    }
    if config.topics.words_per_topic == 0 {
        bail!("topics.words_per_topic must be > 0");
    }
    if config.topics.alpha <= 0.0 || config.topics.beta <= 0.0 {
        bail!("topics.alpha and topics.beta must be > 0");
    }
    if !(1..=100).contains(&config.source.page_size) {
        bail!("source.page_size must be in [1, 100]");
    }
    if config.source.kind == SourceKind::File && config.source.path.is_none() {
        bail!("source.path must be set when source.kind is 'file'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_no_file() {
        let cfg = finalize(Config::default(), None).unwrap();
        assert_eq!(cfg.cache.request_time_limit_minutes, 60);
        assert_eq!(cfg.source.kind, SourceKind::Twitter);
        assert_eq!(cfg.topics.num_topics, 4);
        assert_eq!(cfg.tags.keyword_limit(), Some(15));
        assert!(cfg.cache.dir.ends_with(".favfilt"));
    }

    #[test]
    fn test_env_overrides_time_limit() {
        let cfg = finalize(Config::default(), Some("20")).unwrap();
        assert_eq!(cfg.cache.request_time_limit_minutes, 20);
        assert_eq!(cfg.cache.throttle_window(), Duration::from_secs(20 * 60));
    }

    #[test]
    fn test_bad_env_time_limit_is_error() {
        let err = finalize(Config::default(), Some("soon")).unwrap_err();
        assert!(err.to_string().contains(REQUEST_TIME_LIMIT_ENV));
    }

    #[test]
    fn test_parse_file_source() {
        let cfg = parse_config(
            r#"
[cache]
dir = "/tmp/favf"
request_time_limit_minutes = 5

[source]
kind = "file"
path = "/tmp/likes.json"

[tags]
top_keywords = 0
"#,
        )
        .unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.source.kind, SourceKind::File);
        assert_eq!(cfg.cache.tags_path(), PathBuf::from("/tmp/favf/tags.json"));
        assert_eq!(cfg.tags.keyword_limit(), None);
    }

    #[test]
    fn test_file_source_requires_path() {
        let cfg = parse_config("[source]\nkind = \"file\"\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = parse_config(include_str!("../config/favf.example.toml")).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8501");
        assert_eq!(cfg.topics.seed, 42);
    }

    #[test]
    fn test_zero_topics_rejected() {
        let cfg = parse_config("[topics]\nnum_topics = 0\n").unwrap();
        assert!(validate(&cfg).is_err());
    }
}

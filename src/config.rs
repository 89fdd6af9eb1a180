//! Run configuration loaded from an optional YAML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Command-line flags are applied on top by
//! [`CrawlerConfig::apply_cli`].
//!
//! ```yaml
//! recency:
//!   lookback_days: 90
//!   unknown_policy: drop
//! cache:
//!   dir: .cache/ai_ml_crawler
//!   max_entries: 5000
//!   ttl_by_domain:
//!     export.arxiv.org: 86400
//! github:
//!   min_stars: 50
//! ```

use crate::cli::Cli;
use crate::error::CrawlError;
use crate::recency::UnknownPolicy;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub recency: RecencyConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub keywords: KeywordConfig,
    pub github: GithubConfig,
    pub arxiv: ArxivConfig,
    pub huggingface: HuggingFaceConfig,
    pub medium: MediumConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyConfig {
    pub lookback_days: u32,
    pub unknown_policy: UnknownPolicy,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            lookback_days: 365,
            unknown_policy: UnknownPolicy::Keep,
        }
    }
}

impl RecencyConfig {
    pub fn lookback(&self) -> Duration {
        Duration::days(i64::from(self.lookback_days))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub max_entries: usize,
    pub max_bytes: u64,
    /// Lifetime of an entry whose domain has no override.
    pub default_ttl_secs: u64,
    /// Per-domain lifetimes. A key also covers its subdomains.
    pub ttl_by_domain: BTreeMap<String, u64>,
    pub flush_every_entries: usize,
    pub flush_every_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".cache/ai_ml_crawler"),
            max_entries: 10_000,
            max_bytes: 100 * 1024 * 1024,
            default_ttl_secs: 15 * 24 * 60 * 60,
            ttl_by_domain: BTreeMap::new(),
            flush_every_entries: 10,
            flush_every_secs: 60,
        }
    }
}

impl CacheConfig {
    /// TTL for `domain`: exact host first, then each parent domain, then the
    /// default.
    pub fn ttl_for(&self, domain: &str) -> Duration {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        let mut candidate = domain.as_str();
        loop {
            if let Some(secs) = self.ttl_by_domain.get(candidate) {
                return secs_to_duration(*secs);
            }
            match candidate.split_once('.') {
                Some((_, parent)) if !parent.is_empty() => candidate = parent,
                _ => return secs_to_duration(self.default_ttl_secs),
            }
        }
    }
}

/// Longest TTL or flush interval the cache accepts: 100 years.
pub const MAX_CACHE_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Seconds as a [`Duration`], clamped to [`MAX_CACHE_SECS`].
pub fn secs_to_duration(secs: u64) -> Duration {
    let secs = i64::try_from(secs.min(MAX_CACHE_SECS)).unwrap_or(i64::MAX);
    Duration::try_seconds(secs).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub user_agent: String,
    pub max_results_per_source: usize,
    /// Upper bound on in-flight requests per source.
    pub concurrency: usize,
    /// Fetch the page of items that arrive without a date and look for
    /// date metadata in it.
    pub fetch_undated_pages: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 3,
            user_agent: "AI-Research-Crawler/1.0".to_string(),
            max_results_per_source: 25,
            concurrency: 4,
            fetch_undated_pages: true,
        }
    }
}

/// Keyword lists used for relevance scoring. Matching is case-insensitive
/// substring search, so entries are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub multimodal: Vec<String>,
    pub ai_agent: Vec<String>,
    pub energy_ai: Vec<String>,
    pub high_value: Vec<String>,
    pub company: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            multimodal: owned(&[
                "multimodal", "vision language model", "vlm", "clip", "dall-e",
                "gpt-4v", "gpt-4o", "gpt-4", "claude-3", "claude 3", "gemini pro vision",
                "llava", "visual question answering", "image captioning",
                "vision transformer", "text-to-image", "image-to-text", "visual reasoning",
                "multimodal ai", "vision-language", "visual language", "image understanding",
                "computer vision", "stable diffusion", "midjourney", "imagen", "blip",
                "flamingo", "kosmos", "visual ai", "image generation", "video understanding",
                "cross-modal",
            ]),
            ai_agent: owned(&[
                "ai agent", "autonomous agent", "intelligent agent", "agentic ai",
                "agent framework", "multi-agent", "agent planning", "tool use",
                "function calling", "reasoning agent", "agent orchestration", "langchain",
                "autogen", "crewai", "agent workflow", "agentic system",
                "agent collaboration", "agent architecture", "agent reasoning",
                "autonomous system", "ai assistant", "chatbot", "conversational ai",
                "task automation", "workflow automation", "decision making", "planning",
            ]),
            energy_ai: owned(&[
                "energy ai", "smart grid", "energy management", "power systems ai",
                "renewable energy optimization", "energy forecasting", "demand response",
                "energy trading", "grid optimization", "energy efficiency ai",
                "power grid automation", "energy storage optimization", "microgrid",
                "energy analytics", "predictive maintenance energy", "carbon optimization",
                "energy digital twin", "smart meter", "energy iot", "energy blockchain",
                "energy market", "power system automation", "energy data analytics",
                "sustainability ai", "climate ai", "renewable energy", "carbon footprint",
            ]),
            high_value: owned(&[
                "gpt-4o", "gpt-4v", "claude-3", "gemini pro vision", "dall-e 3",
                "midjourney", "stable diffusion", "llava", "blip", "flamingo", "palm-e",
                "kosmos", "bard", "chatgpt", "copilot", "langchain", "autogen", "crewai",
                "semantic kernel", "llm", "transformer", "attention mechanism",
                "reinforcement learning", "fine-tuning",
            ]),
            company: owned(&[
                "openai", "anthropic", "meta", "google", "microsoft", "deepmind",
                "hugging face", "nvidia", "stability ai", "cohere", "inflection",
            ]),
        }
    }
}

impl KeywordConfig {
    fn normalize(&mut self) {
        for list in [
            &mut self.multimodal,
            &mut self.ai_agent,
            &mut self.energy_ai,
            &mut self.high_value,
            &mut self.company,
        ] {
            for word in list.iter_mut() {
                *word = word.trim().to_lowercase();
            }
            list.retain(|w| !w.is_empty());
            list.sort();
            list.dedup();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub enabled: bool,
    pub api_base: String,
    pub queries: Vec<String>,
    pub min_stars: u32,
    /// Personal access token. Usually supplied through `GITHUB_TOKEN`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.github.com".to_string(),
            queries: owned(&[
                "multimodal LLM",
                "vision language model",
                "AI agent framework",
                "autonomous agent",
                "energy AI agents",
                "smart grid AI",
                "energy management system",
                "power systems optimization",
            ]),
            min_stars: 10,
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    pub enabled: bool,
    pub api_url: String,
    pub categories: Vec<String>,
    pub search_topics: Vec<String>,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "http://export.arxiv.org/api/query".to_string(),
            categories: owned(&["cs.AI", "cs.CL", "cs.CV", "eess.SY"]),
            search_topics: owned(&[
                "multimodal large language model",
                "AI agents",
                "energy AI agents",
                "smart grid optimization",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    pub enabled: bool,
    pub api_base: String,
    pub search_terms: Vec<String>,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://huggingface.co".to_string(),
            search_terms: owned(&["multimodal", "vision-language", "agent"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediumConfig {
    pub enabled: bool,
    /// RSS feed URLs, publications or tags.
    pub feeds: Vec<String>,
    /// Items considered per feed, before the AI relevance check.
    pub max_items_per_feed: usize,
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feeds: owned(&[
                "https://medium.com/feed/towards-data-science",
                "https://medium.com/feed/towards-ai",
                "https://medium.com/feed/artificial-intelligence-in-plain-english",
                "https://medium.com/feed/the-ai-forum",
                "https://medium.com/feed/tag/artificial-intelligence",
                "https://medium.com/feed/tag/machine-learning",
                "https://medium.com/feed/tag/deep-learning",
            ]),
            max_items_per_feed: 10,
        }
    }
}

impl CrawlerConfig {
    /// Parse a YAML document. Keyword lists are lower-cased and deduplicated.
    pub fn from_yaml(text: &str) -> Result<Self, CrawlError> {
        let mut config: CrawlerConfig = if text.trim().is_empty() {
            CrawlerConfig::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| CrawlError::Config(e.to_string()))?
        };
        config.keywords.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or the defaults when no path is given.
    pub async fn load(path: Option<&Path>) -> Result<Self, CrawlError> {
        let Some(path) = path else {
            debug!("No config file given; using defaults");
            let mut config = CrawlerConfig::default();
            config.keywords.normalize();
            return Ok(config);
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CrawlError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_yaml(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Overlay command-line flags on top of file values.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<(), CrawlError> {
        if let Some(days) = cli.lookback_days {
            self.recency.lookback_days = days;
        }
        if let Some(policy) = cli.unknown_policy {
            self.recency.unknown_policy = policy;
        }
        if let Some(dir) = &cli.cache_dir {
            self.cache.dir = dir.clone();
        }
        if cli.no_cache {
            self.cache.enabled = false;
        }
        if let Some(n) = cli.max_results {
            self.fetch.max_results_per_source = n;
        }
        if cli.github_token.is_some() {
            self.github.token = cli.github_token.clone();
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), CrawlError> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(CrawlError::Config("cache.max_entries must be at least 1".into()));
        }
        if self.cache.enabled && self.cache.max_bytes == 0 {
            return Err(CrawlError::Config("cache.max_bytes must be at least 1".into()));
        }
        if self.cache.default_ttl_secs > MAX_CACHE_SECS {
            return Err(CrawlError::Config(format!(
                "cache.default_ttl_secs must be at most {MAX_CACHE_SECS}"
            )));
        }
        if let Some((domain, _)) = self
            .cache
            .ttl_by_domain
            .iter()
            .find(|(_, secs)| **secs > MAX_CACHE_SECS)
        {
            return Err(CrawlError::Config(format!(
                "cache.ttl_by_domain.{domain} must be at most {MAX_CACHE_SECS}"
            )));
        }
        if self.cache.flush_every_secs > MAX_CACHE_SECS {
            return Err(CrawlError::Config(format!(
                "cache.flush_every_secs must be at most {MAX_CACHE_SECS}"
            )));
        }
        if self.fetch.concurrency == 0 {
            return Err(CrawlError::Config("fetch.concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = CrawlerConfig::from_yaml("").unwrap();
        assert_eq!(config.cache.default_ttl_secs, 1_296_000);
        assert_eq!(config.cache.flush_every_entries, 10);
        assert_eq!(config.recency.unknown_policy, UnknownPolicy::Keep);
        assert!(config.keywords.multimodal.contains(&"gpt-4o".to_string()));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
recency:
  lookback_days: 30
  unknown_policy: drop
cache:
  max_entries: 5
  ttl_by_domain:
    arxiv.org: 120
keywords:
  company: ["  OpenAI ", "openai", "Anthropic"]
"#;
        let config = CrawlerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.recency.lookback(), Duration::days(30));
        assert_eq!(config.recency.unknown_policy, UnknownPolicy::Drop);
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.cache.max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.keywords.company, vec!["anthropic", "openai"]);
        assert_eq!(config.fetch.timeout_secs, 10);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        assert!(matches!(
            CrawlerConfig::from_yaml("recency: [not, a, map]"),
            Err(CrawlError::Config(_))
        ));
        assert!(matches!(
            CrawlerConfig::from_yaml("cache:\n  max_entries: 0\n"),
            Err(CrawlError::Config(_))
        ));
    }

    #[test]
    fn test_ttl_for_matches_parent_domains() {
        let cache = CacheConfig {
            default_ttl_secs: 100,
            ttl_by_domain: BTreeMap::from([
                ("arxiv.org".to_string(), 10),
                ("api.github.com".to_string(), 20),
            ]),
            ..CacheConfig::default()
        };
        assert_eq!(cache.ttl_for("export.arxiv.org"), Duration::seconds(10));
        assert_eq!(cache.ttl_for("ARXIV.org."), Duration::seconds(10));
        assert_eq!(cache.ttl_for("api.github.com"), Duration::seconds(20));
        assert_eq!(cache.ttl_for("github.com"), Duration::seconds(100));
        assert_eq!(cache.ttl_for(""), Duration::seconds(100));
    }

    #[tokio::test]
    async fn test_unreadable_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        match CrawlerConfig::load(Some(&missing)).await {
            Err(CrawlError::Config(msg)) => assert!(msg.contains("absent.yaml"), "{msg}"),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_medium_defaults() {
        let config = CrawlerConfig::from_yaml("medium:\n  max_items_per_feed: 3\n").unwrap();
        assert!(config.medium.enabled);
        assert_eq!(config.medium.max_items_per_feed, 3);
        assert!(config
            .medium
            .feeds
            .contains(&"https://medium.com/feed/tag/machine-learning".to_string()));
    }

    #[test]
    fn test_huge_ttls_are_clamped() {
        let cache = CacheConfig {
            default_ttl_secs: u64::MAX,
            ttl_by_domain: BTreeMap::from([("arxiv.org".to_string(), 100_000_000_000_000_000)]),
            ..CacheConfig::default()
        };
        let max = Duration::seconds(MAX_CACHE_SECS as i64);
        assert_eq!(cache.ttl_for("example.com"), max);
        assert_eq!(cache.ttl_for("export.arxiv.org"), max);
        assert_eq!(secs_to_duration(0), Duration::zero());
    }

    #[test]
    fn test_out_of_range_cache_seconds_are_rejected() {
        for yaml in [
            "cache:\n  default_ttl_secs: 100000000000000000\n",
            "cache:\n  ttl_by_domain:\n    arxiv.org: 18446744073709551615\n",
            "cache:\n  flush_every_secs: 100000000000000000\n",
        ] {
            assert!(
                matches!(CrawlerConfig::from_yaml(yaml), Err(CrawlError::Config(_))),
                "accepted: {yaml}"
            );
        }
        let at_limit = format!("cache:\n  default_ttl_secs: {MAX_CACHE_SECS}\n");
        assert!(CrawlerConfig::from_yaml(&at_limit).is_ok());
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config = CrawlerConfig::default();
        let cli = Cli::parse_from([
            "ai_ml_crawler",
            "--lookback-days",
            "7",
            "--unknown-policy",
            "drop",
            "--cache-dir",
            "/tmp/crawler-cache",
            "--no-cache",
        ]);
        config.apply_cli(&cli).unwrap();
        assert_eq!(config.recency.lookback_days, 7);
        assert_eq!(config.recency.unknown_policy, UnknownPolicy::Drop);
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/crawler-cache"));
        assert!(!config.cache.enabled);
    }
}

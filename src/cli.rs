//! Command-line interface definitions for the AI/ML crawler.
//!
//! Flags override values from the YAML config file. Secrets and the config
//! path can also come from the environment.

use crate::recency::UnknownPolicy;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # Defaults: report under ./output, cache under .cache/ai_ml_crawler
/// ai_ml_crawler
///
/// # Last 30 days only, drop undated items, custom cache location
/// ai_ml_crawler -o ./reports --lookback-days 30 --unknown-policy drop --cache-dir /var/cache/crawler
///
/// # Ignore the cache for this run
/// GITHUB_TOKEN=... ai_ml_crawler --no-cache
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for JSON reports
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Optional path to a config.yaml file
    #[arg(short, long, env = "CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Keep items published within this many days
    #[arg(long)]
    pub lookback_days: Option<u32>,

    /// What to do with items whose date cannot be determined
    #[arg(long, value_enum)]
    pub unknown_policy: Option<UnknownPolicy>,

    /// Directory holding the response cache
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Do not read or write the response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Maximum number of items to keep per source
    #[arg(long)]
    pub max_results: Option<usize>,

    /// GitHub token for higher API rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

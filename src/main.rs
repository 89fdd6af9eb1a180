//! # AI/ML Crawler
//!
//! Collects recent AI/ML items (repositories, papers, models) from public
//! APIs, normalizes their publication dates, keeps what falls inside the
//! lookback window, ranks it by keyword relevance and writes a JSON report.
//!
//! ## Usage
//!
//! ```sh
//! ai_ml_crawler -o ./output --lookback-days 90
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: every source queries its API through one cache-first
//!    [`fetch::Fetcher`]; all sources run concurrently
//! 2. **Dating**: raw dates go through the [`dates`] strategy chain
//! 3. **Filtering**: [`recency`] window, then [`filter`] relevance ranking
//! 4. **Output**: dated JSON report; the response cache is flushed last

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cache;
mod cli;
mod config;
mod dates;
mod error;
mod fetch;
mod filter;
mod models;
mod outputs;
mod pipeline;
mod recency;
mod sources;
mod utils;

use cache::clock::SystemClock;
use cache::ContentCache;
use cli::Cli;
use config::CrawlerConfig;
use fetch::Fetcher;
use outputs::json;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ai_ml_crawler starting up");

    // Parse CLI, then overlay it on the config file
    let args = Cli::parse();
    debug!(output_dir = %args.output_dir.display(), config = ?args.config, "Parsed CLI arguments");
    let mut config = CrawlerConfig::load(args.config.as_deref()).await?;
    config.apply_cli(&args)?;
    info!(
        lookback_days = config.recency.lookback_days,
        unknown_policy = ?config.recency.unknown_policy,
        cache_enabled = config.cache.enabled,
        "Configuration ready"
    );

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Cache and fetcher ----
    let cache = config.cache.enabled.then(|| {
        Arc::new(ContentCache::open_or_degraded(
            config.cache.clone(),
            Arc::new(SystemClock),
        ))
    });
    let fetcher = Fetcher::http(&config.fetch, cache.clone())?;

    // ---- Collect from all sources, unless interrupted ----
    let by_source = tokio::select! {
        by_source = sources::collect_all(&fetcher, &config) => by_source,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; flushing cache and exiting without a report");
            if let Some(cache) = &cache {
                if let Err(e) = cache.flush() {
                    error!(error = %e, "Failed to flush cache");
                }
            }
            return Ok(());
        }
    };

    // ---- Evaluate and write ----
    let report = pipeline::build_report(by_source, &config, cache.as_ref().map(|c| c.stats()));
    info!(
        total = report.total_items,
        generated_at = %report.generated_at,
        "Report assembled"
    );
    if let Err(e) = json::write_report(&report, &args.output_dir).await {
        error!(error = %e, "Failed to write JSON report");
    }

    // ---- Cache shutdown ----
    if let Some(cache) = &cache {
        if let Err(e) = cache.flush() {
            error!(error = %e, "Failed to flush cache");
        }
        let stats = cache.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            hit_rate = format!("{:.1}%", stats.hit_rate * 100.0),
            entries = stats.entry_count,
            size_bytes = stats.size_bytes,
            degraded = stats.degraded,
            "Cache statistics"
        );
    }

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        finished_at = %Utc::now(),
        "ai_ml_crawler finished"
    );
    Ok(())
}

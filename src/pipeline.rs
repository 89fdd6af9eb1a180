//! Per-source evaluation: date normalization, recency and relevance.

use crate::cache::CacheStats;
use crate::config::CrawlerConfig;
use crate::dates::{self, DateContext, NormalizedDate};
use crate::filter;
use crate::models::{Item, Report, ScoredItem, Source, SourceSummary};
use crate::recency;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Evaluate one source's items against the wall clock. Each item's date
/// is normalized and judged at the moment it is looked at.
pub fn evaluate(items: Vec<Item>, config: &CrawlerConfig) -> (Vec<ScoredItem>, SourceSummary) {
    let lookback = config.recency.lookback();
    let policy = config.recency.unknown_policy;
    evaluate_with(
        items,
        config,
        |raw, context| {
            let date = dates::normalize(raw, context);
            (date, recency::is_recent(date, lookback, policy))
        },
        Utc::now,
    )
}

/// Evaluate one source's items at a fixed instant `now`.
#[cfg(test)]
pub fn evaluate_at(
    items: Vec<Item>,
    config: &CrawlerConfig,
    now: DateTime<Utc>,
) -> (Vec<ScoredItem>, SourceSummary) {
    let lookback = config.recency.lookback();
    let policy = config.recency.unknown_policy;
    evaluate_with(
        items,
        config,
        |raw, context| {
            let date = dates::normalize_at(raw, context, now);
            (date, recency::is_recent_at(date, lookback, policy, now))
        },
        || now,
    )
}

/// Shared loop: `judge` dates an item and decides recency, `clock` gives
/// the instant used for the relevance recency bonus.
#[instrument(level = "info", skip_all, fields(items = items.len()))]
fn evaluate_with(
    items: Vec<Item>,
    config: &CrawlerConfig,
    judge: impl Fn(Option<&str>, &DateContext<'_>) -> (NormalizedDate, bool),
    clock: impl Fn() -> DateTime<Utc>,
) -> (Vec<ScoredItem>, SourceSummary) {
    let mut summary = SourceSummary {
        fetched: items.len(),
        ..SourceSummary::default()
    };

    let mut recent: Vec<(Item, NormalizedDate)> = Vec::with_capacity(items.len());
    for item in items {
        let context = DateContext {
            url: Some(item.url.as_str()),
            html: item.html_context.as_deref(),
        };
        let (date, is_recent) = judge(item.raw_date.as_deref(), &context);
        if !date.is_known() {
            summary.unknown_dates += 1;
        }
        if is_recent {
            recent.push((item, date));
        } else {
            debug!(url = %item.url, %date, "Dropping stale item");
            summary.dropped_stale += 1;
        }
    }

    let (kept, dropped) = filter::rank(recent, &config.keywords, clock());
    summary.dropped_irrelevant = dropped;
    summary.kept = kept.len();
    (kept, summary)
}

/// Evaluate every source and assemble the run's report.
pub fn build_report(
    by_source: BTreeMap<Source, Vec<Item>>,
    config: &CrawlerConfig,
    cache: Option<CacheStats>,
) -> Report {
    let mut sources = BTreeMap::new();
    let mut items = Vec::new();
    for (source, batch) in by_source {
        let (kept, summary) = evaluate(batch, config);
        info!(
            %source,
            fetched = summary.fetched,
            unknown_dates = summary.unknown_dates,
            stale = summary.dropped_stale,
            irrelevant = summary.dropped_irrelevant,
            kept = summary.kept,
            "Evaluated source"
        );
        sources.insert(source, summary);
        items.extend(kept);
    }
    items.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });

    Report {
        generated_at: Utc::now(),
        lookback_days: config.recency.lookback_days,
        unknown_policy: config.recency.unknown_policy,
        total_items: items.len(),
        sources,
        items,
        cache,
    }
}

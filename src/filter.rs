//! Keyword relevance scoring and ranking.
//!
//! # Score
//!
//! | Signal | Weight |
//! |--------|--------|
//! | each multimodal keyword | 2.0 |
//! | each AI agent keyword | 2.0 |
//! | each energy AI keyword | 2.5 |
//! | each high-value keyword | 1.5 |
//! | each company keyword | 1.0 |
//! | attributed to OpenAI, Anthropic or Meta | +2.0 |
//! | `research` or `paper` tag | +1.0 |
//! | any general AI term (counted once) | +0.5 |
//! | recency by age in days: 7 / 30 / 90 / 180 / older | +2.0 / 1.8 / 1.5 / 1.0 / 0.5 |
//! | GitHub stars and forks | min(2, stars/1000) + min(1, forks/100) |
//!
//! Keywords match as case-insensitive substrings of the title, summary and
//! tags. Items scoring zero or less are dropped.

use crate::config::KeywordConfig;
use crate::dates::NormalizedDate;
use crate::models::{Item, ScoredItem, Source};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::cmp::Ordering;
use tracing::{debug, instrument};

const MAJOR_LABS: &[&str] = &["openai", "anthropic", "meta"];
const RESEARCH_TAGS: &[&str] = &["research", "paper"];
const GENERAL_AI_TERMS: &[&str] = &[
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural network",
    "ai",
    "ml",
    "llm",
    "gpt",
    "claude",
    "gemini",
];
const MAX_REASONS: usize = 4;
const KEYWORDS_PER_REASON: usize = 3;
const HIGH_ENGAGEMENT_STARS: u64 = 500;

fn matches<'k>(text: &str, keywords: &'k [String]) -> Vec<&'k str> {
    keywords
        .iter()
        .filter(|k| text.contains(k.as_str()))
        .map(String::as_str)
        .collect()
}

/// Bonus for fresh content. Unknown dates get nothing.
pub fn recency_bonus(date: NormalizedDate, now: DateTime<Utc>) -> f64 {
    let Some(t) = date.instant() else {
        return 0.0;
    };
    match (now - t).num_days() {
        ..=7 => 2.0,
        8..=30 => 1.8,
        31..=90 => 1.5,
        91..=180 => 1.0,
        _ => 0.5,
    }
}

pub fn engagement_bonus(item: &Item) -> f64 {
    if item.source != Source::GitHub {
        return 0.0;
    }
    (item.stars as f64 / 1000.0).min(2.0) + (item.forks as f64 / 100.0).min(1.0)
}

/// Relevance score for `item` at `now`.
pub fn score(item: &Item, date: NormalizedDate, keywords: &KeywordConfig, now: DateTime<Utc>) -> f64 {
    let text = item.search_text();
    let mut score = 0.0;
    score += matches(&text, &keywords.multimodal).len() as f64 * 2.0;
    score += matches(&text, &keywords.ai_agent).len() as f64 * 2.0;
    score += matches(&text, &keywords.energy_ai).len() as f64 * 2.5;
    score += matches(&text, &keywords.high_value).len() as f64 * 1.5;
    score += matches(&text, &keywords.company).len() as f64 * 1.0;

    if let Some(author) = &item.author {
        let author = author.to_lowercase();
        if MAJOR_LABS.iter().any(|lab| author.contains(lab)) {
            score += 2.0;
        }
    }
    if item.tags.iter().any(|t| RESEARCH_TAGS.contains(&t.as_str())) {
        score += 1.0;
    }
    if GENERAL_AI_TERMS.iter().any(|t| text.contains(t)) {
        score += 0.5;
    }
    score + recency_bonus(date, now) + engagement_bonus(item)
}

/// Human-readable explanations, at most four.
pub fn reasons(item: &Item, date: NormalizedDate, keywords: &KeywordConfig, now: DateTime<Utc>) -> Vec<String> {
    let text = item.search_text();
    let mut reasons = Vec::new();
    for (label, list) in [
        ("Multimodal AI", &keywords.multimodal),
        ("AI Agents", &keywords.ai_agent),
        ("Energy AI", &keywords.energy_ai),
        ("Key Tech", &keywords.high_value),
    ] {
        let found = matches(&text, list);
        if !found.is_empty() {
            reasons.push(format!("{label}: {}", found.iter().take(KEYWORDS_PER_REASON).join(", ")));
        }
    }
    if recency_bonus(date, now) >= 1.5 {
        reasons.push("Recent content".to_string());
    }
    if item.source == Source::GitHub && item.stars > HIGH_ENGAGEMENT_STARS {
        reasons.push(format!("High engagement ({} stars)", item.stars));
    }
    reasons.truncate(MAX_REASONS);
    reasons
}

/// Score, drop irrelevant items, dedupe by URL and sort best first.
///
/// Returns the kept items and how many candidates were dropped, either as
/// duplicates or as irrelevant.
#[instrument(level = "info", skip_all, fields(candidates = items.len()))]
pub fn rank(
    items: Vec<(Item, NormalizedDate)>,
    keywords: &KeywordConfig,
    now: DateTime<Utc>,
) -> (Vec<ScoredItem>, usize) {
    let candidates = items.len();
    let mut kept: Vec<ScoredItem> = items
        .into_iter()
        .unique_by(|(item, _)| item.url.clone())
        .filter_map(|(item, date)| {
            let relevance_score = score(&item, date, keywords, now);
            if relevance_score <= 0.0 {
                debug!(url = %item.url, "Dropping irrelevant item");
                return None;
            }
            let relevance_reasons = reasons(&item, date, keywords, now);
            Some(ScoredItem {
                item,
                date,
                relevance_score,
                relevance_reasons,
            })
        })
        .collect();
    kept.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    let dropped = candidates - kept.len();
    (kept, dropped)
}

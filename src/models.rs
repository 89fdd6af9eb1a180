//! Data models shared by the sources, the filter and the report writer.
//!
//! - [`Item`]: one candidate as produced by a source, before any judgement
//! - [`ScoredItem`]: an item that survived recency and relevance filtering
//! - [`Report`]: everything written for a single run

use crate::cache::CacheStats;
use crate::dates::NormalizedDate;
use crate::recency::UnknownPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Where an item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    GitHub,
    #[serde(rename = "arXiv")]
    Arxiv,
    HuggingFace,
    Medium,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::GitHub => "GitHub",
            Source::Arxiv => "arXiv",
            Source::HuggingFace => "HuggingFace",
            Source::Medium => "Medium",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate item as produced by a source.
///
/// `raw_date` is whatever the upstream gave us, untouched. `html_context`
/// holds a page body when one was fetched, so the date normalizer can look
/// for `<time>`, `<meta>` and JSON-LD hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub title: String,
    pub url: String,
    pub raw_date: Option<String>,
    pub summary: String,
    pub tags: BTreeSet<String>,
    pub source: Source,
    /// Organization or author the item is attributed to, if any.
    pub author: Option<String>,
    #[serde(skip)]
    pub html_context: Option<String>,
    pub stars: u64,
    pub forks: u64,
}

impl Item {
    pub fn new(source: Source, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            raw_date: None,
            summary: String::new(),
            tags: BTreeSet::new(),
            source,
            author: None,
            html_context: None,
            stars: 0,
            forks: 0,
        }
    }

    /// Title, summary and tags, lower-cased, for keyword matching.
    pub fn search_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.summary.as_str()];
        parts.extend(self.tags.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}

/// An item that was kept, with its normalized date and relevance.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: Item,
    pub date: NormalizedDate,
    pub relevance_score: f64,
    pub relevance_reasons: Vec<String>,
}

/// Per-source counters for the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub fetched: usize,
    pub unknown_dates: usize,
    pub dropped_stale: usize,
    pub dropped_irrelevant: usize,
    pub kept: usize,
}

/// Output of one crawl.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub lookback_days: u32,
    pub unknown_policy: UnknownPolicy,
    pub total_items: usize,
    pub sources: BTreeMap<Source, SourceSummary>,
    pub items: Vec<ScoredItem>,
    pub cache: Option<CacheStats>,
}

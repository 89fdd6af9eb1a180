//! Upstream sources of candidate items.
//!
//! Every source talks to a JSON API or an XML feed through the shared
//! [`Fetcher`], so responses are cached and retried in one place.
//!
//! # Supported Sources
//!
//! | Source | Module | Endpoint | Raw date |
//! |--------|--------|----------|----------|
//! | GitHub | [`github`] | `/search/repositories` | `created_at` |
//! | arXiv | [`arxiv`] | Atom export API | `<published>` |
//! | Hugging Face | [`huggingface`] | `/api/models` | `createdAt` |
//! | Medium | [`medium`] | `medium.com/feed/...` RSS | `<pubDate>` |
//!
//! # Common Patterns
//!
//! Each source module exports:
//! - `search(...)`: one query or feed, returns `Result<Vec<Item>, CrawlError>`
//! - `collect(...)`: all configured queries; failures are logged and skipped
//!
//! Queries within a source run concurrently with `futures::stream`, bounded
//! by `fetch.concurrency`.

pub mod arxiv;
mod feed;
pub mod github;
pub mod huggingface;
pub mod medium;

use crate::config::CrawlerConfig;
use crate::fetch::{FetchText, Fetcher};
use crate::models::{Item, Source};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Flatten per-query batches, keep the first occurrence of each URL and cap
/// the total.
pub(crate) fn finish(batches: Vec<Vec<Item>>, max: usize) -> Vec<Item> {
    batches
        .into_iter()
        .flatten()
        .unique_by(|item| item.url.clone())
        .take(max)
        .collect()
}

/// Fetch the page of every item that came without a date, so the date
/// normalizer can look at its `<time>`, `<meta>` and JSON-LD hints.
#[instrument(level = "info", skip_all)]
pub async fn attach_pages<T: FetchText>(fetcher: &Fetcher<T>, items: &mut [Item], concurrency: usize) {
    let pages: Vec<(usize, String)> = stream::iter(
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.raw_date.is_none() && item.html_context.is_none()),
    )
    .map(|(i, item)| async move {
        match fetcher.get_text(&item.url, &[("Accept", "text/html")]).await {
            Ok(html) => Some((i, html)),
            Err(e) => {
                debug!(url = %item.url, error = %e, "Could not fetch page for date hints");
                None
            }
        }
    })
    .buffer_unordered(concurrency.max(1))
    .filter_map(|page| async move { page })
    .collect()
    .await;

    if !pages.is_empty() {
        info!(count = pages.len(), "Fetched pages for undated items");
    }
    for (i, html) in pages {
        items[i].html_context = Some(html);
    }
}

/// Run every enabled source concurrently and group the results.
#[instrument(level = "info", skip_all)]
pub async fn collect_all<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &CrawlerConfig,
) -> BTreeMap<Source, Vec<Item>> {
    let github = async {
        if config.github.enabled {
            github::collect(fetcher, &config.github, &config.fetch).await
        } else {
            Vec::new()
        }
    };
    let arxiv = async {
        if config.arxiv.enabled {
            arxiv::collect(fetcher, &config.arxiv, &config.fetch).await
        } else {
            Vec::new()
        }
    };
    let huggingface = async {
        if config.huggingface.enabled {
            huggingface::collect(fetcher, &config.huggingface, &config.fetch).await
        } else {
            Vec::new()
        }
    };

    let medium = async {
        if config.medium.enabled {
            medium::collect(fetcher, &config.medium, &config.fetch).await
        } else {
            Vec::new()
        }
    };

    let (github, arxiv, huggingface, medium) = futures::join!(github, arxiv, huggingface, medium);
    let mut by_source = BTreeMap::from([
        (Source::GitHub, github),
        (Source::Arxiv, arxiv),
        (Source::HuggingFace, huggingface),
        (Source::Medium, medium),
    ]);
    if config.fetch.fetch_undated_pages {
        for items in by_source.values_mut() {
            attach_pages(fetcher, items, config.fetch.concurrency).await;
        }
    }
    info!(
        total = by_source.values().map(Vec::len).sum::<usize>(),
        "Collected items from all sources"
    );
    by_source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::PrefixFetch;

    fn item(url: &str) -> Item {
        Item::new(Source::GitHub, url, url)
    }

    #[test]
    fn test_finish_dedupes_and_caps() {
        let batches = vec![
            vec![item("https://a"), item("https://b")],
            vec![item("https://b"), item("https://c"), item("https://d")],
        ];
        let urls: Vec<String> = finish(batches, 3).into_iter().map(|i| i.url).collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
    }

    #[tokio::test]
    async fn test_disabled_sources_are_empty() {
        let mut config = CrawlerConfig::default();
        config.github.enabled = false;
        config.arxiv.enabled = false;
        config.medium.enabled = false;
        config.huggingface.search_terms = vec!["agent".into()];
        let body = r#"[{"id":"org/agent-model","createdAt":"2025-05-01T00:00:00.000Z"}]"#;
        let fetcher = Fetcher::new(
            PrefixFetch::default().route("https://huggingface.co/api/models", body),
            None,
        );

        let by_source = collect_all(&fetcher, &config).await;
        assert!(by_source[&Source::GitHub].is_empty());
        assert!(by_source[&Source::Arxiv].is_empty());
        assert!(by_source[&Source::Medium].is_empty());
        assert_eq!(by_source[&Source::HuggingFace].len(), 1);
        assert_eq!(fetcher_calls(&fetcher), 1);
    }

    #[tokio::test]
    async fn test_attach_pages_only_for_undated_items() {
        let page = r#"<html><head><meta property="article:published_time" content="2025-04-02T09:00:00Z"></head></html>"#;
        let fetcher = Fetcher::new(PrefixFetch::default().route("https://blog.example.com/", page), None);
        let mut dated = item("https://blog.example.com/dated");
        dated.raw_date = Some("2025-01-01".into());
        let mut items = vec![dated, item("https://blog.example.com/undated"), item("https://gone.example.com/x")];

        attach_pages(&fetcher, &mut items, 2).await;
        assert!(items[0].html_context.is_none());
        assert_eq!(items[1].html_context.as_deref(), Some(page));
        assert!(items[2].html_context.is_none());
        assert_eq!(fetcher_calls(&fetcher), 2);
    }

    fn fetcher_calls(fetcher: &Fetcher<PrefixFetch>) -> usize {
        fetcher.inner().calls.lock().len()
    }
}

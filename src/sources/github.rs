//! GitHub repository search.
//!
//! Uses the public search API (`/search/repositories`), one request per
//! configured query, sorted by most recently updated. A token raises the
//! rate limit from 10 to 30 searches per minute but is not required.
//!
//! # Query Shape
//!
//! ```text
//! q = "<query> language:python stars:><min_stars>"
//! ```

use crate::config::{FetchConfig, GithubConfig};
use crate::error::CrawlError;
use crate::fetch::{FetchText, Fetcher};
use crate::models::{Item, Source};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

const PER_PAGE: usize = 30;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    html_url: String,
    description: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    topics: Vec<String>,
    language: Option<String>,
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

impl From<Repository> for Item {
    fn from(repo: Repository) -> Self {
        let mut item = Item::new(Source::GitHub, repo.full_name, repo.html_url);
        item.summary = repo.description.unwrap_or_default();
        item.raw_date = repo.created_at;
        item.stars = repo.stargazers_count;
        item.forks = repo.forks_count;
        item.author = repo.owner.map(|o| o.login);
        item.tags.insert("github".to_string());
        item.tags.extend(repo.topics.into_iter().map(|t| t.to_lowercase()));
        if let Some(lang) = repo.language {
            item.tags.insert(lang.to_lowercase());
        }
        item
    }
}

fn search_url(config: &GithubConfig, query: &str) -> Result<Url, CrawlError> {
    let base = format!("{}/search/repositories", config.api_base.trim_end_matches('/'));
    let q = format!("{query} language:python stars:>{}", config.min_stars);
    let per_page = PER_PAGE.to_string();
    Url::parse_with_params(
        &base,
        &[
            ("q", q.as_str()),
            ("sort", "updated"),
            ("order", "desc"),
            ("per_page", per_page.as_str()),
        ],
    )
    .map_err(|e| CrawlError::Config(format!("github.api_base: {e}")))
}

pub(crate) fn parse_search(url: &str, body: &str) -> Result<Vec<Item>, CrawlError> {
    let response: SearchResponse = serde_json::from_str(body).map_err(|e| CrawlError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(response.items.into_iter().map(Item::from).collect())
}

/// Run one search query.
#[instrument(level = "info", skip(fetcher, config))]
pub async fn search<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &GithubConfig,
    query: &str,
) -> Result<Vec<Item>, CrawlError> {
    let url = search_url(config, query)?;
    let auth = config.token.as_ref().map(|t| format!("Bearer {t}"));
    let mut headers = vec![("Accept", "application/vnd.github+json")];
    if let Some(auth) = &auth {
        headers.push(("Authorization", auth.as_str()));
    }

    let body = fetcher.get_text(url.as_str(), &headers).await?;
    let items = parse_search(url.as_str(), &body)?;
    debug!(count = items.len(), "GitHub search returned repositories");
    Ok(items)
}

/// Run every configured query. Failed queries are logged and skipped.
#[instrument(level = "info", skip_all)]
pub async fn collect<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &GithubConfig,
    fetch: &FetchConfig,
) -> Vec<Item> {
    if config.token.is_none() {
        warn!("No GitHub token configured; search requests are heavily rate limited");
    }
    let batches: Vec<Vec<Item>> = stream::iter(config.queries.iter())
        .map(|query| async move {
            match search(fetcher, config, query).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(%query, error = %e, "GitHub search failed; skipping query");
                    Vec::new()
                }
            }
        })
        .buffered(fetch.concurrency.max(1))
        .collect()
        .await;

    let items = super::finish(batches, fetch.max_results_per_source);
    info!(count = items.len(), "Collected GitHub repositories");
    items
}

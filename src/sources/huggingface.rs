//! Hugging Face model hub search.
//!
//! Queries `/api/models` once per search term, newest modifications first.
//! The hub returns a JSON array; `createdAt` is used as the raw date and
//! `lastModified` as a fallback.

use crate::config::{FetchConfig, HuggingFaceConfig};
use crate::error::CrawlError;
use crate::fetch::{FetchText, Fetcher};
use crate::models::{Item, Source};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Model {
    id: String,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(rename = "pipeline_tag")]
    pipeline_tag: Option<String>,
    #[serde(default)]
    likes: u64,
    #[serde(default)]
    downloads: u64,
    created_at: Option<String>,
    last_modified: Option<String>,
}

impl Model {
    fn into_item(self, base: &str) -> Item {
        let url = format!("{}/{}", base.trim_end_matches('/'), self.id);
        let mut item = Item::new(Source::HuggingFace, self.id.clone(), url);
        item.summary = match &self.pipeline_tag {
            Some(task) => format!("{task} model, {} downloads, {} likes", self.downloads, self.likes),
            None => format!("Model, {} downloads, {} likes", self.downloads, self.likes),
        };
        item.raw_date = self.created_at.or(self.last_modified);
        item.stars = self.likes;
        item.author = self
            .author
            .or_else(|| self.id.split_once('/').map(|(org, _)| org.to_string()));
        item.tags.insert("huggingface".to_string());
        item.tags.insert("model".to_string());
        // Hub tags include noise like "region:us" and licence markers.
        item.tags.extend(
            self.tags
                .into_iter()
                .filter(|t| !t.contains(':') && t.len() < 32)
                .map(|t| t.to_lowercase()),
        );
        if let Some(task) = self.pipeline_tag {
            item.tags.insert(task);
        }
        item
    }
}

fn search_url(config: &HuggingFaceConfig, term: &str, limit: usize) -> Result<Url, CrawlError> {
    let base = format!("{}/api/models", config.api_base.trim_end_matches('/'));
    let limit = limit.to_string();
    Url::parse_with_params(
        &base,
        &[
            ("search", term),
            ("sort", "lastModified"),
            ("direction", "-1"),
            ("limit", limit.as_str()),
        ],
    )
    .map_err(|e| CrawlError::Config(format!("huggingface.api_base: {e}")))
}

pub(crate) fn parse_models(url: &str, base: &str, body: &str) -> Result<Vec<Item>, CrawlError> {
    let models: Vec<Model> = serde_json::from_str(body).map_err(|e| CrawlError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(models.into_iter().map(|m| m.into_item(base)).collect())
}

#[instrument(level = "info", skip(fetcher, config))]
pub async fn search<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &HuggingFaceConfig,
    term: &str,
    limit: usize,
) -> Result<Vec<Item>, CrawlError> {
    let url = search_url(config, term, limit)?;
    let body = fetcher
        .get_text(url.as_str(), &[("Accept", "application/json")])
        .await?;
    parse_models(url.as_str(), &config.api_base, &body)
}

/// Search every configured term. Failed terms are logged and skipped.
#[instrument(level = "info", skip_all)]
pub async fn collect<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &HuggingFaceConfig,
    fetch: &FetchConfig,
) -> Vec<Item> {
    let limit = fetch.max_results_per_source;
    let batches: Vec<Vec<Item>> = stream::iter(config.search_terms.iter())
        .map(|term| async move {
            match search(fetcher, config, term, limit).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(%term, error = %e, "Hugging Face search failed; skipping term");
                    Vec::new()
                }
            }
        })
        .buffered(fetch.concurrency.max(1))
        .collect()
        .await;

    let items = super::finish(batches, fetch.max_results_per_source);
    info!(count = items.len(), "Collected Hugging Face models");
    items
}

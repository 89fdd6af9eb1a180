//! Medium articles via publication and tag RSS feeds.
//!
//! Medium serves RSS 2.0 at `medium.com/feed/<publication>` and
//! `medium.com/feed/tag/<tag>`. Items carry an RFC 2822 `<pubDate>`, which
//! is passed through untouched as the raw date. Atom `<entry>` elements are
//! accepted too, for feeds proxied through other hosts.
//!
//! Only the first `max_items_per_feed` items of each feed are considered,
//! and of those only the ones whose title or description mention an AI
//! term.

use super::feed::{attribute, collapse_whitespace, decode_text, resolve_entity, truncate_chars};
use crate::config::{FetchConfig, MediumConfig};
use crate::error::CrawlError;
use crate::fetch::{FetchText, Fetcher};
use crate::models::{Item, Source};
use futures::stream::{self, StreamExt};
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

const MAX_SUMMARY_CHARS: usize = 200;
const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9";

/// Terms that mark a feed item as AI related.
const AI_TERMS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural network",
    "llm",
    "gpt",
    "transformer",
    "multimodal",
    "computer vision",
    "nlp",
    "agent",
    "autonomous",
];

#[derive(Debug, Default)]
struct FeedItem {
    title: String,
    link: String,
    guid: String,
    description: String,
    content: String,
    published: String,
    creator: String,
    categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid,
    Description,
    Content,
    Published,
    Creator,
    Category,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"guid" | b"id" => Some(Field::Guid),
            b"description" | b"summary" => Some(Field::Description),
            b"encoded" | b"content" => Some(Field::Content),
            b"pubDate" | b"published" => Some(Field::Published),
            b"creator" | b"name" => Some(Field::Creator),
            b"category" => Some(Field::Category),
            _ => None,
        }
    }
}

impl FeedItem {
    fn push(&mut self, field: Field, text: &str) {
        match field {
            Field::Title => self.title.push_str(text),
            Field::Link => self.link.push_str(text),
            Field::Guid => self.guid.push_str(text),
            Field::Description => self.description.push_str(text),
            Field::Content => self.content.push_str(text),
            Field::Published => self.published.push_str(text),
            Field::Creator => self.creator.push_str(text),
            Field::Category => {
                if let Some(last) = self.categories.last_mut() {
                    last.push_str(text);
                }
            }
        }
    }

    fn into_item(self) -> Option<Item> {
        let title = collapse_whitespace(&self.title);
        let url = [self.link.trim(), self.guid.trim()]
            .into_iter()
            .find(|u| u.starts_with("http://") || u.starts_with("https://"))
            .map(clean_link)?;
        if title.is_empty() {
            return None;
        }

        let mut item = Item::new(Source::Medium, title, url);
        let body = if self.description.trim().is_empty() {
            &self.content
        } else {
            &self.description
        };
        item.summary = truncate_chars(&collapse_whitespace(&html_text(body)), MAX_SUMMARY_CHARS);
        let published = self.published.trim();
        if !published.is_empty() {
            item.raw_date = Some(published.to_string());
        }
        let creator = collapse_whitespace(&self.creator);
        if !creator.is_empty() {
            item.author = Some(creator);
        }
        item.tags.insert("medium".to_string());
        item.tags.insert("rss".to_string());
        item.tags.extend(
            self.categories
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
        );
        Some(item)
    }
}

/// Visible text of an HTML fragment. Descriptions are usually HTML.
fn html_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return fragment.to_string();
    }
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop Medium's `source=rss-...` tracking parameter so the same article
/// from two feeds has one URL.
fn clean_link(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "source")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept.iter());
    }
    url.to_string()
}

fn is_ai_related(item: &Item) -> bool {
    let text = format!("{} {}", item.title, item.summary).to_lowercase();
    AI_TERMS.iter().any(|term| text.contains(term))
}

/// Parse an RSS or Atom feed into items, in feed order. Items without a
/// title or an absolute link are skipped.
pub(crate) fn parse_feed(url: &str, xml: &str) -> Result<Vec<Item>, CrawlError> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader.read_event().map_err(|e| CrawlError::Decode {
            url: url.to_string(),
            reason: format!("at byte {}: {e}", reader.buffer_position()),
        })?;
        match event {
            Event::Start(tag) => {
                let name = tag.local_name();
                if matches!(name.as_ref(), b"item" | b"entry") {
                    current = Some(FeedItem::default());
                    field = None;
                } else if let Some(entry) = current.as_mut() {
                    field = Field::from_local_name(name.as_ref());
                    match field {
                        Some(Field::Category) => entry.categories.push(String::new()),
                        Some(Field::Link) if entry.link.is_empty() => {
                            entry.link.extend(attribute(&tag, b"href"));
                        }
                        _ => {}
                    }
                }
            }
            Event::Empty(tag) => {
                if let Some(entry) = current.as_mut() {
                    match tag.local_name().as_ref() {
                        b"link" if entry.link.is_empty() => entry.link.extend(attribute(&tag, b"href")),
                        b"category" => entry.categories.extend(attribute(&tag, b"term")),
                        _ => {}
                    }
                }
            }
            Event::Text(text) => {
                if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    entry.push(f, &decode_text(&text));
                }
            }
            Event::CData(data) => {
                if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    entry.push(f, &String::from_utf8_lossy(&data));
                }
            }
            Event::GeneralRef(reference) => {
                if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    if let Some(c) = resolve_entity(&reference) {
                        entry.push(f, c.encode_utf8(&mut [0; 4]));
                    }
                }
            }
            Event::End(tag) => {
                field = None;
                if matches!(tag.local_name().as_ref(), b"item" | b"entry") {
                    if let Some(item) = current.take().and_then(FeedItem::into_item) {
                        items.push(item);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(items)
}

/// Fetch one feed and keep its AI-related items.
#[instrument(level = "info", skip(fetcher, config))]
pub async fn search<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &MediumConfig,
    feed_url: &str,
) -> Result<Vec<Item>, CrawlError> {
    let body = fetcher.get_text(feed_url, &[("Accept", FEED_ACCEPT)]).await?;
    let items: Vec<Item> = parse_feed(feed_url, &body)?
        .into_iter()
        .take(config.max_items_per_feed)
        .filter(is_ai_related)
        .collect();
    debug!(count = items.len(), "Medium feed returned AI items");
    Ok(items)
}

/// Fetch every configured feed. Failed feeds are logged and skipped.
#[instrument(level = "info", skip_all)]
pub async fn collect<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &MediumConfig,
    fetch: &FetchConfig,
) -> Vec<Item> {
    let batches: Vec<Vec<Item>> = stream::iter(config.feeds.iter())
        .map(|feed_url| async move {
            match search(fetcher, config, feed_url).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(%feed_url, error = %e, "Medium feed failed; skipping");
                    Vec::new()
                }
            }
        })
        .buffered(fetch.concurrency.max(1))
        .collect()
        .await;

    let items = super::finish(batches, fetch.max_results_per_source);
    info!(count = items.len(), "Collected Medium articles");
    items
}

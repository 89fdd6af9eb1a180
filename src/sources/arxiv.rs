//! arXiv papers via the Atom export API.
//!
//! Each configured topic becomes one `search_query`, restricted to the
//! configured categories and sorted by submission date. The Atom feed is
//! parsed with a streaming `quick-xml` reader; only the handful of entry
//! fields we report on are kept.
//!
//! # Feed Shape
//!
//! ```text
//! <feed>
//!   <entry>
//!     <id>http://arxiv.org/abs/2405.12345v1</id>
//!     <published>2024-05-13T17:59:58Z</published>
//!     <title>...</title>
//!     <summary>...</summary>
//!     <author><name>...</name></author>
//!     <category term="cs.CV"/>
//!   </entry>
//! </feed>
//! ```

use crate::config::{ArxivConfig, FetchConfig};
use crate::error::CrawlError;
use crate::fetch::{FetchText, Fetcher};
use crate::models::{Item, Source};
use super::feed::{attribute, collapse_whitespace, decode_text, resolve_entity, truncate_chars};
use futures::stream::{self, StreamExt};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info, instrument, warn};
use url::Url;

const MAX_SUMMARY_CHARS: usize = 500;
const MAX_AUTHORS: usize = 3;

/// Fields collected for one `<entry>`.
#[derive(Debug, Default)]
struct Entry {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

impl Entry {
    fn into_item(self) -> Option<Item> {
        let title = collapse_whitespace(&self.title);
        if self.id.trim().is_empty() || title.is_empty() {
            return None;
        }
        let url = self.id.trim().replacen("http://", "https://", 1);
        let mut item = Item::new(Source::Arxiv, title, url);
        item.summary = truncate_chars(&collapse_whitespace(&self.summary), MAX_SUMMARY_CHARS);
        let published = self.published.trim();
        if !published.is_empty() {
            item.raw_date = Some(published.to_string());
        }
        if !self.authors.is_empty() {
            let mut authors = self.authors.iter().take(MAX_AUTHORS).cloned().collect::<Vec<_>>().join(", ");
            if self.authors.len() > MAX_AUTHORS {
                authors.push_str(" et al.");
            }
            item.author = Some(authors);
        }
        item.tags.insert("research".to_string());
        item.tags.insert("paper".to_string());
        item.tags.extend(self.categories);
        Some(item)
    }

    fn push(&mut self, field: Field, text: &str) {
        match field {
            Field::Id => self.id.push_str(text),
            Field::Title => self.title.push_str(text),
            Field::Summary => self.summary.push_str(text),
            Field::Published => self.published.push_str(text),
            Field::AuthorName => {
                if let Some(last) = self.authors.last_mut() {
                    last.push_str(text);
                }
            }
        }
    }
}

/// Parse an Atom feed into items. Entries without an id or title are skipped.
pub(crate) fn parse_feed(url: &str, xml: &str) -> Result<Vec<Item>, CrawlError> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut entry: Option<Entry> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader.read_event().map_err(|e| CrawlError::Decode {
            url: url.to_string(),
            reason: format!("at byte {}: {e}", reader.buffer_position()),
        })?;
        match event {
            Event::Start(tag) => {
                let name = tag.local_name();
                if name.as_ref() == b"entry" {
                    entry = Some(Entry::default());
                } else if let Some(e) = entry.as_mut() {
                    match name.as_ref() {
                        b"id" => field = Some(Field::Id),
                        b"title" => field = Some(Field::Title),
                        b"summary" => field = Some(Field::Summary),
                        b"published" => field = Some(Field::Published),
                        b"name" => {
                            e.authors.push(String::new());
                            field = Some(Field::AuthorName);
                        }
                        b"category" => e.categories.extend(attribute(&tag, b"term")),
                        _ => {}
                    }
                }
            }
            Event::Empty(tag) => {
                if let Some(e) = entry.as_mut() {
                    if tag.local_name().as_ref() == b"category" {
                        e.categories.extend(attribute(&tag, b"term"));
                    }
                }
            }
            Event::Text(text) => {
                if let (Some(f), Some(e)) = (field, entry.as_mut()) {
                    e.push(f, &decode_text(&text));
                }
            }
            Event::CData(data) => {
                if let (Some(f), Some(e)) = (field, entry.as_mut()) {
                    e.push(f, &String::from_utf8_lossy(&data));
                }
            }
            Event::GeneralRef(reference) => {
                if let (Some(f), Some(e)) = (field, entry.as_mut()) {
                    if let Some(c) = resolve_entity(&reference) {
                        e.push(f, c.encode_utf8(&mut [0; 4]));
                    }
                }
            }
            Event::End(tag) => match tag.local_name().as_ref() {
                b"entry" => {
                    field = None;
                    if let Some(item) = entry.take().and_then(Entry::into_item) {
                        items.push(item);
                    }
                }
                b"id" | b"title" | b"summary" | b"published" | b"name" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(items)
}

fn query_url(config: &ArxivConfig, topic: &str, max_results: usize) -> Result<Url, CrawlError> {
    let mut search = format!("all:\"{topic}\"");
    if !config.categories.is_empty() {
        let cats = config
            .categories
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        search = format!("{search} AND ({cats})");
    }
    let max_results = max_results.to_string();
    Url::parse_with_params(
        &config.api_url,
        &[
            ("search_query", search.as_str()),
            ("start", "0"),
            ("max_results", max_results.as_str()),
            ("sortBy", "submittedDate"),
            ("sortOrder", "descending"),
        ],
    )
    .map_err(|e| CrawlError::Config(format!("arxiv.api_url: {e}")))
}

/// Fetch one topic.
#[instrument(level = "info", skip(fetcher, config))]
pub async fn search<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &ArxivConfig,
    topic: &str,
    max_results: usize,
) -> Result<Vec<Item>, CrawlError> {
    let url = query_url(config, topic, max_results)?;
    let body = fetcher.get_text(url.as_str(), &[]).await?;
    let items = parse_feed(url.as_str(), &body)?;
    debug!(count = items.len(), "arXiv query returned entries");
    Ok(items)
}

/// Fetch every configured topic. Failed topics are logged and skipped.
#[instrument(level = "info", skip_all)]
pub async fn collect<T: FetchText>(
    fetcher: &Fetcher<T>,
    config: &ArxivConfig,
    fetch: &FetchConfig,
) -> Vec<Item> {
    let per_topic = fetch.max_results_per_source;
    let batches: Vec<Vec<Item>> = stream::iter(config.search_topics.iter())
        .map(|topic| async move {
            match search(fetcher, config, topic, per_topic).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(%topic, error = %e, "arXiv query failed; skipping topic");
                    Vec::new()
                }
            }
        })
        .buffered(fetch.concurrency.max(1))
        .collect()
        .await;

    let items = super::finish(batches, fetch.max_results_per_source);
    info!(count = items.len(), "Collected arXiv papers");
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::PrefixFetch;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:agents</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2405.12345v1</id>
    <updated>2024-05-14T10:00:00Z</updated>
    <published>2024-05-13T17:59:58Z</published>
    <title>Grid Agents:
      Multi-Agent Control &amp; Forecasting</title>
    <summary>  We study   agentic control
      of a smart grid.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <author><name>Grace Hopper</name></author>
    <author><name>Edsger Dijkstra</name></author>
    <arxiv:primary_category term="eess.SY" scheme="http://arxiv.org/schemas/atom"/>
    <category term="eess.SY" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2405.00001v2</id>
    <title>Undated</title>
    <summary>No published element.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_extracts_entries() {
        let items = parse_feed("http://export.arxiv.org/api/query", FEED).unwrap();
        assert_eq!(items.len(), 2);

        let paper = &items[0];
        assert_eq!(paper.source, Source::Arxiv);
        assert_eq!(paper.url, "https://arxiv.org/abs/2405.12345v1");
        assert_eq!(paper.title, "Grid Agents: Multi-Agent Control & Forecasting");
        assert_eq!(paper.summary, "We study agentic control of a smart grid.");
        assert_eq!(paper.raw_date.as_deref(), Some("2024-05-13T17:59:58Z"));
        assert_eq!(
            paper.author.as_deref(),
            Some("Ada Lovelace, Alan Turing, Grace Hopper et al.")
        );
        for tag in ["eess.SY", "cs.AI", "research", "paper"] {
            assert!(paper.tags.contains(tag), "missing tag {tag}");
        }

        assert!(items[1].raw_date.is_none());
    }

    #[test]
    fn test_feed_title_outside_entries_is_ignored() {
        let xml = r#"<feed><title>Only a feed title</title></feed>"#;
        assert!(parse_feed("u", xml).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_feed_is_decode_error() {
        let xml = "<feed><entry><title>broken</entry></feed>";
        assert!(matches!(parse_feed("u", xml), Err(CrawlError::Decode { .. })));
    }

    #[test]
    fn test_query_url_restricts_categories() {
        let config = ArxivConfig {
            categories: vec!["cs.AI".into(), "eess.SY".into()],
            ..ArxivConfig::default()
        };
        let url = query_url(&config, "smart grid", 5).unwrap();
        let search = url
            .query_pairs()
            .find(|(k, _)| k == "search_query")
            .map(|(_, v)| v.into_owned());
        assert_eq!(
            search.as_deref(),
            Some("all:\"smart grid\" AND (cat:cs.AI OR cat:eess.SY)")
        );
    }

    #[tokio::test]
    async fn test_collect_dedupes_across_topics() {
        let config = ArxivConfig {
            search_topics: vec!["agents".into(), "smart grid".into()],
            ..ArxivConfig::default()
        };
        let fetcher = Fetcher::new(
            PrefixFetch::default().route("http://export.arxiv.org/api/query", FEED),
            None,
        );
        let items = collect(&fetcher, &config, &FetchConfig::default()).await;
        assert_eq!(items.len(), 2);
    }
}

//! Date hints embedded in an HTML document.
//!
//! Only publication metadata is looked at here: `<time datetime>`
//! attributes, `<meta>` publication tags, JSON-LD blocks and the short text
//! of date-classed elements. The document body is never scanned as a whole.

use crate::dates::parse::FREE_TEXT_MAX_CHARS;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static META_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[content]").unwrap());
static JSON_LD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static DATE_TEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"time, [class*="date"], [class*="publish"], [class*="posted"]"#).unwrap()
});

/// Meta tag names in priority order, matched against `property`, `name`
/// and `itemprop`.
const META_NAMES: [&str; 10] = [
    "article:published_time",
    "og:published_time",
    "datepublished",
    "publishdate",
    "pubdate",
    "date",
    "dc.date",
    "dcterms.created",
    "article:modified_time",
    "og:updated_time",
];

const JSON_LD_FIELDS: [&str; 3] = ["datePublished", "dateCreated", "dateModified"];

const PUBLICATION_HINTS: [&str; 5] = ["publish", "post", "date", "created", "article"];

const MAX_TEXT_CANDIDATES: usize = 8;

/// Raw date strings pulled out of a document, grouped by strategy.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HtmlHints {
    /// `<time datetime>` and `<meta>` values, most specific first.
    pub structured: Vec<String>,
    /// JSON-LD `datePublished` / `dateCreated` / `dateModified` values.
    pub json_ld: Vec<String>,
    /// Short text of date-looking elements.
    pub free_text: Vec<String>,
}

pub fn extract(html: &str) -> HtmlHints {
    let document = Html::parse_document(html);
    HtmlHints {
        structured: structured_values(&document),
        json_ld: json_ld_values(&document),
        free_text: date_texts(&document),
    }
}

fn structured_values(document: &Html) -> Vec<String> {
    let mut likely = Vec::new();
    let mut others = Vec::new();
    for element in document.select(&TIME_SELECTOR) {
        if let Some(value) = element.value().attr("datetime").map(str::trim) {
            if value.is_empty() {
                continue;
            }
            if looks_like_publication(&element) {
                likely.push(value.to_string());
            } else {
                others.push(value.to_string());
            }
        }
    }

    let metas: Vec<(String, String)> = document
        .select(&META_SELECTOR)
        .filter_map(|element| {
            let el = element.value();
            let name = el
                .attr("property")
                .or_else(|| el.attr("name"))
                .or_else(|| el.attr("itemprop"))?;
            let content = el.attr("content")?.trim();
            (!content.is_empty()).then(|| (name.to_ascii_lowercase(), content.to_string()))
        })
        .collect();

    likely.extend(others);
    for wanted in META_NAMES {
        likely.extend(
            metas
                .iter()
                .filter(|(name, _)| name == wanted)
                .map(|(_, content)| content.clone()),
        );
    }
    likely
}

fn looks_like_publication(element: &ElementRef<'_>) -> bool {
    let el = element.value();
    if el
        .attr("itemprop")
        .is_some_and(|p| p.eq_ignore_ascii_case("datePublished"))
    {
        return true;
    }
    el.classes().any(|class| {
        let class = class.to_ascii_lowercase();
        PUBLICATION_HINTS.iter().any(|hint| class.contains(hint))
    })
}

fn json_ld_values(document: &Html) -> Vec<String> {
    let blocks: Vec<Value> = document
        .select(&JSON_LD_SELECTOR)
        .filter_map(|script| {
            let text = script.text().collect::<String>();
            match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed JSON-LD block");
                    None
                }
            }
        })
        .collect();

    let mut out = Vec::new();
    for field in JSON_LD_FIELDS {
        for block in &blocks {
            collect_field(block, field, &mut out);
        }
    }
    out
}

fn collect_field(value: &Value, field: &str, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_field(item, field, out)),
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get(field) {
                out.push(s.clone());
            }
            if let Some(graph) = map.get("@graph") {
                collect_field(graph, field, out);
            }
        }
        _ => {}
    }
}

fn date_texts(document: &Html) -> Vec<String> {
    document
        .select(&DATE_TEXT_SELECTOR)
        .map(|element| {
            element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty() && text.chars().count() <= FREE_TEXT_MAX_CHARS)
        .take(MAX_TEXT_CANDIDATES)
        .collect()
}

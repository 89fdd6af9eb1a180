//! Publication date normalization.
//!
//! Sources describe dates in many ways: API timestamps, `<time>` attributes,
//! JSON-LD metadata, dates baked into URL paths, or prose like
//! "May 13, 2024". [`normalize`] runs them through one ordered strategy
//! chain and returns either a UTC instant or [`NormalizedDate::Unknown`].
//!
//! # Strategy order
//!
//! 1. Structured values: the raw string, `<time datetime>`, `<meta>` tags
//! 2. JSON-LD `datePublished` / `dateCreated` / `dateModified`
//! 3. URL path patterns (`/YYYY/MM/DD/`, `YYYY-MM-DD-slug`, `/YYYY/MM/`)
//! 4. Free text on short candidates only
//!
//! The first candidate that parses *and* passes the plausibility check wins.
//! A candidate that lands within a few seconds of the evaluation instant is
//! rejected: an upstream fallback to "now" must never masquerade as a real
//! publication date.

pub mod html;
pub mod parse;

use crate::error::ParseFailure;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, trace};

/// Literal used for dates that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Canonical output format: second precision, always UTC.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A publication date after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizedDate {
    Known(DateTime<Utc>),
    Unknown,
}

impl NormalizedDate {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            NormalizedDate::Known(t) => Some(*t),
            NormalizedDate::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, NormalizedDate::Known(_))
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedDate::Known(t) => write!(f, "{}", t.format(CANONICAL_FORMAT)),
            NormalizedDate::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for NormalizedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything besides the raw string that may carry a date.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateContext<'a> {
    pub url: Option<&'a str>,
    pub html: Option<&'a str>,
}

#[cfg(test)]
impl<'a> DateContext<'a> {
    pub fn with_url(url: &'a str) -> Self {
        Self {
            url: Some(url),
            html: None,
        }
    }
}

/// One raw date string tagged with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Structured(String),
    JsonLd(String),
    UrlPath(String),
    FreeText(String),
}

impl Candidate {
    pub fn strategy(&self) -> &'static str {
        match self {
            Candidate::Structured(_) => "structured",
            Candidate::JsonLd(_) => "json_ld",
            Candidate::UrlPath(_) => "url_path",
            Candidate::FreeText(_) => "free_text",
        }
    }

    fn resolve(&self) -> Result<DateTime<Utc>, ParseFailure> {
        match self {
            Candidate::Structured(s) => parse::parse_structured(s),
            // JSON-LD in the wild often holds prose dates.
            Candidate::JsonLd(s) => {
                parse::parse_structured(s).or_else(|_| parse::parse_free_text(s))
            }
            Candidate::UrlPath(s) => parse::parse_url_path(s),
            Candidate::FreeText(s) => parse::parse_free_text(s),
        }
    }
}

/// Normalize against the current wall clock.
pub fn normalize(raw: Option<&str>, context: &DateContext<'_>) -> NormalizedDate {
    normalize_at(raw, context, Utc::now())
}

/// Normalize against an explicit evaluation instant.
///
/// Never fails: every rejected candidate is logged at debug level and the
/// chain moves on; exhausting it yields [`NormalizedDate::Unknown`].
pub fn normalize_at(
    raw: Option<&str>,
    context: &DateContext<'_>,
    now: DateTime<Utc>,
) -> NormalizedDate {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());

    // Cheap path first: most API sources hand over a clean timestamp, so the
    // document is only parsed when the raw value does not settle it.
    if let Some(t) = first_resolved(raw.map(|r| Candidate::Structured(r.to_string())), now) {
        return NormalizedDate::Known(t);
    }

    // A raw value that parsed strictly but was rejected (implausible, or
    // "now") must not sneak back in through the fuzzy parser.
    let raw_free_text = raw.filter(|r| parse::parse_structured(r).is_err());

    let hints = context.html.map(html::extract).unwrap_or_default();
    let rest = hints
        .structured
        .into_iter()
        .map(Candidate::Structured)
        .chain(hints.json_ld.into_iter().map(Candidate::JsonLd))
        .chain(context.url.map(|u| Candidate::UrlPath(u.to_string())))
        .chain(raw_free_text.map(|r| Candidate::FreeText(r.to_string())))
        .chain(hints.free_text.into_iter().map(Candidate::FreeText));

    match first_resolved(rest, now) {
        Some(t) => NormalizedDate::Known(t),
        None => {
            trace!(raw = ?raw, url = ?context.url, "No usable date candidate");
            NormalizedDate::Unknown
        }
    }
}

fn first_resolved(
    candidates: impl IntoIterator<Item = Candidate>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    candidates.into_iter().find_map(|candidate| {
        match candidate
            .resolve()
            .and_then(|t| parse::check_plausible(t, now))
        {
            Ok(t) => {
                debug!(strategy = candidate.strategy(), date = %t, "Resolved publication date");
                Some(t)
            }
            Err(e) => {
                debug!(strategy = candidate.strategy(), error = %e, "Rejected date candidate");
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn known(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NormalizedDate {
        NormalizedDate::Known(Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap())
    }

    #[test]
    fn test_structured_raw_date() {
        let date = normalize_at(Some("2024-05-13T10:30:00Z"), &DateContext::default(), now());
        assert_eq!(date, known(2024, 5, 13, 10, 30, 0));
        assert_eq!(date.to_string(), "2024-05-13T10:30:00Z");
    }

    #[test]
    fn test_url_only() {
        let ctx = DateContext::with_url("https://openai.com/index/2024/05/13/gpt-4o");
        let date = normalize_at(None, &ctx, now());
        assert_eq!(date.to_string(), "2024-05-13T00:00:00Z");
    }

    #[test]
    fn test_empty_without_context_is_unknown() {
        assert_eq!(
            normalize_at(Some(""), &DateContext::default(), now()),
            NormalizedDate::Unknown
        );
        assert_eq!(normalize_at(None, &DateContext::default(), now()), NormalizedDate::Unknown);
        assert_eq!(NormalizedDate::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_unparseable_never_becomes_now() {
        let inputs = ["today", "just now", "n/a", "???", "0000-00-00", "2024-99-99", "yesterday at noon"];
        for raw in inputs {
            let date = normalize_at(Some(raw), &DateContext::default(), now());
            assert_eq!(date, NormalizedDate::Unknown, "input {raw:?}");
        }
    }

    #[test]
    fn test_value_equal_to_now_is_rejected() {
        let stamp = now().format(CANONICAL_FORMAT).to_string();
        let date = normalize_at(Some(&stamp), &DateContext::default(), now());
        assert_eq!(date, NormalizedDate::Unknown);

        // A genuine date further down the chain still wins.
        let ctx = DateContext::with_url("https://example.com/2024/05/13/post");
        assert_eq!(normalize_at(Some(&stamp), &ctx, now()), known(2024, 5, 13, 0, 0, 0));
    }

    #[test]
    fn test_canonical_string_round_trips() {
        let inputs = [
            "2024-05-13T12:30:45.250+02:00",
            "Mon, 13 May 2024 10:30:00 +0000",
            "May 13, 2024",
            "2019-12-31",
        ];
        for raw in inputs {
            let first = normalize_at(Some(raw), &DateContext::default(), now());
            assert!(first.is_known(), "input {raw:?}");
            let again = normalize_at(Some(&first.to_string()), &DateContext::default(), now());
            assert_eq!(first, again, "input {raw:?}");
        }
    }

    #[test]
    fn test_structured_beats_url() {
        let ctx = DateContext::with_url("https://example.com/2020/01/01/post");
        let date = normalize_at(Some("2024-05-13"), &ctx, now());
        assert_eq!(date, known(2024, 5, 13, 0, 0, 0));
    }

    #[test]
    fn test_html_hints_order() {
        let html = r#"
            <html><head>
              <script type="application/ld+json">{"@type": "Article", "datePublished": "2024-04-01"}</script>
            </head><body><span class="date">March 3, 2024</span></body></html>"#;
        let ctx = DateContext {
            url: Some("https://example.com/2024/02/02/post"),
            html: Some(html),
        };
        assert_eq!(normalize_at(None, &ctx, now()), known(2024, 4, 1, 0, 0, 0));

        let ctx = DateContext {
            url: None,
            html: Some(r#"<html><body><span class="date">March 3, 2024</span></body></html>"#),
        };
        assert_eq!(normalize_at(None, &ctx, now()), known(2024, 3, 3, 0, 0, 0));
    }

    #[test]
    fn test_implausible_year_falls_through() {
        let ctx = DateContext::with_url("https://example.com/2023/07/04/post");
        assert_eq!(normalize_at(Some("1970-01-01"), &ctx, now()), known(2023, 7, 4, 0, 0, 0));
        let far_future = (now() + Duration::days(800)).format("%Y-%m-%d").to_string();
        assert_eq!(
            normalize_at(Some(&far_future), &DateContext::default(), now()),
            NormalizedDate::Unknown
        );
    }

    #[test]
    fn test_serializes_as_canonical_string() {
        let json = serde_json::to_string(&known(2024, 5, 13, 10, 30, 0)).unwrap();
        assert_eq!(json, "\"2024-05-13T10:30:00Z\"");
        let json = serde_json::to_string(&NormalizedDate::Unknown).unwrap();
        assert_eq!(json, "\"Unknown\"");
    }
}

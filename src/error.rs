//! Error kinds shared across the crawler.
//!
//! Each failure the core can observe maps to exactly one variant. Callers
//! match on the kind rather than inspecting message strings.
//!
//! - [`ParseFailure`]: a date strategy rejected its candidate. Never escapes
//!   [`crate::dates::normalize`]; it is logged and turned into `Unknown`.
//! - [`CacheError`]: persistence and integrity problems in the content cache.
//! - [`CrawlError`]: network and decoding failures in the fetch layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single date candidate could not be turned into an instant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("no recognizable date in {0:?}")]
    Unrecognized(String),

    #[error("year {year} outside plausible range {min}..={max}")]
    ImplausibleYear { year: i32, min: i32, max: i32 },

    #[error("candidate resolves to the evaluation instant")]
    ResolvesToNow,

    #[error("candidate too long for free-text parsing ({0} chars)")]
    TooLong(usize),
}

/// Failures surfaced by the content cache.
///
/// None of these abort a run. A `Persistence` error switches the store into
/// degraded (memory only) mode and is reported through `stats()`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache persistence failure at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache index at {} is corrupt: {source}", path.display())]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache entry {key} is corrupt: {reason}")]
    CorruptEntry { key: String, reason: String },
}

impl CacheError {
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Failures from fetching and decoding a source.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CrawlError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

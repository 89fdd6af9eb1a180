//! HTTP fetching with a cache-first lookup and exponential backoff.
//!
//! # Architecture
//!
//! - [`FetchText`]: core trait, "give me the body of this URL"
//! - [`HttpFetch`]: `reqwest` implementation
//! - [`RetryFetch`]: decorator adding retries to any [`FetchText`]
//! - [`Fetcher`]: what sources use; consults the [`ContentCache`] before
//!   touching the network and stores successful bodies afterwards
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (timeouts, connection errors,
//!   HTTP 429 and 5xx)
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use crate::cache::{self, ContentCache};
use crate::config::FetchConfig;
use crate::error::CrawlError;
use crate::utils::truncate_for_log;
use rand::{rng, Rng};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Request headers that never influence the cache key.
const UNVARYING_HEADERS: &[&str] = &["authorization", "user-agent"];

/// Something that can turn a URL into a response body.
pub trait FetchText {
    /// Fetch `url` with extra request `headers`.
    async fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, CrawlError>;
}

/// Plain `reqwest` client, no retries.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new(config: &FetchConfig) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl FetchText for HttpFetch {
    #[instrument(level = "debug", skip(self, headers))]
    async fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, CrawlError> {
        let t0 = Instant::now();
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await?;
        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET ok"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchText`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..max_jitter)
/// ```
pub struct RetryFetch<T> {
    /// The wrapped fetcher.
    inner: T,
    /// Retries after the first attempt; only transient errors count.
    max_retries: usize,
    /// Delay before the first retry, doubled for each one after it.
    base_delay: StdDuration,
    /// Cap on the exponential delay, before jitter.
    max_delay: StdDuration,
    /// Upper bound of the random jitter added to each delay.
    max_jitter_ms: u64,
}

impl<T> RetryFetch<T>
where
    T: FetchText,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter_ms: 250,
        }
    }

    #[cfg(test)]
    pub fn with_max_jitter(mut self, jitter: StdDuration) -> Self {
        self.max_jitter_ms = jitter.as_millis() as u64;
        self
    }

    fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter_ms);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchText for RetryFetch<T>
where
    T: FetchText,
{
    #[instrument(level = "debug", skip(self, headers))]
    async fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, CrawlError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_text(url, headers).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() || attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch failed; giving up"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Cache-first fetcher handed to every source.
#[derive(Debug)]
pub struct Fetcher<T = RetryFetch<HttpFetch>> {
    inner: T,
    cache: Option<Arc<ContentCache>>,
}

impl Fetcher {
    /// Production fetcher: `reqwest` behind retries, optionally cached.
    pub fn http(config: &FetchConfig, cache: Option<Arc<ContentCache>>) -> Result<Self, CrawlError> {
        let http = HttpFetch::new(config)?;
        let retrying = RetryFetch::new(http, config.max_retries, StdDuration::from_secs(1));
        Ok(Self::new(retrying, cache))
    }
}

impl<T: FetchText> Fetcher<T> {
    pub fn new(inner: T, cache: Option<Arc<ContentCache>>) -> Self {
        Self { inner, cache }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &T {
        &self.inner
    }

    /// Body of `url`, from the cache when a live entry exists.
    ///
    /// Cache write failures are logged and otherwise ignored; the body is
    /// still returned.
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, CrawlError> {
        let Some(cache) = &self.cache else {
            return self.inner.fetch_text(url, headers).await;
        };

        let vary: Vec<(&str, &str)> = headers
            .iter()
            .filter(|(name, _)| {
                !UNVARYING_HEADERS
                    .iter()
                    .any(|h| name.eq_ignore_ascii_case(h))
            })
            .copied()
            .collect();
        let key = cache::fingerprint(url, &vary);

        if let Some(payload) = cache.get(&key) {
            debug!(url, "Cache hit");
            return Ok(String::from_utf8_lossy(&payload).into_owned());
        }

        let body = self.inner.fetch_text(url, headers).await?;
        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        if let Err(e) = cache.put(&key, body.as_bytes(), &domain) {
            warn!(url = %truncate_for_log(url, 120), error = %e, "Could not persist response");
        }
        Ok(body)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Serves canned bodies by URL and counts requests.
    #[derive(Debug, Default)]
    pub struct CannedFetch {
        bodies: HashMap<String, String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl CannedFetch {
        pub fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl FetchText for CannedFetch {
        async fn fetch_text(&self, url: &str, _headers: &[(&str, &str)]) -> Result<String, CrawlError> {
            self.calls.lock().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| CrawlError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    /// Fetcher that answers any URL starting with a registered prefix.
    #[derive(Debug, Default)]
    pub struct PrefixFetch {
        routes: Vec<(String, String)>,
        pub calls: Mutex<Vec<String>>,
    }

    impl PrefixFetch {
        pub fn route(mut self, prefix: &str, body: &str) -> Self {
            self.routes.push((prefix.to_string(), body.to_string()));
            self
        }
    }

    impl FetchText for PrefixFetch {
        async fn fetch_text(&self, url: &str, _headers: &[(&str, &str)]) -> Result<String, CrawlError> {
            self.calls.lock().push(url.to_string());
            self.routes
                .iter()
                .find(|(prefix, _)| url.starts_with(prefix.as_str()))
                .map(|(_, body)| body.clone())
                .ok_or_else(|| CrawlError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }
}

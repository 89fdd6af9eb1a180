//! Stable cache keys for outgoing requests.

use sha2::{Digest, Sha256};
use url::Url;

/// Canonical form of a request URL.
///
/// Scheme and host are lower-cased and default ports dropped (both by the
/// URL parser), the fragment is removed and query parameters are sorted.
/// Strings that do not parse as URLs are only trimmed.
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }
    url.to_string()
}

/// SHA-256 fingerprint of the canonical URL plus any request headers that
/// change the response (sorted, names case-insensitive).
pub fn fingerprint(url: &str, vary: &[(&str, &str)]) -> String {
    let mut headers: Vec<(String, &str)> = vary
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), *value))
        .collect();
    headers.sort();

    let mut hasher = Sha256::new();
    hasher.update(canonical_url(url).as_bytes());
    for (name, value) in headers {
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

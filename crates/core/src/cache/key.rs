//! Cache key derivation and URL canonicalization.
//!
//! Every code path that needs to know which cache entry an item maps to goes
//! through [`derive_cache_key`], so writers and the reference-counted cleanup
//! agree on identity.

use sha2::{Digest, Sha256};

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string for consistent caching and safety checks.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Reduce a page URL to the origin that owns its icon.
///
/// Pages on the same site share one icon unless they name their own, so the
/// path and query do not take part in identity.
pub fn normalize_source(page_url: &str) -> Result<String, UrlError> {
    let url = canonicalize(page_url)?;
    let host = url.host_str().ok_or_else(|| UrlError::InvalidUrl(format!("no host in {page_url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Derive the cache key for a page URL and an optional explicit icon URL.
///
/// Returns an empty string when the page URL cannot be normalized; callers
/// treat an empty key as "nothing cached".
pub fn derive_cache_key(page_url: &str, icon_url: Option<&str>) -> String {
    let Ok(source) = normalize_source(page_url) else {
        return String::new();
    };

    let icon = icon_url
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| canonicalize(s).ok())
        .map(|u| u.to_string())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\n");
    hasher.update(icon.as_bytes());
    hex::encode(hasher.finalize())
}

/// Candidate icon URLs for a page, in the order they should be tried.
///
/// An explicit icon URL comes first, followed by the conventional
/// `/favicon.ico` at the page origin.
pub fn favicon_candidates(page_url: &str, icon_url: Option<&str>) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(icon) = icon_url.and_then(|s| canonicalize(s).ok()) {
        candidates.push(icon.to_string());
    }

    if let Ok(origin) = normalize_source(page_url) {
        let fallback = format!("{origin}/favicon.ico");
        if !candidates.contains(&fallback) {
            candidates.push(fallback);
        }
    }

    candidates
}

//! icon_lookup tool implementation.
//!
//! Resolves the icon for a page through the cache, downloading it on a miss
//! or when the cached copy is stale.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use iconcache_core::{Error, IconCache, derive_cache_key};

use super::{json_result, rfc3339};

/// Input parameters for icon_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IconLookupParams {
    /// Page URL whose icon is wanted.
    pub url: String,

    /// Explicit icon URL declared by the page, if known.
    #[serde(default)]
    pub icon: Option<String>,
}

/// Output structure for icon_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IconLookupOutput {
    /// Cache key derived from the page origin and icon URL.
    pub cache_key: String,
    /// Whether an icon is available.
    pub found: bool,
    /// Icon size in bytes.
    pub size: Option<u64>,
    /// URL the icon bytes were downloaded from.
    pub source_url: Option<String>,
    /// ISO8601 timestamp of when the icon was cached.
    pub cached_at: Option<String>,
    /// Whether the icon has outlived the current TTL.
    pub stale: bool,
}

/// Implementation of the icon_lookup tool.
pub async fn lookup_impl(cache: &IconCache, params: IconLookupParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let cache_key = derive_cache_key(&params.url, params.icon.as_deref());
    if cache_key.is_empty() {
        return Err(Error::InvalidUrl(params.url).into());
    }

    let output = match cache.resolve(&params.url, params.icon.as_deref()).await {
        Some(entry) => IconLookupOutput {
            stale: cache.is_stale(&entry).await,
            cache_key,
            found: true,
            size: Some(entry.size),
            source_url: Some(entry.source_url).filter(|url| !url.is_empty()),
            cached_at: rfc3339(entry.cached_at),
        },
        None => IconLookupOutput { cache_key, found: false, size: None, source_url: None, cached_at: None, stale: false },
    };

    json_result(&output)
}

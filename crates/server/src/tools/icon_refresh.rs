//! icon_refresh tool implementation.
//!
//! Re-downloads a cached icon from a list of candidate URLs.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use iconcache_core::{Error, IconCache};

use super::json_result;

/// Input parameters for icon_refresh tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IconRefreshParams {
    /// Cache key of the icon to refresh.
    pub cache_key: String,

    /// Candidate URLs, tried in order. Empty means the entry's own source URL.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Output structure for icon_refresh tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IconRefreshOutput {
    /// Whether a new copy was downloaded and stored.
    pub refreshed: bool,
}

/// Implementation of the icon_refresh tool.
pub async fn refresh_impl(cache: &IconCache, params: IconRefreshParams) -> Result<CallToolResult, McpError> {
    if params.cache_key.is_empty() {
        return Err(Error::InvalidInput("cache_key cannot be empty".into()).into());
    }

    let refreshed = cache.refresh_icon(&params.cache_key, &params.urls).await;
    json_result(&IconRefreshOutput { refreshed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::parse_output;
    use iconcache_core::CacheOptions;

    #[tokio::test]
    async fn test_refresh_empty_key() {
        let cache = IconCache::builder(CacheOptions::in_memory()).build();
        let params = IconRefreshParams { cache_key: String::new(), urls: Vec::new() };
        assert!(refresh_impl(&cache, params).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_without_fetcher() {
        let cache = IconCache::builder(CacheOptions::in_memory()).build();
        let params = IconRefreshParams { cache_key: "abc".into(), urls: vec!["https://example.com/i.png".into()] };

        let result = refresh_impl(&cache, params).await.unwrap();
        let output: IconRefreshOutput = parse_output(&result);
        assert!(!output.refreshed);
    }
}

//! cache_purge tool implementation.
//!
//! Deletes one icon by key, or clears the whole cache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use iconcache_core::{Error, IconCache};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete the icon stored under this key.
    #[serde(default)]
    pub cache_key: Option<String>,

    /// Delete every icon and forget recorded lookup failures.
    #[serde(default)]
    pub all: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &IconCache, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = match (params.all, params.cache_key.as_deref()) {
        (true, _) => {
            let before = cache.get_stats().await.entry_count;
            if !cache.clear().await {
                return Err(Error::Store("failed to clear icon cache".into()).into());
            }
            before
        }
        (false, Some(key)) if !key.is_empty() => u64::from(cache.delete(key).await),
        _ => {
            return Err(Error::InvalidInput("Either cache_key or all=true must be specified".to_string()).into());
        }
    };

    json_result(&CachePurgeOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::parse_output;
    use iconcache_core::CacheOptions;

    async fn seeded() -> IconCache {
        let cache = IconCache::builder(CacheOptions::in_memory()).build();
        assert!(cache.set("a", vec![1u8; 64], None).await);
        assert!(cache.set("b", vec![2u8; 64], None).await);
        cache
    }

    #[tokio::test]
    async fn test_purge_one_key() {
        let cache = seeded().await;
        let params = CachePurgeParams { cache_key: Some("a".into()), all: false };

        let result = purge_impl(&cache, params).await.unwrap();
        let output: CachePurgeOutput = parse_output(&result);
        assert_eq!(output.deleted, 1);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test]
    async fn test_purge_all() {
        let cache = seeded().await;
        let params = CachePurgeParams { cache_key: None, all: true };

        let result = purge_impl(&cache, params).await.unwrap();
        let output: CachePurgeOutput = parse_output(&result);
        assert_eq!(output.deleted, 2);
        assert_eq!(cache.get_stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_purge_missing_key() {
        let cache = seeded().await;
        let params = CachePurgeParams { cache_key: Some("zzz".into()), all: false };

        let result = purge_impl(&cache, params).await.unwrap();
        let output: CachePurgeOutput = parse_output(&result);
        assert_eq!(output.deleted, 0);
    }

    #[tokio::test]
    async fn test_purge_no_params() {
        let cache = seeded().await;
        let params = CachePurgeParams { cache_key: None, all: false };

        let result = purge_impl(&cache, params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_purge_all_reports_store_failure() {
        let cache = seeded().await;
        cache.destroy().await;
        let params = CachePurgeParams { cache_key: None, all: true };

        let err = purge_impl(&cache, params).await.unwrap_err();
        assert_eq!(err.code.0, -32002);
    }
}

//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use iconcache_core::IconCache;

use crate::tools::json_result;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    /// Sum of all icon sizes in bytes.
    pub total_size: u64,
    /// Number of cached icons.
    pub entry_count: u64,
    /// Whether the cache is refusing reads and writes.
    pub degraded: bool,
    /// Current TTL policy ("7d", "30d" or "permanent").
    pub ttl: String,
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(cache: &IconCache) -> Result<CallToolResult, McpError> {
    let stats = cache.get_stats().await;
    let output = CacheStatsOutput {
        total_size: stats.total_size,
        entry_count: stats.entry_count,
        degraded: cache.is_degraded(),
        ttl: cache.get_ttl().await.to_string(),
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::parse_output;
    use iconcache_core::CacheOptions;

    #[tokio::test]
    async fn test_stats_counts_entries() {
        let cache = IconCache::builder(CacheOptions::in_memory()).build();
        assert!(cache.set("a", vec![1u8; 40], None).await);
        assert!(cache.set("b", vec![2u8; 60], None).await);

        let result = stats_impl(&cache).await.unwrap();
        let output: CacheStatsOutput = parse_output(&result);
        assert_eq!(output.entry_count, 2);
        assert_eq!(output.total_size, 100);
        assert!(!output.degraded);
        assert_eq!(output.ttl, "7d");
    }
}

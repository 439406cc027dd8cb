//! cache_ttl tool implementation.
//!
//! Reads the TTL policy, or sets it when a value is given.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use iconcache_core::{Error, IconCache, TtlPolicy};

use crate::tools::json_result;

/// Parameters for the cache_ttl tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheTtlParams {
    /// New policy: "7d", "30d" or "permanent". Omit to read the current one.
    #[serde(default)]
    pub ttl: Option<String>,
}

/// Output from the cache_ttl tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheTtlOutput {
    /// Policy in effect after the call.
    pub ttl: String,
    /// Whether the call changed the stored policy.
    pub updated: bool,
}

/// Implementation of the cache_ttl tool.
pub async fn ttl_impl(cache: &IconCache, params: CacheTtlParams) -> Result<CallToolResult, McpError> {
    let updated = match params.ttl.as_deref() {
        Some(raw) => {
            let policy: TtlPolicy = raw.parse().map_err(Error::InvalidInput)?;
            if !cache.set_ttl(policy).await {
                return Err(Error::Settings("failed to persist ttl".into()).into());
            }
            true
        }
        None => false,
    };

    let output = CacheTtlOutput { ttl: cache.get_ttl().await.to_string(), updated };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::parse_output;
    use iconcache_core::CacheOptions;

    #[tokio::test]
    async fn test_read_default_ttl() {
        let cache = IconCache::builder(CacheOptions::in_memory()).build();
        let result = ttl_impl(&cache, CacheTtlParams { ttl: None }).await.unwrap();
        let output: CacheTtlOutput = parse_output(&result);
        assert_eq!(output.ttl, "7d");
        assert!(!output.updated);
    }

    #[tokio::test]
    async fn test_set_ttl() {
        let cache = IconCache::builder(CacheOptions::in_memory()).build();
        let result = ttl_impl(&cache, CacheTtlParams { ttl: Some("permanent".into()) }).await.unwrap();
        let output: CacheTtlOutput = parse_output(&result);
        assert_eq!(output.ttl, "permanent");
        assert!(output.updated);
        assert_eq!(cache.get_ttl().await, TtlPolicy::Permanent);
    }

    #[tokio::test]
    async fn test_rejects_unknown_ttl() {
        let cache = IconCache::builder(CacheOptions::in_memory()).build();
        let err = ttl_impl(&cache, CacheTtlParams { ttl: Some("1y".into()) }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}

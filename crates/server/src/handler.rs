//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the icon cache.
use crate::tools::cache::{CachePurgeParams, CacheTtlParams, purge_impl, stats_impl, ttl_impl};
use crate::tools::{IconLookupParams, IconRefreshParams, lookup_impl, refresh_impl};

use iconcache_core::IconCache;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for iconcache.
#[derive(Clone)]
pub struct IconCacheServer {
    cache: IconCache,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl IconCacheServer {
    /// Create a new server handler backed by the given cache.
    pub fn new(cache: IconCache) -> Self {
        Self { cache, tool_router: Self::tool_router() }
    }

    /// Look up the icon for a page, downloading it on a miss.
    #[tool(
        description = "Look up the cached icon for a page URL. Downloads it when missing or stale. Returns the cache key, size, source URL and staleness."
    )]
    async fn icon_lookup(&self, params: Parameters<IconLookupParams>) -> Result<CallToolResult, McpError> {
        lookup_impl(&self.cache, params.0).await
    }

    #[tool(description = "Re-download a cached icon from candidate URLs. The first URL that yields a valid image wins.")]
    async fn icon_refresh(&self, params: Parameters<IconRefreshParams>) -> Result<CallToolResult, McpError> {
        refresh_impl(&self.cache, params.0).await
    }

    #[tool(description = "Get icon cache statistics: total size, entry count, degraded state and TTL policy.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.cache).await
    }

    /// Delete one icon or clear the cache.
    ///
    /// Either a `cache_key` or `all: true` must be given.
    #[tool(description = "Delete a cached icon by cache_key, or clear the whole cache with all=true.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, params.0).await
    }

    #[tool(description = "Read or set the icon cache TTL policy: 7d, 30d or permanent.")]
    async fn cache_ttl(&self, params: Parameters<CacheTtlParams>) -> Result<CallToolResult, McpError> {
        ttl_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for IconCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "iconcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iconcache_core::CacheOptions;

    #[tokio::test]
    async fn test_registers_all_tools() {
        let server = IconCacheServer::new(IconCache::builder(CacheOptions::in_memory()).build());
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, ["cache_purge", "cache_stats", "cache_ttl", "icon_lookup", "icon_refresh"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = IconCacheServer::new(IconCache::builder(CacheOptions::in_memory()).build());
        assert_eq!(server.get_info().server_info.name, "iconcache");
    }
}

//! MCP tool implementations.
//!
//! This module contains all tools exposed by the iconcache server.

pub mod cache;
pub mod icon_lookup;
pub mod icon_refresh;

pub use icon_lookup::{IconLookupParams, lookup_impl};
pub use icon_refresh::{IconRefreshParams, refresh_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use iconcache_core::Error;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Millisecond timestamp as RFC 3339, if representable.
pub(crate) fn rfc3339(ms: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(ms).map(|t| t.to_rfc3339())
}

//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and maintaining the icon cache.

pub mod purge;
pub mod stats;
pub mod ttl;

pub use purge::{CachePurgeParams, purge_impl};
pub use stats::stats_impl;
pub use ttl::{CacheTtlParams, ttl_impl};

//! Core types and shared functionality for iconcache.
//!
//! This crate provides:
//! - A persistent, bounded icon cache with an SQLite backend
//! - TTL policy, negative cache and degraded-mode circuit breaker
//! - Reference-counted cleanup driven by an external item collection
//! - Unified error types
//! - Configuration structures

pub mod background;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod lifecycle;
pub mod manager;
pub mod negative;
pub mod ttl;

pub use cache::{CacheDb, CacheEntry, CacheStats, derive_cache_key};
pub use error::Error;
pub use fetcher::{FetchedIcon, IconFetcher};
pub use lifecycle::{ItemCollection, ItemEvent, ItemRegistry, Subscription, TrackedItem};
pub use manager::{CacheOptions, IconCache, IconCacheBuilder};
pub use ttl::TtlPolicy;

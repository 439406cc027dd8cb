//! SQLite-backed storage for cached icons.
//!
//! This module provides the persistent half of the icon cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Keyed icon entries with access-time and insertion-time indices
//! - Versioned schema migrations (destructive across the v2 boundary)
//! - WAL mode for concurrent access
//! - LRU eviction against size and count bounds
//! - A startup corruption scan
//! - A small settings table

pub mod connection;
pub mod entries;
pub mod eviction;
pub mod key;
pub mod migrations;
pub mod repair;
pub mod settings;

pub use crate::Error;

pub use connection::{CacheDb, ConnectionSlot, StoreLocation};
pub use entries::{CacheEntry, CacheStats, Corruption, MIN_PLAUSIBLE_SIZE};
pub use eviction::{CacheLimits, EVICTION_BATCH, EvictionReport, MAX_ENTRIES, MAX_SINGLE_SIZE, MAX_TOTAL_SIZE};
pub use key::{UrlError, canonicalize, derive_cache_key, favicon_candidates};
pub use repair::RepairReport;
pub use settings::SettingsStore;

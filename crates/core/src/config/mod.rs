//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ICONCACHE_*)
//! 2. TOML config file (if ICONCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::eviction::{EVICTION_BATCH, MAX_ENTRIES, MAX_SINGLE_SIZE, MAX_TOTAL_SIZE};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ICONCACHE_*)
/// 2. TOML config file (if ICONCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite icon database.
    ///
    /// Set via ICONCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for icon downloads.
    ///
    /// Set via ICONCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via ICONCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Eviction target for the sum of all blob sizes.
    #[serde(default = "default_max_total_size")]
    pub max_total_size: u64,

    /// Eviction target for the number of entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Largest blob accepted by a single write.
    ///
    /// Also caps the bytes read from a single download.
    #[serde(default = "default_max_single_size")]
    pub max_single_size: usize,

    /// Most entries removed by one eviction pass.
    #[serde(default = "default_eviction_batch")]
    pub eviction_batch: usize,

    /// How long a failed lookup is remembered.
    #[serde(default = "default_negative_cache_ttl_secs")]
    pub negative_cache_ttl_secs: u64,

    /// Most failed lookups remembered at once.
    #[serde(default = "default_negative_cache_max")]
    pub negative_cache_max: usize,

    /// Delay between an item's deletion and the first reference check.
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,

    /// Delay between the first and the final reference check.
    #[serde(default = "default_cleanup_recheck_ms")]
    pub cleanup_recheck_ms: u64,

    /// Seconds a degraded cache waits before letting a probe through.
    #[serde(default = "default_degraded_cooldown_secs")]
    pub degraded_cooldown_secs: u64,

    /// Allow downloads from private and loopback addresses.
    ///
    /// Set via ICONCACHE_ALLOW_PRIVATE_HOSTS environment variable.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./iconcache.sqlite")
}

fn default_user_agent() -> String {
    "iconcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_total_size() -> u64 {
    MAX_TOTAL_SIZE
}

fn default_max_entries() -> u64 {
    MAX_ENTRIES
}

fn default_max_single_size() -> usize {
    MAX_SINGLE_SIZE
}

fn default_eviction_batch() -> usize {
    EVICTION_BATCH
}

fn default_negative_cache_ttl_secs() -> u64 {
    86_400 // 24h
}

fn default_negative_cache_max() -> usize {
    200
}

fn default_cleanup_grace_ms() -> u64 {
    5_000
}

fn default_cleanup_recheck_ms() -> u64 {
    250
}

fn default_degraded_cooldown_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_total_size: default_max_total_size(),
            max_entries: default_max_entries(),
            max_single_size: default_max_single_size(),
            eviction_batch: default_eviction_batch(),
            negative_cache_ttl_secs: default_negative_cache_ttl_secs(),
            negative_cache_max: default_negative_cache_max(),
            cleanup_grace_ms: default_cleanup_grace_ms(),
            cleanup_recheck_ms: default_cleanup_recheck_ms(),
            degraded_cooldown_secs: default_degraded_cooldown_secs(),
            allow_private_hosts: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn negative_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_cache_ttl_secs)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    pub fn cleanup_recheck(&self) -> Duration {
        Duration::from_millis(self.cleanup_recheck_ms)
    }

    pub fn degraded_cooldown(&self) -> Duration {
        Duration::from_secs(self.degraded_cooldown_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ICONCACHE_`
    /// 2. TOML file from `ICONCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ICONCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ICONCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

const MAX_SINGLE_SIZE_CEILING: usize = 50 * 1024 * 1024;
const MAX_CLEANUP_GRACE_MS: u64 = 10 * 60 * 1000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_single_size` is 0, exceeds 50MB, or exceeds `max_total_size`
    /// - `max_entries`, `eviction_batch` or `negative_cache_max` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `cleanup_grace_ms` exceeds 10 minutes
    /// - `degraded_cooldown_secs` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_single_size == 0 {
            return Err(invalid("max_single_size", "must be greater than 0"));
        }
        if self.max_single_size > MAX_SINGLE_SIZE_CEILING {
            return Err(invalid("max_single_size", "must not exceed 50MB"));
        }
        if self.max_single_size as u64 > self.max_total_size {
            return Err(invalid("max_single_size", "must not exceed max_total_size"));
        }

        if self.max_entries == 0 {
            return Err(invalid("max_entries", "must be greater than 0"));
        }
        if self.eviction_batch == 0 {
            return Err(invalid("eviction_batch", "must be greater than 0"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.negative_cache_max == 0 {
            return Err(invalid("negative_cache_max", "must be greater than 0"));
        }

        if self.cleanup_grace_ms > MAX_CLEANUP_GRACE_MS {
            return Err(invalid("cleanup_grace_ms", "must not exceed 10 minutes (600000ms)"));
        }

        if self.degraded_cooldown_secs == 0 {
            return Err(invalid("degraded_cooldown_secs", "must be greater than 0"));
        }

        if self.allow_private_hosts {
            tracing::warn!("allow_private_hosts is set; icon downloads may reach internal addresses");
        }

        Ok(())
    }
}

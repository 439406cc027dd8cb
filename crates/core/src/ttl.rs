//! Expiry policy shared by every cache entry.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings key the policy is persisted under.
pub const TTL_SETTING_KEY: &str = "icon_cache_ttl";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Stored value of [`TtlPolicy::Permanent`].
pub const PERMANENT_SENTINEL: i64 = -1;

/// How long a cached icon stays fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TtlPolicy {
    #[default]
    SevenDays,
    ThirtyDays,
    /// Entries never go stale.
    Permanent,
}

impl TtlPolicy {
    pub const ALL: [TtlPolicy; 3] = [TtlPolicy::SevenDays, TtlPolicy::ThirtyDays, TtlPolicy::Permanent];

    /// Persisted representation in milliseconds.
    pub fn as_millis(self) -> i64 {
        match self {
            TtlPolicy::SevenDays => 7 * DAY_MS,
            TtlPolicy::ThirtyDays => 30 * DAY_MS,
            TtlPolicy::Permanent => PERMANENT_SENTINEL,
        }
    }

    /// Parse a persisted value. Anything outside the enumeration is rejected.
    pub fn from_millis(ms: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|policy| policy.as_millis() == ms)
    }

    /// Read a policy out of a settings record, if it holds a valid one.
    pub fn from_setting(value: &serde_json::Value) -> Option<Self> {
        value.as_i64().and_then(Self::from_millis)
    }

    pub fn duration(self) -> Option<Duration> {
        match self {
            TtlPolicy::Permanent => None,
            other => Some(Duration::from_millis(other.as_millis() as u64)),
        }
    }

    /// Whether an entry cached at `cached_at` is stale at `now` (both ms).
    ///
    /// Entries without a valid timestamp are always stale, even under
    /// [`TtlPolicy::Permanent`].
    pub fn is_stale_at(self, cached_at: i64, now: i64) -> bool {
        if cached_at <= 0 {
            return true;
        }
        match self {
            TtlPolicy::Permanent => false,
            other => now - cached_at > other.as_millis(),
        }
    }
}

impl fmt::Display for TtlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtlPolicy::SevenDays => write!(f, "7d"),
            TtlPolicy::ThirtyDays => write!(f, "30d"),
            TtlPolicy::Permanent => write!(f, "permanent"),
        }
    }
}

impl FromStr for TtlPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7d" | "seven_days" => Ok(TtlPolicy::SevenDays),
            "30d" | "thirty_days" => Ok(TtlPolicy::ThirtyDays),
            "permanent" | "never" => Ok(TtlPolicy::Permanent),
            other => Err(format!("unknown ttl '{other}', expected 7d, 30d, or permanent")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_millis_round_trip() {
        for policy in TtlPolicy::ALL {
            assert_eq!(TtlPolicy::from_millis(policy.as_millis()), Some(policy));
        }
        assert_eq!(TtlPolicy::from_millis(12_345), None);
        assert_eq!(TtlPolicy::from_millis(0), None);
    }

    #[test]
    fn test_from_setting_validates() {
        assert_eq!(TtlPolicy::from_setting(&json!(2_592_000_000i64)), Some(TtlPolicy::ThirtyDays));
        assert_eq!(TtlPolicy::from_setting(&json!(-1)), Some(TtlPolicy::Permanent));
        assert_eq!(TtlPolicy::from_setting(&json!("7d")), None);
        assert_eq!(TtlPolicy::from_setting(&json!(1)), None);
    }

    #[test]
    fn test_finite_staleness_boundary() {
        let ttl = TtlPolicy::SevenDays;
        let cached_at = 1_000_000;
        let limit = ttl.as_millis();
        assert!(!ttl.is_stale_at(cached_at, cached_at + limit));
        assert!(ttl.is_stale_at(cached_at, cached_at + limit + 1));
        assert!(!TtlPolicy::ThirtyDays.is_stale_at(cached_at, cached_at + limit + 1));
    }

    #[test]
    fn test_permanent_never_stale() {
        let now = 10 * 365 * DAY_MS;
        assert!(!TtlPolicy::Permanent.is_stale_at(1, now));
        assert!(TtlPolicy::Permanent.duration().is_none());
    }

    #[test]
    fn test_missing_timestamp_is_stale() {
        assert!(TtlPolicy::SevenDays.is_stale_at(0, 1));
        assert!(TtlPolicy::SevenDays.is_stale_at(-5, 1));
        assert!(TtlPolicy::Permanent.is_stale_at(0, 1));
    }

    #[test]
    fn test_parse_and_display() {
        for policy in TtlPolicy::ALL {
            assert_eq!(policy.to_string().parse::<TtlPolicy>().unwrap(), policy);
        }
        assert!("forever-ish".parse::<TtlPolicy>().is_err());
        assert_eq!(TtlPolicy::default(), TtlPolicy::SevenDays);
    }
}

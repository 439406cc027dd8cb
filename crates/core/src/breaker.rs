//! Failure counter that puts the cache into degraded mode.
//!
//! Two independent causes: a failed `init()` (latched until a later init
//! succeeds) and consecutive store errors on get/set (cleared by the next
//! success). Once tripped by store errors, the breaker lets a single probe
//! through after `cooldown` so a healthy store can reset it. A zero cooldown
//! admits no probe: the breaker stays tripped until a success is recorded
//! elsewhere (a successful init or `clear`).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Consecutive store failures that trip the breaker.
pub const DEGRADED_THRESHOLD: u32 = 3;

/// Time a tripped breaker waits before admitting a probe.
pub const DEGRADED_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct CircuitBreaker {
    failures: AtomicU32,
    init_failed: AtomicBool,
    tripped_at: Mutex<Option<Instant>>,
    threshold: u32,
    cooldown: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEGRADED_THRESHOLD, DEGRADED_COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            failures: AtomicU32::new(0),
            init_failed: AtomicBool::new(false),
            tripped_at: Mutex::new(None),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn is_degraded(&self) -> bool {
        if self.init_failed.load(Ordering::Acquire) {
            return true;
        }
        if self.failures.load(Ordering::Acquire) < self.threshold {
            return false;
        }
        match *self.tripped() {
            Some(_) if self.cooldown.is_zero() => true,
            Some(at) => at.elapsed() < self.cooldown,
            None => true,
        }
    }

    /// Count a store-level failure. Returns the new consecutive count.
    pub fn record_failure(&self) -> u32 {
        let count = self.failures.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if count >= self.threshold {
            *self.tripped() = Some(Instant::now());
            if count == self.threshold {
                tracing::warn!(failures = count, "icon cache entering degraded mode");
            }
        }
        count
    }

    pub fn record_success(&self) {
        let previous = self.failures.swap(0, Ordering::AcqRel);
        if previous >= self.threshold {
            tracing::info!("icon cache recovered from degraded mode");
        }
        *self.tripped() = None;
    }

    pub fn mark_init_failed(&self) {
        self.init_failed.store(true, Ordering::Release);
    }

    /// A successful init clears the latch and the failure count.
    pub fn mark_init_succeeded(&self) {
        self.init_failed.store(false, Ordering::Release);
        self.record_success();
    }

    pub fn init_failed(&self) -> bool {
        self.init_failed.load(Ordering::Acquire)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    fn tripped(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.tripped_at.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_at_threshold() {
        let breaker = CircuitBreaker::default();
        assert!(!breaker.is_degraded());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_degraded());
        assert_eq!(breaker.record_failure(), 3);
        assert!(breaker.is_degraded());
    }

    #[test]
    fn test_success_resets_counter() {
        let breaker = CircuitBreaker::default();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failures(), 0);
        breaker.record_failure();
        assert!(!breaker.is_degraded());
    }

    #[test]
    fn test_init_failure_latches() {
        let breaker = CircuitBreaker::default();
        breaker.mark_init_failed();
        assert!(breaker.is_degraded());
        breaker.record_success();
        assert!(breaker.is_degraded());

        breaker.mark_init_succeeded();
        assert!(!breaker.is_degraded());
        assert!(!breaker.init_failed());
    }

    #[test]
    fn test_probe_after_cooldown() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(20));
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(breaker.is_degraded());
        std::thread::sleep(Duration::from_millis(40));
        assert!(!breaker.is_degraded());

        breaker.record_failure();
        assert!(breaker.is_degraded());
    }

    #[test]
    fn test_zero_cooldown_stays_tripped() {
        let breaker = CircuitBreaker::new(3, Duration::ZERO);
        for _ in 0..5 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.is_degraded());

        breaker.record_success();
        assert!(!breaker.is_degraded());
    }
}

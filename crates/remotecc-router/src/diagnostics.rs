//! Runtime diagnostics switch and output throttling
//!
//! Diagnostics never change protocol behavior. They decide whether dropped
//! frames and control values are reported, and how often.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Lets one emission through per interval
#[derive(Debug, Clone)]
pub struct DebugThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl DebugThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true and records `now` if the interval has elapsed
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Debug mode flag plus the throttles for per-frame diagnostics
#[derive(Debug)]
pub struct Diagnostics {
    enabled: AtomicBool,
    throttle: Mutex<DebugThrottle>,
    failures: Mutex<DebugThrottle>,
}

impl Diagnostics {
    pub fn new(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            throttle: Mutex::new(DebugThrottle::new(interval)),
            failures: Mutex::new(DebugThrottle::new(interval)),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip debug mode, returning the new value
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.throttle.lock().interval()
    }

    /// Whether a throttled diagnostic line may be emitted now
    pub fn should_emit(&self) -> bool {
        self.enabled() && self.throttle.lock().ready(Instant::now())
    }

    /// Whether a dropped-frame warning may be emitted now. Throttled
    /// separately so failures never hide control-value lines.
    pub fn should_report_failure(&self) -> bool {
        self.enabled() && self.failures.lock().ready(Instant::now())
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(false, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_interval() {
        let mut throttle = DebugThrottle::new(Duration::from_secs(2));
        let start = Instant::now();

        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(500)));
        assert!(!throttle.ready(start + Duration::from_millis(1999)));
        assert!(throttle.ready(start + Duration::from_secs(2)));
        assert!(!throttle.ready(start + Duration::from_millis(3000)));
    }

    #[test]
    fn test_disabled_never_emits() {
        let diagnostics = Diagnostics::new(false, Duration::from_millis(1));
        assert!(!diagnostics.should_emit());
    }

    #[test]
    fn test_failure_reports_throttled_independently() {
        let diagnostics = Diagnostics::new(true, Duration::from_secs(60));
        assert!(diagnostics.should_emit());
        assert!(diagnostics.should_report_failure());
        assert!(!diagnostics.should_report_failure());
        assert!(!diagnostics.should_emit());

        let quiet = Diagnostics::new(false, Duration::from_millis(1));
        assert!(!quiet.should_report_failure());
    }

    #[test]
    fn test_toggle() {
        let diagnostics = Diagnostics::default();
        assert!(diagnostics.toggle());
        assert!(diagnostics.enabled());
        assert!(diagnostics.should_emit());
        assert!(!diagnostics.should_emit());
        assert!(!diagnostics.toggle());
        assert!(!diagnostics.enabled());
    }
}

//! Reference clock seam.
//!
//! The store stamps accepted states from a [`ReferenceClock`], never from a
//! proposer's local clock. Viewers estimate their offset against the same
//! source through the probe loop in `cowatch-client`.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared reference time source.
pub trait ReferenceClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reference clock backed by the host's system time.
///
/// Correct wherever the store runs on an NTP-disciplined host; the per-viewer
/// offset estimation makes no assumption about viewer clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemReferenceClock;

impl ReferenceClock for SystemReferenceClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven reference clock for deterministic tests and simulations.
#[derive(Clone)]
pub struct ManualReferenceClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualReferenceClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl ReferenceClock for ManualReferenceClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualReferenceClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::seconds(5));
        assert_eq!(clock.now(), start + TimeDelta::seconds(5));

        let later = start + TimeDelta::minutes(1);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}

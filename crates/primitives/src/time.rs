//! Time source abstraction.
//!
//! Staleness and expiry decisions read the current time through [`Clock`] so
//! that tests can drive them deterministically.

use std::time::{SystemTime, UNIX_EPOCH};

use auto_impl::auto_impl;

/// Milliseconds since the unix epoch.
pub type UnixMillis = u64;

/// Source of the current wall-clock time.
#[auto_impl(&, Box, Arc)]
pub trait Clock: Send + Sync + core::fmt::Debug {
    /// Current time in unix milliseconds.
    fn now(&self) -> UnixMillis;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixMillis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// Manually advanced clock for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: parking_lot::Mutex<UnixMillis>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Clock starting at `now`.
    pub fn new(now: UnixMillis) -> Self {
        Self {
            now: parking_lot::Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: std::time::Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let mut now = self.now.lock();
        *now = now.saturating_add(by);
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, to: UnixMillis) {
        *self.now.lock() = to;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now(&self) -> UnixMillis {
        *self.now.lock()
    }
}

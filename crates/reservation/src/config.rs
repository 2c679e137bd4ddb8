use std::time::Duration;

use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RESERVATION_TTL, DEFAULT_SWEEP_INTERVAL};

/// Reservation engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationConfig {
    /// Lifetime of a reservation when the batch does not override it.
    pub default_ttl: Duration,
    /// Attempts for a transaction that keeps conflicting.
    pub max_attempts: u32,
    /// Interval between expiry sweeps.
    pub sweep_interval: Duration,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_RESERVATION_TTL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

//! Reservation engine defaults.

use std::time::Duration;

/// Lifetime of a reservation that is neither committed nor rolled back.
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(86_400);

/// Attempts for a reservation transaction that keeps conflicting.
pub const DEFAULT_MAX_ATTEMPTS: u32 = boson_storage::DEFAULT_TRANSACTION_ATTEMPTS;

/// Interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

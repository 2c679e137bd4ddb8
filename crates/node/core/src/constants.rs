//! Constants used throughout the Boson node.

pub use boson_reservation::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RESERVATION_TTL, DEFAULT_SWEEP_INTERVAL,
};
pub use boson_usage::constants::DEFAULT_STALENESS_THRESHOLD;

// =============================================================================
// Metrics
// =============================================================================

/// Default bind address for the metrics endpoint.
pub const DEFAULT_METRICS_ADDR: &str = "127.0.0.1";

/// Default port for the metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9464;

// =============================================================================
// Shutdown
// =============================================================================

/// How long background tasks get to finish after shutdown is signaled.
pub const DEFAULT_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

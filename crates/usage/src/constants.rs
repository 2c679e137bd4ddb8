//! Usage ledger defaults.

use std::time::Duration;

/// Age after which an instance's usage report no longer admits reservations.
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(60);

use std::time::Duration;

use crate::constants::DEFAULT_STALENESS_THRESHOLD;

/// Usage ledger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageConfig {
    /// Maximum age of an instance report before its resource is stale.
    pub staleness_threshold: Duration,
    /// Admissions allowed against a usage document between two reports.
    /// `None` disables the countdown.
    pub refresh_after: Option<u32>,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            refresh_after: None,
        }
    }
}

//! Usage ledger CLI arguments.

use std::time::Duration;

use clap::Args;

/// Usage ledger overrides.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq)]
#[command(next_help_heading = "Usage")]
pub struct UsageArgs {
    /// Age after which an instance's usage report is stale (e.g. "60s").
    #[arg(long = "usage.staleness-threshold", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub staleness_threshold: Option<Duration>,

    /// Admissions allowed against a usage record before the owning
    /// instances must report again.
    #[arg(long = "usage.refresh-after", value_name = "COUNT")]
    pub refresh_after: Option<u32>,
}

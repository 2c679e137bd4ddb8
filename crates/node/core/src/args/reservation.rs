//! Reservation engine CLI arguments.

use std::time::Duration;

use clap::Args;

/// Reservation engine overrides.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq)]
#[command(next_help_heading = "Reservations")]
pub struct ReservationArgs {
    /// Lifetime of a reservation that is not committed or rolled back (e.g. "1day").
    #[arg(long = "reservations.ttl", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub ttl: Option<Duration>,

    /// Interval between expiry sweeps (e.g. "30s").
    #[arg(long = "reservations.sweep-interval", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub sweep_interval: Option<Duration>,

    /// Attempts for a transaction that keeps conflicting with concurrent writers.
    #[arg(long = "reservations.max-attempts", value_name = "COUNT")]
    pub max_attempts: Option<u32>,
}

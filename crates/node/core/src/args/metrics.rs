//! Metrics endpoint CLI arguments.

use std::net::IpAddr;

use clap::Args;

/// Metrics endpoint overrides.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq)]
#[command(next_help_heading = "Metrics")]
pub struct MetricsArgs {
    /// Enable the Prometheus metrics endpoint.
    #[arg(long = "metrics")]
    pub enabled: bool,

    /// Metrics listen address.
    #[arg(long = "metrics.addr", value_name = "ADDR")]
    pub addr: Option<IpAddr>,

    /// Metrics listen port.
    #[arg(long = "metrics.port", value_name = "PORT")]
    pub port: Option<u16>,
}

//! Node configuration file.
//!
//! ```toml
//! [usage]
//! staleness_threshold = "1m"
//! refresh_after = 100
//!
//! [reservations]
//! ttl = "1day"
//! sweep_interval = "30s"
//! max_attempts = 5
//!
//! [metrics]
//! enabled = true
//! addr = "127.0.0.1"
//! port = 9464
//! ```
//!
//! Every key is optional. Command line arguments override the file.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use boson_reservation::ReservationConfig;
use boson_usage::UsageConfig;
use eyre::{Result, WrapErr, ensure};
use serde::{Deserialize, Serialize};

use crate::args::{MetricsArgs, ReservationArgs, UsageArgs};
use crate::constants::*;

/// Configuration of a Boson node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BosonConfig {
    pub usage: UsageSection,
    pub reservations: ReservationSection,
    pub metrics: MetricsSection,
}

/// `[usage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsageSection {
    /// Age after which an instance's usage report is stale.
    #[serde(with = "crate::duration")]
    pub staleness_threshold: Duration,
    /// Admissions allowed against a usage record before a new report is
    /// required. Absent means reports only expire with age.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_after: Option<u32>,
}

impl Default for UsageSection {
    fn default() -> Self {
        Self {
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            refresh_after: None,
        }
    }
}

/// `[reservations]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReservationSection {
    /// Lifetime of a reservation when the request does not override it.
    #[serde(with = "crate::duration")]
    pub ttl: Duration,
    /// Interval between expiry sweeps.
    #[serde(with = "crate::duration")]
    pub sweep_interval: Duration,
    /// Attempts for a transaction that keeps conflicting.
    pub max_attempts: u32,
}

impl Default for ReservationSection {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_RESERVATION_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `[metrics]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSection {
    /// Serve Prometheus metrics over HTTP.
    pub enabled: bool,
    pub addr: IpAddr,
    pub port: u16,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: DEFAULT_METRICS_ADDR
                .parse()
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: DEFAULT_METRICS_PORT,
        }
    }
}

impl BosonConfig {
    /// Load the configuration from `path`, or use the defaults if no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .wrap_err_with(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Override the configuration with the arguments given on the command
    /// line.
    pub fn apply_args(
        &mut self,
        usage: &UsageArgs,
        reservations: &ReservationArgs,
        metrics: &MetricsArgs,
    ) -> Result<()> {
        if let Some(threshold) = usage.staleness_threshold {
            self.usage.staleness_threshold = threshold;
        }
        if let Some(admissions) = usage.refresh_after {
            self.usage.refresh_after = Some(admissions);
        }

        if let Some(ttl) = reservations.ttl {
            self.reservations.ttl = ttl;
        }
        if let Some(interval) = reservations.sweep_interval {
            self.reservations.sweep_interval = interval;
        }
        if let Some(attempts) = reservations.max_attempts {
            self.reservations.max_attempts = attempts;
        }

        self.metrics.enabled |= metrics.enabled;
        if let Some(addr) = metrics.addr {
            self.metrics.addr = addr;
        }
        if let Some(port) = metrics.port {
            self.metrics.port = port;
        }

        self.validate()
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.usage.staleness_threshold.is_zero(),
            "usage.staleness_threshold must be positive"
        );
        ensure!(self.usage.refresh_after != Some(0), "usage.refresh_after must be at least 1");
        ensure!(!self.reservations.ttl.is_zero(), "reservations.ttl must be positive");
        ensure!(
            !self.reservations.sweep_interval.is_zero(),
            "reservations.sweep_interval must be positive"
        );
        ensure!(
            self.reservations.max_attempts > 0,
            "reservations.max_attempts must be at least 1"
        );
        Ok(())
    }

    pub fn usage_config(&self) -> UsageConfig {
        UsageConfig {
            staleness_threshold: self.usage.staleness_threshold,
            refresh_after: self.usage.refresh_after,
        }
    }

    pub fn reservation_config(&self) -> ReservationConfig {
        ReservationConfig {
            default_ttl: self.reservations.ttl,
            max_attempts: self.reservations.max_attempts,
            sweep_interval: self.reservations.sweep_interval,
        }
    }

    /// Address the metrics endpoint listens on.
    pub fn metrics_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.metrics.addr, self.metrics.port)
    }
}

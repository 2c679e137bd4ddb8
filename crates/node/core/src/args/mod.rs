//! CLI argument structs for node configuration.
//!
//! Every field is optional: an argument that is not given leaves the value
//! from the configuration file (or its default) in place. See
//! [`BosonConfig::apply_args`](crate::BosonConfig::apply_args).

mod log;
mod metrics;
mod reservation;
mod usage;

pub use log::LogArgs;
pub use metrics::MetricsArgs;
pub use reservation::ReservationArgs;
pub use usage::UsageArgs;

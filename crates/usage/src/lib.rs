//! Usage ledger and freshness gate.
//!
//! Every concrete reservable resource has one usage document holding the
//! in-use count reported by each service instance and the aggregate of
//! pending reservations. Instances report their counts eventually; the
//! [`FreshnessGate`] decides whether those reports are recent enough to admit
//! new reservations against them.
//!
//! # Components
//!
//! - [`UsageRecord`] - Stored usage document and its reservation transitions
//! - [`FreshnessGate`] - Staleness check for a usage document
//! - [`UsageLedger`] - Reports, snapshots and instance removal
//! - [`UsageConfig`] - Staleness threshold and refresh countdown

mod config;
pub mod constants;
mod error;
mod freshness;
mod ledger;
mod metrics;
mod record;

pub use config::UsageConfig;
pub use error::UsageError;
pub use freshness::{Freshness, FreshnessGate};
pub use ledger::UsageLedger;
pub use record::{InstanceUsage, UsageRecord, Usages};

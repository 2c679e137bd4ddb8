//! Node infrastructure for the Boson quota engine.
//!
//! # Components
//!
//! - [`args`] - CLI argument structs, also usable as configuration sections
//! - [`config`] - [`BosonConfig`] TOML loading and CLI overrides
//! - [`manifest`] - Seed manifest of services, resources and quotas
//! - [`logging`] - Tracing subscriber initialisation
//! - [`metrics`] - Prometheus exporter
//! - [`node`] - The [`Boson`] facade over every engine operation
//! - [`version`] - Version information

pub mod args;
pub mod config;
pub mod constants;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod node;
pub mod version;

mod duration;

pub use config::BosonConfig;
pub use manifest::SeedManifest;
pub use node::Boson;

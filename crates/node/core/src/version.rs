//! Version information for the Boson node.

/// The version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name and version, as logged on start-up.
pub const NAME_VERSION: &str = concat!("boson/v", env!("CARGO_PKG_VERSION"));

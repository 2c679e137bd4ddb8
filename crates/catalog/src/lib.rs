//! Service and resource catalog.
//!
//! Services and the resources they own are registered idempotently by the
//! client services at start-up. Every registration refreshes a last-seen
//! marker, so resources a service stopped registering can be reported as
//! deprecated.
//!
//! # Components
//!
//! - [`Catalog`] - Registration, lookup and classification
//! - [`ServiceRecord`], [`ResourceRecord`] - Stored documents
//! - [`CatalogError`] - Error type

mod catalog;
mod error;
mod records;

pub use catalog::Catalog;
pub use error::{CatalogError, InvalidResourceReason};
pub use records::{ResourceRecord, Resources, ServiceRecord, Services};

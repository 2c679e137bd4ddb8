//! Quota records and priority resolution.
//!
//! A quota binds an abstract resource and a scope to a [`Limit`]. Several
//! quotas may exist for one resource at different scopes; the one applying
//! to a request is found by evaluating [`RESOLUTION_ORDER`] against the
//! request's [`AuthContext`] and taking the first scope that has a quota.
//!
//! # Components
//!
//! - [`QuotaScope`] - Default, class or tenant scope
//! - [`QuotaRecord`] - Stored quota document
//! - [`QuotaResolver`] - Registration, listing and resolution
//!
//! [`Limit`]: boson_primitives::Limit
//! [`AuthContext`]: boson_primitives::AuthContext

mod error;
mod record;
mod resolver;
mod scope;

pub use error::QuotaError;
pub use record::{QuotaRecord, Quotas};
pub use resolver::{QuotaResolver, ResolvedLimit};
pub use scope::{QuotaScope, RESOLUTION_ORDER, ScopeLevel};

//! Core primitive types for the Boson quota engine
//!
//! This crate provides the small, storage-independent types shared by every
//! other Boson crate. Records in the storage layer refer to each other using
//! these identifiers rather than holding live references.
//!
//! # Types
//!
//! ## Names
//! - [`ServiceName`], [`ResourceName`], [`ParamName`] - Validated names
//! - [`InstanceId`] - Identifier of a reporting service instance
//!
//! ## Resources
//! - [`ResourceKind`] - Absolute or reservable
//! - [`ResourceKey`] - Canonical `service/name` key of an abstract resource
//! - [`ParamBindings`] - Bound values for required parameters
//! - [`ResourceRef`] - Abstract or concrete, derived at the point of use
//! - [`ConcreteResource`] - Resource with every required parameter bound
//!
//! ## Quotas and reservations
//! - [`AuthContext`] - Identity and quota-class claims of a request
//! - [`Limit`] - Numeric limit or unlimited
//! - [`ReservationId`], [`ReservationState`]
//!
//! ## Time
//! - [`Clock`] - Source of unix-millisecond timestamps

mod auth;
mod limit;
mod names;
mod reservation;
mod resource;
mod time;

pub use auth::AuthContext;
pub use limit::Limit;
pub use names::{InstanceId, NameError, ParamName, ResourceName, ServiceName};
pub use reservation::{ReservationId, ReservationState};
pub use resource::{ConcreteResource, ParamBindings, ResourceKey, ResourceKind, ResourceRef};
pub use time::{Clock, SystemClock, UnixMillis};

#[cfg(any(test, feature = "test-utils"))]
pub use time::ManualClock;

//! Two-phase reservation engine.
//!
//! A caller reserves quota for a batch of concrete resources before
//! allocating them, then commits the reservations once the allocation
//! succeeded or rolls them back if it failed. Admission, commit and rollback
//! each run as one optimistic transaction over every usage document they
//! touch, so concurrent callers on any number of nodes cannot together exceed
//! a limit.
//!
//! ```text
//!            create_reservations
//!                    │
//!                    ▼
//!               ┌─────────┐   commit    ┌───────────┐
//!               │ pending │────────────►│ committed │
//!               └─────────┘             └───────────┘
//!                    │ rollback / expiry
//!                    ▼
//!              ┌─────────────┐
//!              │ rolled_back │
//!              └─────────────┘
//! ```
//!
//! # Components
//!
//! - [`ReservationEngine`] - Create, commit, roll back and expire reservations
//! - [`ReservationBatch`] - All-or-nothing reservation request
//! - [`ReservationRecord`] - Stored reservation document
//! - [`ExpirySweeper`] - Periodic background expiry
//! - [`ReservationConfig`] - TTL, retry bound and sweep interval

mod config;
pub mod constants;
mod engine;
mod error;
mod metrics;
mod record;
mod request;
mod sweeper;

pub use config::ReservationConfig;
pub use engine::ReservationEngine;
pub use error::ReservationError;
pub use record::{PendingExpiries, ReservationRecord, Reservations, ResourceExpiries};
pub use request::{ReservationBatch, ReservationItem};
pub use sweeper::ExpirySweeper;

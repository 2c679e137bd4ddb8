//! Reservation engine integration tests.

mod common;
mod concurrency;
mod lifecycle;

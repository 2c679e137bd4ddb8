//! Document storage for the Boson quota engine
//!
//! Records live in named tables of string-keyed documents. Every document
//! carries a version that changes on each write, which lets a
//! [`Transaction`] read any number of documents, buffer its writes, and
//! commit them atomically only if nothing it read has changed in the
//! meantime.
//!
//! # Components
//!
//! - [`Table`] - Marker type naming a table and its value type
//! - [`Value`] - Values stored in tables (postcard encoded)
//! - [`KvBackend`] - Versioned key/value backend with atomic conditional batches
//! - [`MemoryBackend`] - In-process backend
//! - [`Transaction`] - Read set and write buffer of one attempt
//! - [`Database`] - Runs transactions with bounded retry on conflict
//!
//! Prefix scans record the versions of the documents they return but not the
//! absence of documents that were not there; a transaction that must not miss
//! concurrently created documents has to read them by key.

mod backend;
mod database;
mod error;
mod memory;
mod table;
mod transaction;

pub use backend::{Check, KvBackend, Record, Version, WriteBatch, WriteOp};
pub use database::Database;
pub use error::StorageError;
pub use memory::MemoryBackend;
pub use table::{Table, Value};
pub use transaction::Transaction;

/// Declare a [`Table`] marker type.
///
/// ```ignore
/// table!(
///     /// Registered services.
///     pub Services, "services", ServiceRecord
/// );
/// ```
#[macro_export]
macro_rules! table {
    ($(#[$meta:meta])* $vis:vis $name:ident, $table:literal, $value:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::Table for $name {
            const NAME: &'static str = $table;
            type Value = $value;
        }
    };
}

/// Default number of attempts for a transaction that keeps conflicting.
pub const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 5;

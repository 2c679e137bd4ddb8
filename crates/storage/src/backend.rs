use auto_impl::auto_impl;

use crate::StorageError;

/// Monotonic document version assigned by the backend on every write.
pub type Version = u64;

/// A stored document and its current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Encoded document.
    pub bytes: Vec<u8>,
    /// Version of the write that produced it.
    pub version: Version,
}

/// Precondition on a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// Table name.
    pub table: &'static str,
    /// Document key.
    pub key: String,
    /// Expected version, or `None` if the document must be absent.
    pub expected: Option<Version>,
}

/// Write to a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    /// Table name.
    pub table: &'static str,
    /// Document key.
    pub key: String,
    /// New encoded document, or `None` to delete.
    pub bytes: Option<Vec<u8>>,
}

/// Conditional batch applied atomically by [`KvBackend::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    /// Preconditions that must all hold.
    pub checks: Vec<Check>,
    /// Writes applied when every check holds.
    pub writes: Vec<WriteOp>,
}

impl WriteBatch {
    /// Whether the batch neither checks nor writes anything.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.writes.is_empty()
    }
}

/// Versioned key/value backend.
///
/// Implementations must apply a [`WriteBatch`] atomically: either every check
/// holds and every write becomes visible together, or nothing changes and
/// [`StorageError::Conflict`] is returned.
#[auto_impl(&, Box, Arc)]
pub trait KvBackend: Send + Sync {
    /// Read a single document.
    fn get(&self, table: &'static str, key: &str) -> Result<Option<Record>, StorageError>;

    /// Read every document whose key starts with `prefix`, in key order.
    fn scan(
        &self,
        table: &'static str,
        prefix: &str,
    ) -> Result<Vec<(String, Record)>, StorageError>;

    /// Check preconditions and apply writes atomically.
    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError>;
}

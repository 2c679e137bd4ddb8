//! Storage error type.

/// Storage error type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A document read by the transaction changed before it committed.
    #[error("write conflict on {table}/{key}")]
    Conflict {
        /// Table of the conflicting document.
        table: &'static str,
        /// Key of the conflicting document.
        key: String,
    },
    /// The transaction kept conflicting until its attempts ran out.
    #[error("transaction aborted after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
    /// Failed to encode a value for a table.
    #[error("failed to encode value for {table}: {reason}")]
    Encode {
        /// Target table.
        table: &'static str,
        /// Codec error message.
        reason: String,
    },
    /// Failed to decode a stored value.
    #[error("failed to decode {table}/{key}: {reason}")]
    Decode {
        /// Source table.
        table: &'static str,
        /// Key of the undecodable document.
        key: String,
        /// Codec error message.
        reason: String,
    },
    /// Backend-specific failure.
    #[error("{_0}")]
    Other(String),
}

impl StorageError {
    /// Whether retrying the transaction could succeed.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

use core::fmt::Debug;

use serde::{Serialize, de::DeserializeOwned};

use crate::StorageError;

/// A named table of documents of one type.
pub trait Table: Send + Sync + 'static {
    /// Table name, unique within a backend.
    const NAME: &'static str;

    /// Document type.
    type Value: Value;
}

/// Trait that will transform a document to and from its stored bytes.
pub trait Value: Serialize + DeserializeOwned + Clone + Debug + Send + Sync {
    /// Encodes a document going into the database.
    fn compress(&self, table: &'static str) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|e| StorageError::Encode {
            table,
            reason: e.to_string(),
        })
    }

    /// Decodes a document coming from the database.
    fn decompress(table: &'static str, key: &str, bytes: &[u8]) -> Result<Self, StorageError> {
        postcard::from_bytes(bytes).map_err(|e| StorageError::Decode {
            table,
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

impl<T> Value for T where T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync {}

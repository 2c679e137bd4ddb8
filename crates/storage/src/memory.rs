//! In-memory backend (does not persist across restarts).

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::{KvBackend, Record, StorageError, Version, WriteBatch};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<&'static str, BTreeMap<String, Record>>,
    last_version: Version,
}

impl Inner {
    fn get(&self, table: &'static str, key: &str) -> Option<&Record> {
        self.tables.get(table).and_then(|t| t.get(key))
    }
}

/// In-memory [`KvBackend`].
///
/// Batches are applied under a single write lock, so they serialize with each
/// other and with reads.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `table`.
    pub fn len(&self, table: &'static str) -> usize {
        self.inner.read().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Whether `table` holds no documents.
    pub fn is_empty(&self, table: &'static str) -> bool {
        self.len(table) == 0
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, table: &'static str, key: &str) -> Result<Option<Record>, StorageError> {
        Ok(self.inner.read().get(table, key).cloned())
    }

    fn scan(
        &self,
        table: &'static str,
        prefix: &str,
    ) -> Result<Vec<(String, Record)>, StorageError> {
        let inner = self.inner.read();
        let Some(docs) = inner.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut inner = self.inner.write();

        for check in &batch.checks {
            let current = inner.get(check.table, &check.key).map(|r| r.version);
            if current != check.expected {
                return Err(StorageError::Conflict {
                    table: check.table,
                    key: check.key.clone(),
                });
            }
        }

        if batch.writes.is_empty() {
            return Ok(());
        }

        inner.last_version += 1;
        let version = inner.last_version;
        for write in batch.writes {
            let docs = inner.tables.entry(write.table).or_default();
            match write.bytes {
                Some(bytes) => {
                    docs.insert(write.key, Record { bytes, version });
                }
                None => {
                    docs.remove(&write.key);
                }
            }
        }
        Ok(())
    }
}

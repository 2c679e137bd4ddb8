use std::collections::{BTreeMap, HashMap};

use crate::{Check, KvBackend, Record, StorageError, Table, Value, WriteBatch, WriteOp};

type DocId = (&'static str, String);

/// One attempt of an optimistic transaction.
///
/// Reads go to the backend the first time a document is seen and are served
/// from the read set afterwards, so a transaction observes a single version
/// of every document. Writes are buffered and visible to later reads in the
/// same transaction. Nothing reaches the backend until [`Database`] commits
/// the attempt.
///
/// [`Database`]: crate::Database
pub struct Transaction<'a> {
    backend: &'a dyn KvBackend,
    reads: HashMap<DocId, Option<Record>>,
    writes: BTreeMap<DocId, Option<Vec<u8>>>,
}

impl core::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transaction")
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(backend: &'a dyn KvBackend) -> Self {
        Self {
            backend,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    fn read_raw(&mut self, table: &'static str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let id = (table, key.to_string());
        if let Some(pending) = self.writes.get(&id) {
            return Ok(pending.clone());
        }
        if let Some(seen) = self.reads.get(&id) {
            return Ok(seen.as_ref().map(|r| r.bytes.clone()));
        }
        let record = self.backend.get(table, key)?;
        let bytes = record.as_ref().map(|r| r.bytes.clone());
        self.reads.insert(id, record);
        Ok(bytes)
    }

    /// Read a document.
    pub fn get<T: Table>(&mut self, key: &str) -> Result<Option<T::Value>, StorageError> {
        self.read_raw(T::NAME, key)?
            .map(|bytes| T::Value::decompress(T::NAME, key, &bytes))
            .transpose()
    }

    /// Whether a document exists.
    pub fn exists<T: Table>(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read_raw(T::NAME, key)?.is_some())
    }

    /// Read every document whose key starts with `prefix`, in key order,
    /// including documents written earlier in this transaction.
    pub fn scan<T: Table>(&mut self, prefix: &str) -> Result<Vec<(String, T::Value)>, StorageError> {
        let mut merged: BTreeMap<String, Option<Vec<u8>>> = BTreeMap::new();

        for (key, record) in self.backend.scan(T::NAME, prefix)? {
            let id = (T::NAME, key.clone());
            // An earlier point read pins the version this transaction sees.
            let seen = self.reads.entry(id).or_insert_with(|| Some(record));
            merged.insert(key, seen.as_ref().map(|r| r.bytes.clone()));
        }
        for ((table, key), pending) in &self.writes {
            if *table == T::NAME && key.starts_with(prefix) {
                merged.insert(key.clone(), pending.clone());
            }
        }

        merged
            .into_iter()
            .filter_map(|(key, bytes)| bytes.map(|b| (key, b)))
            .map(|(key, bytes)| {
                let value = T::Value::decompress(T::NAME, &key, &bytes)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Buffer a write of `value` under `key`.
    pub fn put<T: Table>(&mut self, key: &str, value: &T::Value) -> Result<(), StorageError> {
        let bytes = value.compress(T::NAME)?;
        self.writes.insert((T::NAME, key.to_string()), Some(bytes));
        Ok(())
    }

    /// Buffer deletion of `key`.
    pub fn delete<T: Table>(&mut self, key: &str) {
        self.writes.insert((T::NAME, key.to_string()), None);
    }

    /// Whether the transaction has buffered any write.
    pub fn has_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Convert the read set and write buffer into a conditional batch.
    pub(crate) fn into_batch(self) -> WriteBatch {
        let checks = self
            .reads
            .into_iter()
            .map(|((table, key), record)| Check {
                table,
                key,
                expected: record.map(|r| r.version),
            })
            .collect();
        let writes = self
            .writes
            .into_iter()
            .map(|((table, key), bytes)| WriteOp { table, key, bytes })
            .collect();
        WriteBatch { checks, writes }
    }
}

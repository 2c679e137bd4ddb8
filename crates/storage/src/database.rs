use std::sync::Arc;

use metrics::Counter;
use tracing::{debug, warn};

use crate::{KvBackend, MemoryBackend, StorageError, Transaction};

#[derive(Clone, Debug)]
struct TransactionMetrics {
    commits_total: Counter,
    conflicts_total: Counter,
    aborted_total: Counter,
}

impl Default for TransactionMetrics {
    fn default() -> Self {
        Self {
            commits_total: metrics::counter!("storage.transaction.commits_total"),
            conflicts_total: metrics::counter!("storage.transaction.conflicts_total"),
            aborted_total: metrics::counter!("storage.transaction.aborted_total"),
        }
    }
}

/// Shared handle to a storage backend.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn KvBackend>,
    metrics: TransactionMetrics,
}

impl core::fmt::Debug for Database {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Database {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            metrics: TransactionMetrics::default(),
        }
    }

    /// Database over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    /// Run `f` in a transaction, retrying from scratch when a commit
    /// conflicts with a concurrent writer.
    ///
    /// `f` may run up to `max_attempts` times and must not have side effects
    /// outside the transaction. An error returned by `f` aborts without
    /// writing anything. When every attempt conflicts the result is
    /// [`StorageError::RetriesExhausted`].
    pub fn transact<T, E, F>(&self, max_attempts: u32, mut f: F) -> Result<T, E>
    where
        F: FnMut(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let max_attempts = max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let mut tx = Transaction::new(self.backend.as_ref());
            let out = f(&mut tx)?;

            match self.backend.apply(tx.into_batch()) {
                Ok(()) => {
                    self.metrics.commits_total.increment(1);
                    return Ok(out);
                }
                Err(StorageError::Conflict { table, key }) => {
                    self.metrics.conflicts_total.increment(1);
                    debug!(attempt, max_attempts, table, %key, "transaction conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.metrics.aborted_total.increment(1);
        warn!(attempts = max_attempts, "transaction retries exhausted");
        Err(StorageError::RetriesExhausted {
            attempts: max_attempts,
        }
        .into())
    }

    /// Run a read-only closure once against committed data.
    ///
    /// Every backend call sees a consistent state, but separate reads are
    /// not validated against each other, so a read never conflicts. Writes
    /// made by `f` are discarded.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut tx = Transaction::new(self.backend.as_ref());
        f(&mut tx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::table;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tally {
        n: u64,
    }

    table!(Tallies, "tallies", Tally);

    #[test]
    fn test_commit_and_read_back() {
        let db = Database::in_memory();

        db.transact(3, |tx| {
            tx.put::<Tallies>("a", &Tally { n: 1 })?;
            // Own writes are visible.
            assert_eq!(tx.get::<Tallies>("a")?, Some(Tally { n: 1 }));
            Ok::<_, StorageError>(())
        })
        .unwrap();

        let value = db.read(|tx| tx.get::<Tallies>("a")).unwrap();
        assert_eq!(value, Some(Tally { n: 1 }));
    }

    #[test]
    fn test_error_aborts_without_writing() {
        let db = Database::in_memory();

        let result: Result<(), StorageError> = db.transact(3, |tx| {
            tx.put::<Tallies>("a", &Tally { n: 1 })?;
            Err(StorageError::Other("nope".into()))
        });

        assert_matches!(result, Err(StorageError::Other(_)));
        assert!(!db.read(|tx| tx.exists::<Tallies>("a")).unwrap());
    }

    #[test]
    fn test_conflict_retries() {
        let db = Database::in_memory();
        let attempts = AtomicU32::new(0);

        db.transact(1, |tx| tx.put::<Tallies>("a", &Tally { n: 0 }))
            .unwrap();

        let n = db
            .transact(3, |tx| {
                let current = tx.get::<Tallies>("a")?.map_or(0, |c| c.n);
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Concurrent writer bumps the document mid-transaction.
                    db.transact(1, |inner| inner.put::<Tallies>("a", &Tally { n: 10 }))?;
                }
                tx.put::<Tallies>("a", &Tally { n: current + 1 })?;
                Ok::<_, StorageError>(current + 1)
            })
            .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(n, 11);
    }

    #[test]
    fn test_retries_exhausted() {
        let db = Database::in_memory();

        let result = db.transact(2, |tx| {
            tx.get::<Tallies>("a")?;
            db.transact(1, |inner| inner.put::<Tallies>("a", &Tally { n: 1 }))?;
            tx.put::<Tallies>("b", &Tally { n: 1 })
        });

        assert_matches!(result, Err(StorageError::RetriesExhausted { attempts: 2 }));
        assert!(!db.read(|tx| tx.exists::<Tallies>("b")).unwrap());
    }

    #[test]
    fn test_read_ignores_concurrent_writers() {
        let db = Database::in_memory();
        db.transact(1, |tx| tx.put::<Tallies>("x/1", &Tally { n: 1 }))
            .unwrap();

        let rows = db
            .read(|tx| {
                let rows = tx.scan::<Tallies>("x/")?;
                db.transact(1, |inner| {
                    inner.delete::<Tallies>("x/1");
                    Ok::<_, StorageError>(())
                })?;
                Ok::<_, StorageError>(rows)
            })
            .unwrap();

        assert_eq!(rows, vec![("x/1".to_string(), Tally { n: 1 })]);
        assert!(!db.read(|tx| tx.exists::<Tallies>("x/1")).unwrap());
    }

    #[test]
    fn test_scan_merges_pending_writes() {
        let db = Database::in_memory();
        db.transact(1, |tx| {
            tx.put::<Tallies>("x/1", &Tally { n: 1 })?;
            tx.put::<Tallies>("x/2", &Tally { n: 2 })
        })
        .unwrap();

        let keys = db
            .transact(1, |tx| {
                tx.delete::<Tallies>("x/1");
                tx.put::<Tallies>("x/3", &Tally { n: 3 })?;
                let rows = tx.scan::<Tallies>("x/")?;
                Ok::<_, StorageError>(rows.into_iter().map(|(k, _)| k).collect::<Vec<_>>())
            })
            .unwrap();

        assert_eq!(keys, ["x/2", "x/3"]);
    }
}

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use boson_catalog::ResourceRecord;
use boson_primitives::{
    AuthContext, Clock, ConcreteResource, ReservationId, ReservationState, UnixMillis,
};
use boson_quota::QuotaResolver;
use boson_storage::{Database, Transaction};
use boson_usage::{FreshnessGate, UsageLedger, UsageRecord, Usages};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::metrics::ReservationMetrics;
use crate::record::resource_expiry_prefix;
use crate::{
    PendingExpiries, ReservationBatch, ReservationConfig, ReservationError, ReservationRecord,
    Reservations, ResourceExpiries,
};

/// Usage documents touched by one transaction, keyed by storage key.
type WorkingSet = BTreeMap<String, UsageRecord>;

/// Creates, commits, rolls back and expires reservations.
///
/// Every operation runs as one optimistic transaction and is retried from
/// scratch when a concurrent writer touched any document it read, so the
/// engine holds no state of its own and any number of instances may share a
/// [`Database`].
#[derive(Debug, Clone)]
pub struct ReservationEngine {
    db: Database,
    clock: Arc<dyn Clock>,
    gate: FreshnessGate,
    config: ReservationConfig,
    metrics: ReservationMetrics,
}

impl ReservationEngine {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        gate: FreshnessGate,
        config: ReservationConfig,
    ) -> Self {
        Self {
            db,
            clock,
            gate,
            config,
            metrics: ReservationMetrics::default(),
        }
    }

    pub fn config(&self) -> &ReservationConfig {
        &self.config
    }

    // ============================================================================
    // Admission
    // ============================================================================

    /// Reserve every item of `batch`, or none of them.
    ///
    /// Fails with [`ReservationError::StaleUsage`] listing every resource
    /// whose usage must be refreshed, or with
    /// [`ReservationError::QuotaExceeded`] for the first item that does not
    /// fit. Items for the same resource accumulate. Pending reservations of
    /// the batch's resources that are past their deadline are rolled back
    /// first and no longer count against the limit.
    pub fn create_reservations(
        &self,
        batch: ReservationBatch,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        if batch.items.is_empty() {
            return Ok(Vec::new());
        }

        let correlation_id = batch
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let ttl = millis(batch.ttl.unwrap_or(self.config.default_ttl));

        let result = self.db.transact(self.config.max_attempts, |tx| {
            let now = self.clock.now();
            self.admit(tx, &batch, &correlation_id, now, now.saturating_add(ttl))
        });

        match result {
            Ok((records, lapsed)) => {
                self.metrics.created_total.increment(records.len() as u64);
                if lapsed > 0 {
                    self.metrics.expired_total.increment(lapsed);
                    debug!(%correlation_id, lapsed, "expired reservations rolled back on admission");
                }
                debug!(
                    %correlation_id,
                    instance = %batch.instance,
                    tenant = %batch.auth.tenant,
                    count = records.len(),
                    "reservations created"
                );
                Ok(records)
            }
            Err(err) => {
                self.observe_rejection(&err);
                Err(err)
            }
        }
    }

    fn admit(
        &self,
        tx: &mut Transaction<'_>,
        batch: &ReservationBatch,
        correlation_id: &str,
        now: UnixMillis,
        expires_at: UnixMillis,
    ) -> Result<(Vec<ReservationRecord>, u64), ReservationError> {
        let mut resources = Vec::with_capacity(batch.items.len());
        for item in &batch.items {
            let definition = ResourceRecord::load(tx, &item.resource)?;
            resources.push(definition.concrete_reservable(item.params.clone())?);
        }

        // Freshness is judged before this batch, once lapsed reservations are gone.
        let mut usages = WorkingSet::new();
        let mut stale = Vec::new();
        let mut lapsed = 0;
        for resource in &resources {
            let key = resource.storage_key();
            if usages.contains_key(&key) {
                continue;
            }
            usages.insert(key.clone(), UsageLedger::load_or_default(tx, resource, now)?);
            lapsed += roll_back_lapsed(tx, &mut usages, resource, now)?;

            let freshness = self.gate.check(usages.get(&key), now);
            if freshness.is_stale() {
                trace!(%resource, ?freshness, "stale usage");
                stale.push(resource.clone());
            }
        }
        if !stale.is_empty() {
            return Err(ReservationError::StaleUsage { resources: stale });
        }

        let mut limits = Vec::with_capacity(batch.items.len());
        for item in &batch.items {
            limits.push(QuotaResolver::resolve(tx, &item.resource, &batch.auth)?.limit);
        }

        let mut records = Vec::with_capacity(batch.items.len());
        for ((item, resource), limit) in batch.items.iter().zip(resources).zip(limits) {
            let usage = usages
                .entry(resource.storage_key())
                .or_insert_with(|| UsageRecord::new(resource.clone(), now));

            let current = usage.total();
            if !limit.admits(current, item.delta) {
                return Err(ReservationError::QuotaExceeded {
                    resource,
                    limit: limit.value().unwrap_or(u64::MAX),
                    current,
                    delta: item.delta,
                });
            }

            let mut record = ReservationRecord {
                id: ReservationId::random(),
                correlation_id: correlation_id.to_owned(),
                resource,
                delta: item.delta,
                auth: batch.auth.clone(),
                instance: batch.instance.clone(),
                state: ReservationState::Pending,
                created_at: now,
                expires_at,
                resolved_at: None,
            };

            if batch.auto_commit_releases && item.delta < 0 {
                usage.apply(&batch.instance, item.delta, now)?;
                record.resolve(ReservationState::Committed, now);
            } else {
                usage.reserve(item.delta, now)?;
                tx.put::<PendingExpiries>(&record.expiry_key(), &record.id)?;
                tx.put::<ResourceExpiries>(&record.resource_expiry_key(), &record.id)?;
            }
            tx.put::<Reservations>(&record.storage_key(), &record)?;
            records.push(record);
        }

        for usage in usages.values_mut() {
            usage.count_admission();
        }
        store(tx, &usages)?;
        Ok((records, lapsed))
    }

    // ============================================================================
    // Resolution
    // ============================================================================

    /// Commit pending reservations, moving their deltas into in-use.
    ///
    /// Reservations already committed are left as they are. Fails for the
    /// whole list if any reservation is unknown, was created by a different
    /// principal, was rolled back, or is past its expiry.
    pub fn commit(
        &self,
        ids: &[ReservationId],
        auth: &AuthContext,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        self.resolve_all(ids, auth, ReservationState::Committed)
    }

    /// Roll back pending reservations, releasing their deltas.
    ///
    /// Reservations already rolled back are left as they are. Fails for the
    /// whole list if any reservation is unknown, was created by a different
    /// principal, or was committed.
    pub fn rollback(
        &self,
        ids: &[ReservationId],
        auth: &AuthContext,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        self.resolve_all(ids, auth, ReservationState::RolledBack)
    }

    fn resolve_all(
        &self,
        ids: &[ReservationId],
        auth: &AuthContext,
        target: ReservationState,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<ReservationId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let result = self.db.transact(self.config.max_attempts, |tx| {
            let now = self.clock.now();
            let mut usages = WorkingSet::new();
            let mut records = Vec::with_capacity(ids.len());
            let mut transitioned = 0u64;

            for id in &ids {
                let mut record = load(tx, id)?;
                if !record.auth.same_principal(auth) {
                    return Err(ReservationError::AuthorizationFailure { id: *id });
                }

                match record.state {
                    state if state == target => {}
                    ReservationState::Pending => {
                        if target == ReservationState::Committed && record.is_expired(now) {
                            return Err(ReservationError::InvalidState {
                                id: *id,
                                state: record.state,
                                expired: true,
                            });
                        }
                        transition(tx, &mut usages, &mut record, target, now)?;
                        transitioned += 1;
                    }
                    state => {
                        return Err(ReservationError::InvalidState {
                            id: *id,
                            state,
                            expired: false,
                        });
                    }
                }
                records.push(record);
            }

            store(tx, &usages)?;
            Ok((records, transitioned))
        });

        match result {
            Ok((records, transitioned)) => {
                match target {
                    ReservationState::Committed => {
                        self.metrics.committed_total.increment(transitioned)
                    }
                    _ => self.metrics.rolled_back_total.increment(transitioned),
                }
                debug!(state = %target, requested = ids.len(), transitioned, "reservations resolved");
                Ok(records)
            }
            Err(err) => {
                self.observe_rejection(&err);
                Err(err)
            }
        }
    }

    // ============================================================================
    // Expiry
    // ============================================================================

    /// Roll back every pending reservation whose deadline is at or before
    /// `now`. Returns the number rolled back by this call.
    ///
    /// Each reservation is re-checked and rolled back in its own transaction,
    /// so sweeps running concurrently on several instances never roll back
    /// the same reservation twice.
    pub fn expire_reservations(&self, now: UnixMillis) -> Result<usize, ReservationError> {
        let due: Vec<ReservationId> = self
            .db
            .read(|tx| tx.scan::<PendingExpiries>(""))?
            .into_iter()
            .take_while(|(key, _)| deadline(key).is_some_and(|at| at <= now))
            .map(|(_, id)| id)
            .collect();

        let mut expired = 0;
        for id in due {
            match self.expire_one(&id, now) {
                Ok(true) => expired += 1,
                Ok(false) => trace!(%id, "reservation already resolved"),
                Err(err) => warn!(%id, %err, "failed to expire reservation"),
            }
        }

        if expired > 0 {
            self.metrics.expired_total.increment(expired as u64);
            info!(expired, "expired pending reservations");
        }
        Ok(expired)
    }

    /// [`Self::expire_reservations`] at the current time.
    pub fn expire_due(&self) -> Result<usize, ReservationError> {
        self.expire_reservations(self.clock.now())
    }

    fn expire_one(&self, id: &ReservationId, now: UnixMillis) -> Result<bool, ReservationError> {
        self.db.transact(self.config.max_attempts, |tx| {
            let Some(mut record) = tx.get::<Reservations>(&id.storage_key())? else {
                return Ok(false);
            };
            if record.state != ReservationState::Pending || !record.is_expired(now) {
                return Ok(false);
            }

            let mut usages = WorkingSet::new();
            transition(tx, &mut usages, &mut record, ReservationState::RolledBack, now)?;
            store(tx, &usages)?;
            debug!(%id, resource = %record.resource, delta = record.delta, "reservation expired");
            Ok(true)
        })
    }

    // ============================================================================
    // Queries
    // ============================================================================

    /// Load a reservation.
    pub fn get_reservation(&self, id: &ReservationId) -> Result<ReservationRecord, ReservationError> {
        self.db.read(|tx| load(tx, id))
    }

    /// Every reservation created under `correlation_id`.
    pub fn list_reservations(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        // TODO: index reservations by correlation id instead of scanning the table.
        let rows = self
            .db
            .read(|tx| tx.scan::<Reservations>(""))?;
        Ok(rows
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| record.correlation_id == correlation_id)
            .collect())
    }

    fn observe_rejection(&self, err: &ReservationError) {
        match err {
            ReservationError::QuotaExceeded {
                resource,
                limit,
                current,
                delta,
            } => {
                self.metrics.quota_exceeded_total.increment(1);
                warn!(%resource, limit, current, delta, "quota exceeded");
            }
            ReservationError::StaleUsage { resources } => {
                self.metrics.stale_rejections_total.increment(1);
                warn!(stale = resources.len(), "stale usage, refresh required");
            }
            ReservationError::Conflict { attempts } => {
                self.metrics.conflict_failures_total.increment(1);
                warn!(attempts, "reservation transaction kept conflicting");
            }
            err => debug!(%err, "reservation request rejected"),
        }
    }
}

fn load(tx: &mut Transaction<'_>, id: &ReservationId) -> Result<ReservationRecord, ReservationError> {
    tx.get::<Reservations>(&id.storage_key())?
        .ok_or(ReservationError::ReservationNotFound { id: *id })
}

/// Move a pending reservation to `target`, updating its usage in `usages`.
fn transition(
    tx: &mut Transaction<'_>,
    usages: &mut WorkingSet,
    record: &mut ReservationRecord,
    target: ReservationState,
    now: UnixMillis,
) -> Result<(), ReservationError> {
    let key = record.resource.storage_key();
    let usage = match usages.entry(key) {
        std::collections::btree_map::Entry::Occupied(entry) => entry.into_mut(),
        std::collections::btree_map::Entry::Vacant(entry) => {
            let usage = UsageLedger::load_or_default(tx, &record.resource, now)?;
            entry.insert(usage)
        }
    };

    match target {
        ReservationState::Committed => usage.commit(&record.instance, record.delta, now)?,
        _ => usage.release(record.delta, now)?,
    }

    tx.delete::<PendingExpiries>(&record.expiry_key());
    tx.delete::<ResourceExpiries>(&record.resource_expiry_key());
    record.resolve(target, now);
    tx.put::<Reservations>(&record.storage_key(), record)?;
    Ok(())
}

/// Roll back the pending reservations of `resource` that are past their
/// deadline at `now`. Returns how many were rolled back.
fn roll_back_lapsed(
    tx: &mut Transaction<'_>,
    usages: &mut WorkingSet,
    resource: &ConcreteResource,
    now: UnixMillis,
) -> Result<u64, ReservationError> {
    let prefix = resource_expiry_prefix(resource);
    let due: Vec<ReservationId> = tx
        .scan::<ResourceExpiries>(&prefix)?
        .into_iter()
        .take_while(|(key, _)| {
            key.strip_prefix(prefix.as_str())
                .and_then(deadline)
                .is_some_and(|at| at <= now)
        })
        .map(|(_, id)| id)
        .collect();

    let mut rolled_back = 0;
    for id in due {
        let mut record = load(tx, &id)?;
        if record.state == ReservationState::Pending && record.is_expired(now) {
            transition(tx, usages, &mut record, ReservationState::RolledBack, now)?;
            rolled_back += 1;
        }
    }
    Ok(rolled_back)
}

fn store(tx: &mut Transaction<'_>, usages: &WorkingSet) -> Result<(), ReservationError> {
    for (key, usage) in usages {
        tx.put::<Usages>(key, usage)?;
    }
    Ok(())
}

/// Deadline encoded in a [`PendingExpiries`] key.
fn deadline(key: &str) -> Option<UnixMillis> {
    key.split_once('/')?.0.parse().ok()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

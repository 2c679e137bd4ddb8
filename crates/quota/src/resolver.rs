use std::sync::Arc;

use boson_catalog::ResourceRecord;
use boson_primitives::{AuthContext, Clock, Limit, ResourceKey};
use boson_storage::{DEFAULT_TRANSACTION_ATTEMPTS, Database, Transaction};
use tracing::{debug, trace};

use crate::{QuotaError, QuotaRecord, QuotaScope, Quotas, RESOLUTION_ORDER};

/// The quota that applies to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLimit {
    /// The applicable limit.
    pub limit: Limit,
    /// Scope of the quota it came from.
    pub scope: QuotaScope,
}

/// Registers quotas and resolves the one applying to a request.
#[derive(Debug, Clone)]
pub struct QuotaResolver {
    db: Database,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl QuotaResolver {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            max_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
        }
    }

    /// Override the number of attempts for conflicting transactions.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the limit for `resource` at `scope`, replacing any existing quota
    /// at that scope.
    pub fn register_quota(
        &self,
        resource: &ResourceKey,
        scope: QuotaScope,
        limit: Limit,
    ) -> Result<QuotaRecord, QuotaError> {
        let now = self.clock.now();
        let key = scope.storage_key(resource);

        self.db.transact(self.max_attempts, |tx| {
            ResourceRecord::load(tx, resource)?;

            let created_at = tx.get::<Quotas>(&key)?.map_or(now, |q| q.created_at);
            let record = QuotaRecord {
                resource: resource.clone(),
                scope: scope.clone(),
                limit,
                created_at,
                updated_at: now,
            };
            tx.put::<Quotas>(&key, &record)?;
            debug!(%resource, %scope, %limit, "quota registered");
            Ok(record)
        })
    }

    /// Remove the quota for `resource` at `scope`.
    ///
    /// Returns whether a quota existed.
    pub fn remove_quota(&self, resource: &ResourceKey, scope: &QuotaScope) -> Result<bool, QuotaError> {
        let key = scope.storage_key(resource);
        self.db.transact(self.max_attempts, |tx| {
            if !tx.exists::<Quotas>(&key)? {
                return Ok(false);
            }
            tx.delete::<Quotas>(&key);
            debug!(%resource, %scope, "quota removed");
            Ok(true)
        })
    }

    /// Every quota registered for `resource`.
    pub fn list_quotas(&self, resource: &ResourceKey) -> Result<Vec<QuotaRecord>, QuotaError> {
        self.db.read(|tx| {
            Ok(tx
                .scan::<Quotas>(&QuotaScope::resource_prefix(resource))?
                .into_iter()
                .map(|(_, quota)| quota)
                .collect())
        })
    }

    /// Resolve the limit applying to `auth` for `resource`.
    ///
    /// Fails if the resource is unknown or no quota applies.
    pub fn get_limit(
        &self,
        resource: &ResourceKey,
        auth: &AuthContext,
    ) -> Result<ResolvedLimit, QuotaError> {
        self.db.read(|tx| {
            ResourceRecord::load(tx, resource)?;
            Self::resolve(tx, resource, auth)
        })
    }

    /// Resolve the limit inside an existing transaction.
    ///
    /// Only the quota documents consulted are added to the read set, so a
    /// concurrent change to any of them aborts the transaction.
    pub fn resolve(
        tx: &mut Transaction<'_>,
        resource: &ResourceKey,
        auth: &AuthContext,
    ) -> Result<ResolvedLimit, QuotaError> {
        for scope in RESOLUTION_ORDER.iter().filter_map(|level| level.scope_for(auth)) {
            if let Some(quota) = tx.get::<Quotas>(&scope.storage_key(resource))? {
                trace!(%resource, %scope, limit = %quota.limit, "quota resolved");
                return Ok(ResolvedLimit {
                    limit: quota.limit,
                    scope,
                });
            }
        }
        Err(QuotaError::NoApplicableQuota {
            resource: resource.clone(),
        })
    }
}

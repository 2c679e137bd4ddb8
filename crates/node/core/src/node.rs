//! The operation boundary of a Boson node.

use std::sync::Arc;

use boson_catalog::{Catalog, CatalogError, ResourceRecord, ServiceRecord};
use boson_primitives::{
    AuthContext, Clock, ConcreteResource, InstanceId, Limit, ParamBindings, ParamName,
    ReservationId, ResourceKey, ResourceKind, ResourceName, ResourceRef, ServiceName,
    SystemClock, UnixMillis,
};
use boson_quota::{QuotaError, QuotaRecord, QuotaResolver, QuotaScope, ResolvedLimit};
use boson_reservation::{
    ExpirySweeper, ReservationBatch, ReservationEngine, ReservationError, ReservationRecord,
};
use boson_storage::Database;
use boson_usage::{Freshness, UsageError, UsageLedger, UsageRecord};
use eyre::{Result, WrapErr};
use tracing::info;

use crate::config::BosonConfig;
use crate::manifest::SeedManifest;

/// Counts of what a [`SeedManifest`] registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub services: usize,
    pub resources: usize,
    pub quotas: usize,
}

/// Every quota engine operation over one shared [`Database`].
///
/// Cheap to clone. Any number of nodes may run against the same database.
#[derive(Debug, Clone)]
pub struct Boson {
    catalog: Catalog,
    quotas: QuotaResolver,
    ledger: UsageLedger,
    engine: ReservationEngine,
}

impl Boson {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: &BosonConfig) -> Self {
        let attempts = config.reservations.max_attempts;
        let ledger = UsageLedger::new(db.clone(), clock.clone(), config.usage_config())
            .with_max_attempts(attempts);
        Self {
            catalog: Catalog::new(db.clone(), clock.clone()).with_max_attempts(attempts),
            quotas: QuotaResolver::new(db.clone(), clock.clone()).with_max_attempts(attempts),
            engine: ReservationEngine::new(db, clock, ledger.gate(), config.reservation_config()),
            ledger,
        }
    }

    /// A node over a fresh in-memory database and the system clock.
    pub fn in_memory(config: &BosonConfig) -> Self {
        Self::new(Database::in_memory(), Arc::new(SystemClock), config)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn quotas(&self) -> &QuotaResolver {
        &self.quotas
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &ReservationEngine {
        &self.engine
    }

    /// Background task expiring abandoned reservations.
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::from_engine(self.engine.clone())
    }

    // ============================================================================
    // Catalog
    // ============================================================================

    pub fn register_service(&self, name: &ServiceName) -> Result<ServiceRecord, CatalogError> {
        self.catalog.register_service(name)
    }

    pub fn lookup_service(&self, name: &ServiceName) -> Result<ServiceRecord, CatalogError> {
        self.catalog.lookup_service(name)
    }

    pub fn list_services(&self) -> Result<Vec<ServiceRecord>, CatalogError> {
        self.catalog.list_services()
    }

    pub fn register_resource(
        &self,
        service: &ServiceName,
        name: &ResourceName,
        params: impl IntoIterator<Item = ParamName>,
        kind: ResourceKind,
    ) -> Result<ResourceRecord, CatalogError> {
        self.catalog.register_resource(service, name, params, kind)
    }

    pub fn lookup_resource(&self, resource: &ResourceKey) -> Result<ResourceRecord, CatalogError> {
        self.catalog.lookup_resource(resource)
    }

    pub fn list_resources(&self, service: &ServiceName) -> Result<Vec<ResourceRecord>, CatalogError> {
        self.catalog.list_resources(service)
    }

    /// Resources of `service` not registered since `older_than`.
    pub fn deprecated_resources(
        &self,
        service: &ServiceName,
        older_than: UnixMillis,
    ) -> Result<Vec<ResourceRecord>, CatalogError> {
        self.catalog.deprecated_resources(service, older_than)
    }

    pub fn classify(
        &self,
        resource: &ResourceKey,
        params: ParamBindings,
    ) -> Result<ResourceRef, CatalogError> {
        self.catalog.classify(resource, params)
    }

    // ============================================================================
    // Quotas
    // ============================================================================

    pub fn register_quota(
        &self,
        resource: &ResourceKey,
        scope: QuotaScope,
        limit: Limit,
    ) -> Result<QuotaRecord, QuotaError> {
        self.quotas.register_quota(resource, scope, limit)
    }

    pub fn remove_quota(&self, resource: &ResourceKey, scope: &QuotaScope) -> Result<bool, QuotaError> {
        self.quotas.remove_quota(resource, scope)
    }

    pub fn list_quotas(&self, resource: &ResourceKey) -> Result<Vec<QuotaRecord>, QuotaError> {
        self.quotas.list_quotas(resource)
    }

    pub fn get_limit(
        &self,
        resource: &ResourceKey,
        auth: &AuthContext,
    ) -> Result<ResolvedLimit, QuotaError> {
        self.quotas.get_limit(resource, auth)
    }

    // ============================================================================
    // Usage
    // ============================================================================

    pub fn report_usage(
        &self,
        instance: &InstanceId,
        resource: &ResourceKey,
        params: ParamBindings,
        in_use: u64,
    ) -> Result<UsageRecord, UsageError> {
        self.ledger.report_usage(instance, resource, params, in_use)
    }

    pub fn forget_instance(
        &self,
        service: &ServiceName,
        instance: &InstanceId,
    ) -> Result<usize, UsageError> {
        self.ledger.forget_instance(service, instance)
    }

    pub fn check_freshness(&self, resource: &ConcreteResource) -> Result<Freshness, UsageError> {
        self.ledger.check_freshness(resource)
    }

    pub fn get_usage(&self, resource: &ConcreteResource) -> Result<Option<UsageRecord>, UsageError> {
        self.ledger.get_usage(resource)
    }

    pub fn list_usage(
        &self,
        resource: &ResourceKey,
        filter: &ParamBindings,
    ) -> Result<Vec<UsageRecord>, UsageError> {
        self.ledger.list_usage(resource, filter)
    }

    // ============================================================================
    // Reservations
    // ============================================================================

    pub fn create_reservations(
        &self,
        batch: ReservationBatch,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        self.engine.create_reservations(batch)
    }

    pub fn commit(
        &self,
        ids: &[ReservationId],
        auth: &AuthContext,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        self.engine.commit(ids, auth)
    }

    pub fn rollback(
        &self,
        ids: &[ReservationId],
        auth: &AuthContext,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        self.engine.rollback(ids, auth)
    }

    pub fn expire_reservations(&self, now: UnixMillis) -> Result<usize, ReservationError> {
        self.engine.expire_reservations(now)
    }

    pub fn get_reservation(&self, id: &ReservationId) -> Result<ReservationRecord, ReservationError> {
        self.engine.get_reservation(id)
    }

    pub fn list_reservations(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        self.engine.list_reservations(correlation_id)
    }

    // ============================================================================
    // Seeding
    // ============================================================================

    /// Register every service, resource and quota of `manifest`.
    ///
    /// Registration is idempotent, so seeding the same manifest from several
    /// nodes is safe.
    pub fn seed(&self, manifest: &SeedManifest) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for service in &manifest.services {
            self.register_service(&service.name)
                .wrap_err_with(|| format!("failed to register service {}", service.name))?;
            summary.services += 1;

            for resource in &service.resources {
                let record = self
                    .register_resource(
                        &service.name,
                        &resource.name,
                        resource.params.iter().cloned(),
                        resource.kind,
                    )
                    .wrap_err_with(|| {
                        format!("failed to register resource {}/{}", service.name, resource.name)
                    })?;
                summary.resources += 1;

                for quota in &resource.quotas {
                    let scope = quota.scope()?;
                    self.register_quota(&record.key, scope, quota.limit)
                        .wrap_err_with(|| format!("failed to register quota of {}", record.key))?;
                    summary.quotas += 1;
                }
            }
        }

        info!(
            services = summary.services,
            resources = summary.resources,
            quotas = summary.quotas,
            "seed manifest registered"
        );
        Ok(summary)
    }
}

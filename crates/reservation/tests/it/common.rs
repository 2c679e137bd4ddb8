use std::sync::Arc;

use boson_catalog::Catalog;
use boson_primitives::{
    ConcreteResource, InstanceId, Limit, ManualClock, ParamBindings, ParamName, ResourceKey,
    ResourceKind, ResourceName, ServiceName,
};
use boson_quota::{QuotaResolver, QuotaScope};
use boson_reservation::{ReservationConfig, ReservationEngine};
use boson_storage::Database;
use boson_usage::{FreshnessGate, UsageConfig, UsageLedger, UsageRecord};

pub(crate) struct Harness {
    pub(crate) db: Database,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) catalog: Catalog,
    pub(crate) quotas: QuotaResolver,
    pub(crate) ledger: UsageLedger,
    pub(crate) engine: ReservationEngine,
    pub(crate) service: ServiceName,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_usage(UsageConfig::default())
    }

    pub(crate) fn with_usage(usage: UsageConfig) -> Self {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let db = Database::in_memory();
        let service = ServiceName::new("compute").unwrap();

        let catalog = Catalog::new(db.clone(), clock.clone());
        catalog.register_service(&service).unwrap();

        Self {
            quotas: QuotaResolver::new(db.clone(), clock.clone()),
            ledger: UsageLedger::new(db.clone(), clock.clone(), usage),
            engine: ReservationEngine::new(
                db.clone(),
                clock.clone(),
                FreshnessGate::new(usage.staleness_threshold),
                ReservationConfig::default(),
            ),
            catalog,
            db,
            clock,
            service,
        }
    }

    /// Register a reservable resource with a default quota.
    pub(crate) fn reservable(&self, name: &str, params: &[&str], limit: u64) -> ResourceKey {
        let key = self
            .catalog
            .register_resource(
                &self.service,
                &ResourceName::new(name).unwrap(),
                params.iter().map(|p| ParamName::new(*p).unwrap()),
                ResourceKind::Reservable,
            )
            .unwrap()
            .key;
        self.quotas
            .register_quota(&key, QuotaScope::Default, Limit::Limited(limit))
            .unwrap();
        key
    }

    pub(crate) fn report(&self, instance: &InstanceId, resource: &ResourceKey, in_use: u64) {
        self.ledger
            .report_usage(instance, resource, ParamBindings::new(), in_use)
            .unwrap();
    }

    pub(crate) fn usage(&self, resource: &ResourceKey) -> UsageRecord {
        self.ledger
            .get_usage(&ConcreteResource::new(resource.clone(), ParamBindings::new()))
            .unwrap()
            .unwrap()
    }
}

pub(crate) fn node(name: &str) -> InstanceId {
    InstanceId::new(name).unwrap()
}

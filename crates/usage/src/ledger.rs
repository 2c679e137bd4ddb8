use std::sync::Arc;

use boson_catalog::{ResourceRecord, ServiceRecord};
use boson_primitives::{
    Clock, ConcreteResource, InstanceId, ParamBindings, ResourceKey, ServiceName, UnixMillis,
};
use boson_storage::{DEFAULT_TRANSACTION_ATTEMPTS, Database, Transaction};
use tracing::{debug, info};

use crate::metrics::UsageMetrics;
use crate::{Freshness, FreshnessGate, UsageConfig, UsageError, UsageRecord, Usages};

/// Records instance usage reports and serves usage snapshots.
#[derive(Debug, Clone)]
pub struct UsageLedger {
    db: Database,
    clock: Arc<dyn Clock>,
    gate: FreshnessGate,
    refresh_after: Option<u32>,
    max_attempts: u32,
    metrics: UsageMetrics,
}

impl UsageLedger {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: UsageConfig) -> Self {
        Self {
            db,
            clock,
            gate: FreshnessGate::new(config.staleness_threshold),
            refresh_after: config.refresh_after,
            max_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
            metrics: UsageMetrics::default(),
        }
    }

    /// Override the number of attempts for conflicting transactions.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// The freshness gate applied by this ledger.
    pub fn gate(&self) -> FreshnessGate {
        self.gate
    }

    /// Record that `instance` currently has `in_use` units of a resource.
    ///
    /// The resource must be reservable and `params` must bind every required
    /// parameter. Restarts the admission countdown of the usage document.
    pub fn report_usage(
        &self,
        instance: &InstanceId,
        resource: &ResourceKey,
        params: ParamBindings,
        in_use: u64,
    ) -> Result<UsageRecord, UsageError> {
        let in_use = i64::try_from(in_use).unwrap_or(i64::MAX);

        let record = self.db.transact(self.max_attempts, |tx| {
            let concrete = ResourceRecord::load(tx, resource)?.concrete_reservable(params.clone())?;
            let now = self.clock.now();
            let mut usage = Self::load_or_default(tx, &concrete, now)?;
            usage.report(instance.clone(), in_use, now);
            usage.arm_refresh(self.refresh_after);
            tx.put::<Usages>(&concrete.storage_key(), &usage)?;
            Ok::<_, UsageError>(usage)
        })?;

        self.metrics.reports_total.increment(1);
        debug!(resource = %record.resource, %instance, in_use, "usage reported");
        Ok(record)
    }

    /// Whether the usage of `resource` is fresh enough to admit reservations.
    pub fn check_freshness(&self, resource: &ConcreteResource) -> Result<Freshness, UsageError> {
        let usage = self.get_usage(resource)?;
        Ok(self.gate.check(usage.as_ref(), self.clock.now()))
    }

    /// Current usage of `resource`, if anything was ever recorded for it.
    pub fn get_usage(&self, resource: &ConcreteResource) -> Result<Option<UsageRecord>, UsageError> {
        self.db.read(|tx| {
            Ok(tx.get::<Usages>(&resource.storage_key())?)
        })
    }

    /// Usage of every concrete instantiation of `resource` whose bindings
    /// include all of `filter`.
    pub fn list_usage(
        &self,
        resource: &ResourceKey,
        filter: &ParamBindings,
    ) -> Result<Vec<UsageRecord>, UsageError> {
        let rows = self.db.read(|tx| {
            tx.scan::<Usages>(&resource.storage_key())
        })?;

        Ok(rows
            .into_iter()
            .map(|(_, usage)| usage)
            .filter(|usage| usage.resource.resource == *resource)
            .filter(|usage| {
                filter
                    .iter()
                    .all(|(name, value)| usage.resource.bindings.get(name) == Some(value))
            })
            .collect())
    }

    /// Drop a decommissioned instance from every usage document of
    /// `service`. Returns the number of documents changed.
    pub fn forget_instance(
        &self,
        service: &ServiceName,
        instance: &InstanceId,
    ) -> Result<usize, UsageError> {
        let changed = self.db.transact(self.max_attempts, |tx| {
            ServiceRecord::load(tx, service)?;
            let now = self.clock.now();
            let mut changed = 0;
            for (key, mut usage) in tx.scan::<Usages>(&ResourceKey::service_prefix(service))? {
                if usage.forget(instance, now) {
                    tx.put::<Usages>(&key, &usage)?;
                    changed += 1;
                }
            }
            Ok::<_, UsageError>(changed)
        })?;

        self.metrics.forgotten_total.increment(changed as u64);
        info!(%service, %instance, records = changed, "instance forgotten");
        Ok(changed)
    }

    /// Load the usage document of `resource` inside a transaction, or an
    /// empty one if none exists yet.
    pub fn load_or_default(
        tx: &mut Transaction<'_>,
        resource: &ConcreteResource,
        now: UnixMillis,
    ) -> Result<UsageRecord, UsageError> {
        Ok(tx
            .get::<Usages>(&resource.storage_key())?
            .unwrap_or_else(|| UsageRecord::new(resource.clone(), now)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use boson_catalog::{Catalog, CatalogError, InvalidResourceReason};
    use boson_primitives::{ManualClock, ParamName, ResourceKind, ResourceName};

    use super::*;

    struct Fixture {
        ledger: UsageLedger,
        clock: Arc<ManualClock>,
        instances: ResourceKey,
        cores: ResourceKey,
    }

    fn setup() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000));
        let db = Database::in_memory();
        let catalog = Catalog::new(db.clone(), clock.clone());

        let compute = ServiceName::new("compute").unwrap();
        catalog.register_service(&compute).unwrap();
        let instances = catalog
            .register_resource(
                &compute,
                &ResourceName::new("instances").unwrap(),
                [ParamName::new("zone").unwrap()],
                ResourceKind::Reservable,
            )
            .unwrap()
            .key;
        let cores = catalog
            .register_resource(&compute, &ResourceName::new("cores").unwrap(), [], ResourceKind::Absolute)
            .unwrap()
            .key;

        Fixture {
            ledger: UsageLedger::new(db, clock.clone(), UsageConfig::default()),
            clock,
            instances,
            cores,
        }
    }

    fn zone(value: &str) -> ParamBindings {
        ParamBindings::new().with(ParamName::new("zone").unwrap(), value)
    }

    fn node(name: &str) -> InstanceId {
        InstanceId::new(name).unwrap()
    }

    #[test]
    fn test_report_and_get() {
        let f = setup();
        f.ledger.report_usage(&node("a"), &f.instances, zone("eu"), 2).unwrap();
        let usage = f.ledger.report_usage(&node("b"), &f.instances, zone("eu"), 3).unwrap();
        assert_eq!(usage.in_use(), 5);

        let concrete = ConcreteResource::new(f.instances.clone(), zone("eu"));
        let stored = f.ledger.get_usage(&concrete).unwrap().unwrap();
        assert_eq!(stored, usage);
        assert!(f.ledger.get_usage(&ConcreteResource::new(f.instances.clone(), zone("us"))).unwrap().is_none());
    }

    #[test]
    fn test_report_rejects_invalid_resources() {
        let f = setup();
        assert_matches!(
            f.ledger.report_usage(&node("a"), &f.instances, ParamBindings::new(), 1),
            Err(UsageError::Catalog(CatalogError::InvalidResource {
                reason: InvalidResourceReason::Abstract { .. },
                ..
            }))
        );
        assert_matches!(
            f.ledger.report_usage(&node("a"), &f.cores, ParamBindings::new(), 1),
            Err(UsageError::Catalog(CatalogError::InvalidResource {
                reason: InvalidResourceReason::Absolute,
                ..
            }))
        );
    }

    #[test]
    fn test_freshness_follows_reports() {
        let f = setup();
        let concrete = ConcreteResource::new(f.instances.clone(), zone("eu"));
        f.ledger.report_usage(&node("a"), &f.instances, zone("eu"), 1).unwrap();
        assert_eq!(f.ledger.check_freshness(&concrete).unwrap(), Freshness::Fresh);

        f.clock.advance(Duration::from_secs(61));
        assert!(f.ledger.check_freshness(&concrete).unwrap().is_stale());

        f.ledger.report_usage(&node("a"), &f.instances, zone("eu"), 1).unwrap();
        assert_eq!(f.ledger.check_freshness(&concrete).unwrap(), Freshness::Fresh);
    }

    #[test]
    fn test_report_arms_refresh_countdown() {
        let mut f = setup();
        let config = UsageConfig {
            refresh_after: Some(3),
            ..UsageConfig::default()
        };
        f.ledger = UsageLedger::new(f.ledger.db.clone(), f.clock.clone(), config);

        let usage = f.ledger.report_usage(&node("a"), &f.instances, zone("eu"), 1).unwrap();
        assert_eq!(usage.until_refresh, Some(3));
    }

    #[test]
    fn test_list_usage_partial_match() {
        let f = setup();
        f.ledger.report_usage(&node("a"), &f.instances, zone("eu"), 1).unwrap();
        f.ledger.report_usage(&node("a"), &f.instances, zone("us"), 2).unwrap();

        assert_eq!(f.ledger.list_usage(&f.instances, &ParamBindings::new()).unwrap().len(), 2);
        let eu = f.ledger.list_usage(&f.instances, &zone("eu")).unwrap();
        assert_eq!(eu.len(), 1);
        assert_eq!(eu[0].in_use(), 1);
    }

    #[test]
    fn test_forget_instance() {
        let f = setup();
        f.ledger.report_usage(&node("a"), &f.instances, zone("eu"), 1).unwrap();
        f.ledger.report_usage(&node("b"), &f.instances, zone("eu"), 2).unwrap();
        f.ledger.report_usage(&node("a"), &f.instances, zone("us"), 2).unwrap();

        f.clock.advance(Duration::from_secs(120));
        f.ledger.report_usage(&node("b"), &f.instances, zone("eu"), 2).unwrap();
        let concrete = ConcreteResource::new(f.instances.clone(), zone("eu"));
        assert!(f.ledger.check_freshness(&concrete).unwrap().is_stale());

        let compute = ServiceName::new("compute").unwrap();
        assert_eq!(f.ledger.forget_instance(&compute, &node("a")).unwrap(), 2);
        assert_eq!(f.ledger.check_freshness(&concrete).unwrap(), Freshness::Fresh);
        assert_eq!(f.ledger.get_usage(&concrete).unwrap().unwrap().in_use(), 2);
    }
}

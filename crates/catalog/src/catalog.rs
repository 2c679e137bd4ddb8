use std::sync::Arc;

use boson_primitives::{
    Clock, ParamBindings, ParamName, ResourceKey, ResourceKind, ResourceName, ResourceRef,
    ServiceName, UnixMillis,
};
use boson_storage::{DEFAULT_TRANSACTION_ATTEMPTS, Database};
use tracing::{debug, warn};

use crate::{CatalogError, ResourceRecord, Resources, ServiceRecord, Services};

/// Registry of services and their resources.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl Catalog {
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

    /// Register a service, or refresh its last-seen marker.
    pub fn register_service(&self, name: &ServiceName) -> Result<ServiceRecord, CatalogError> {
        let now = self.clock.now();
        self.db.transact(self.max_attempts, |tx| {
            let record = match tx.get::<Services>(name.as_str())? {
                Some(existing) => ServiceRecord {
                    last_seen: now,
                    ..existing
                },
                None => {
                    debug!(service = %name, "registering service");
                    ServiceRecord {
                        name: name.clone(),
                        created_at: now,
                        last_seen: now,
                    }
                }
            };
            tx.put::<Services>(name.as_str(), &record)?;
            Ok(record)
        })
    }

    /// Look up a service.
    pub fn lookup_service(&self, name: &ServiceName) -> Result<ServiceRecord, CatalogError> {
        self.db
            .read(|tx| ServiceRecord::load(tx, name))
    }

    /// Every registered service, ordered by name.
    pub fn list_services(&self) -> Result<Vec<ServiceRecord>, CatalogError> {
        self.db.read(|tx| {
            Ok(tx
                .scan::<Services>("")?
                .into_iter()
                .map(|(_, record)| record)
                .collect())
        })
    }

    /// Register a resource definition, or refresh its last-seen marker.
    ///
    /// Registering a different parameter set or kind for an existing resource
    /// replaces the definition.
    pub fn register_resource(
        &self,
        service: &ServiceName,
        name: &ResourceName,
        params: impl IntoIterator<Item = ParamName>,
        kind: ResourceKind,
    ) -> Result<ResourceRecord, CatalogError> {
        let mut params: Vec<ParamName> = params.into_iter().collect();
        params.sort();
        params.dedup();

        let key = ResourceKey::new(service.clone(), name.clone());
        let now = self.clock.now();

        self.db.transact(self.max_attempts, |tx| {
            ServiceRecord::load(tx, service)?;

            let record = match tx.get::<Resources>(&key.storage_key())? {
                Some(existing) if existing.same_definition(&params, kind) => ResourceRecord {
                    last_seen: now,
                    ..existing
                },
                Some(existing) => {
                    warn!(
                        resource = %key,
                        old_kind = %existing.kind,
                        new_kind = %kind,
                        "resource definition changed on re-registration"
                    );
                    ResourceRecord {
                        params: params.clone(),
                        kind,
                        last_seen: now,
                        ..existing
                    }
                }
                None => {
                    debug!(resource = %key, %kind, "registering resource");
                    ResourceRecord {
                        key: key.clone(),
                        params: params.clone(),
                        kind,
                        created_at: now,
                        last_seen: now,
                    }
                }
            };
            tx.put::<Resources>(&key.storage_key(), &record)?;
            Ok(record)
        })
    }

    /// Look up a resource definition.
    pub fn lookup_resource(&self, key: &ResourceKey) -> Result<ResourceRecord, CatalogError> {
        self.db
            .read(|tx| ResourceRecord::load(tx, key))
    }

    /// Every resource of `service`, ordered by name.
    pub fn list_resources(&self, service: &ServiceName) -> Result<Vec<ResourceRecord>, CatalogError> {
        self.db.read(|tx| {
            ServiceRecord::load(tx, service)?;
            Ok(tx
                .scan::<Resources>(&ResourceKey::service_prefix(service))?
                .into_iter()
                .map(|(_, record)| record)
                .collect())
        })
    }

    /// Resources of `service` not registered since `older_than`.
    pub fn deprecated_resources(
        &self,
        service: &ServiceName,
        older_than: UnixMillis,
    ) -> Result<Vec<ResourceRecord>, CatalogError> {
        let mut resources = self.list_resources(service)?;
        resources.retain(|r| r.last_seen < older_than);
        Ok(resources)
    }

    /// Look up a resource and classify `provided` against it.
    pub fn classify(
        &self,
        key: &ResourceKey,
        provided: ParamBindings,
    ) -> Result<ResourceRef, CatalogError> {
        self.lookup_resource(key)?.classify(provided)
    }
}

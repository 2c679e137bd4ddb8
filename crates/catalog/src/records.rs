use boson_primitives::{
    ConcreteResource, ParamBindings, ParamName, ResourceKey, ResourceKind, ResourceRef,
    ServiceName, UnixMillis,
};
use boson_storage::{Transaction, table};
use serde::{Deserialize, Serialize};

use crate::{CatalogError, InvalidResourceReason};

/// A registered client service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: ServiceName,
    pub created_at: UnixMillis,
    pub last_seen: UnixMillis,
}

/// A registered resource definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub key: ResourceKey,
    /// Required parameter names, sorted and without duplicates.
    pub params: Vec<ParamName>,
    pub kind: ResourceKind,
    pub created_at: UnixMillis,
    /// Last time the owning service registered this resource.
    pub last_seen: UnixMillis,
}

table!(
    /// Registered services, keyed by service name.
    pub Services, "services", ServiceRecord
);

table!(
    /// Registered resources, keyed by `service/name`.
    pub Resources, "resources", ResourceRecord
);

impl ServiceRecord {
    /// Load a service inside a transaction.
    pub fn load(tx: &mut Transaction<'_>, name: &ServiceName) -> Result<Self, CatalogError> {
        tx.get::<Services>(name.as_str())?
            .ok_or_else(|| CatalogError::ServiceNotFound {
                service: name.clone(),
            })
    }
}

impl ResourceRecord {
    /// Load a resource definition inside a transaction.
    pub fn load(tx: &mut Transaction<'_>, key: &ResourceKey) -> Result<Self, CatalogError> {
        tx.get::<Resources>(&key.storage_key())?
            .ok_or_else(|| CatalogError::ResourceNotFound {
                resource: key.clone(),
            })
    }

    /// Classify `provided` bindings against this definition.
    ///
    /// The result is concrete when every required parameter is bound.
    /// Supplying a parameter the resource does not declare is an error.
    pub fn classify(&self, provided: ParamBindings) -> Result<ResourceRef, CatalogError> {
        let unknown: Vec<ParamName> = provided
            .names()
            .filter(|name| self.params.binary_search(name).is_err())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(CatalogError::InvalidParameters {
                resource: self.key.clone(),
                unknown,
            });
        }

        let missing: Vec<ParamName> = self
            .params
            .iter()
            .filter(|name| !provided.contains(name))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(ResourceRef::Concrete(ConcreteResource::new(
                self.key.clone(),
                provided,
            )))
        } else {
            Ok(ResourceRef::Abstract {
                resource: self.key.clone(),
                missing,
            })
        }
    }

    /// Classify `provided` and require a concrete, reservable result.
    ///
    /// This is the check every usage report and reservation goes through.
    pub fn concrete_reservable(
        &self,
        provided: ParamBindings,
    ) -> Result<ConcreteResource, CatalogError> {
        if !self.kind.is_reservable() {
            return Err(CatalogError::InvalidResource {
                resource: self.key.clone(),
                reason: InvalidResourceReason::Absolute,
            });
        }
        match self.classify(provided)? {
            ResourceRef::Concrete(concrete) => Ok(concrete),
            ResourceRef::Abstract { resource, missing } => Err(CatalogError::InvalidResource {
                resource,
                reason: InvalidResourceReason::Abstract { missing },
            }),
        }
    }

    /// Whether the definition matches `params` and `kind`.
    pub(crate) fn same_definition(&self, params: &[ParamName], kind: ResourceKind) -> bool {
        self.params == params && self.kind == kind
    }
}

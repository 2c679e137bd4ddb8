use boson_catalog::CatalogError;
use boson_primitives::ConcreteResource;
use boson_storage::StorageError;

/// Usage ledger error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// Catalog failure: unknown, abstract or absolute resource.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The delta does not fit the usage counters of the resource.
    #[error("usage of {resource} cannot absorb a delta of {delta}")]
    Overflow {
        /// The resource.
        resource: ConcreteResource,
        /// The rejected delta.
        delta: i64,
    },
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

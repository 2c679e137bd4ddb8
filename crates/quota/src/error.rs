use boson_catalog::CatalogError;
use boson_primitives::ResourceKey;
use boson_storage::StorageError;

/// Quota error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// No quota matches the request at any scope.
    #[error("no applicable quota for {resource}")]
    NoApplicableQuota {
        /// The resource.
        resource: ResourceKey,
    },
    /// Catalog failure, including unknown resources.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

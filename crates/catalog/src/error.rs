use boson_primitives::{ParamName, ResourceKey, ServiceName};
use boson_storage::StorageError;

/// Catalog error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The service has not been registered.
    #[error("service {service} not found")]
    ServiceNotFound {
        /// Requested service.
        service: ServiceName,
    },
    /// The resource has not been registered.
    #[error("resource {resource} not found")]
    ResourceNotFound {
        /// Requested resource.
        resource: ResourceKey,
    },
    /// Parameters were supplied that the resource does not declare.
    #[error("resource {resource} has no parameters named {}", join(.unknown))]
    InvalidParameters {
        /// The resource.
        resource: ResourceKey,
        /// Supplied parameter names the resource does not declare.
        unknown: Vec<ParamName>,
    },
    /// The resource cannot be the target of usage or reservations.
    #[error("resource {resource} is {reason}")]
    InvalidResource {
        /// The resource.
        resource: ResourceKey,
        /// Why it was rejected.
        reason: InvalidResourceReason,
    },
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a resource cannot carry usage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidResourceReason {
    /// Required parameters are unbound.
    #[error("abstract (missing {})", join(.missing))]
    Abstract {
        /// Unbound required parameters.
        missing: Vec<ParamName>,
    },
    /// Absolute resources are enforced by the caller.
    #[error("absolute")]
    Absolute,
}

fn join(names: &[ParamName]) -> String {
    names
        .iter()
        .map(ParamName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

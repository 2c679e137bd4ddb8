use boson_catalog::{CatalogError, InvalidResourceReason};
use boson_primitives::{
    ConcreteResource, ParamName, ReservationId, ReservationState, ResourceKey, ServiceName,
};
use boson_quota::QuotaError;
use boson_storage::StorageError;
use boson_usage::UsageError;

/// Reservation engine error type.
///
/// Every failure of a batch or id list leaves storage untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    /// The service is not registered.
    #[error("service {service} not found")]
    ServiceNotFound {
        /// Requested service.
        service: ServiceName,
    },
    /// The resource is not registered.
    #[error("resource {resource} not found")]
    ResourceNotFound {
        /// Requested resource.
        resource: ResourceKey,
    },
    /// No reservation has this id.
    #[error("reservation {id} not found")]
    ReservationNotFound {
        /// Requested reservation.
        id: ReservationId,
    },
    /// Parameters were supplied that the resource does not declare.
    #[error("resource {resource} has no parameters named {unknown:?}")]
    InvalidParameters {
        /// The resource.
        resource: ResourceKey,
        /// Undeclared parameter names.
        unknown: Vec<ParamName>,
    },
    /// The resource is abstract or absolute.
    #[error("resource {resource} is {reason}")]
    InvalidResource {
        /// The resource.
        resource: ResourceKey,
        /// Why it cannot be reserved.
        reason: InvalidResourceReason,
    },
    /// No quota applies to the request.
    #[error("no applicable quota for {resource}")]
    NoApplicableQuota {
        /// The resource.
        resource: ResourceKey,
    },
    /// Admitting the delta would exceed the limit.
    #[error("quota exceeded for {resource}: {current} + {delta} > {limit}")]
    QuotaExceeded {
        /// The resource.
        resource: ConcreteResource,
        /// The resolved limit.
        limit: u64,
        /// In-use plus reserved before this item.
        current: i128,
        /// Requested delta.
        delta: i64,
    },
    /// The delta does not fit the usage counters of the resource.
    #[error("usage of {resource} cannot absorb a delta of {delta}")]
    UsageOverflow {
        /// The resource.
        resource: ConcreteResource,
        /// Rejected delta.
        delta: i64,
    },
    /// Usage reports are too old; the listed resources must be refreshed.
    #[error("usage of {} resource(s) is stale", .resources.len())]
    StaleUsage {
        /// Resources whose usage must be refreshed.
        resources: Vec<ConcreteResource>,
    },
    /// The reservation was created by a different principal.
    #[error("not authorized to resolve reservation {id}")]
    AuthorizationFailure {
        /// The reservation.
        id: ReservationId,
    },
    /// The reservation cannot make the requested transition.
    #[error("reservation {id} is {state}{}", if *.expired { " and expired" } else { "" })]
    InvalidState {
        /// The reservation.
        id: ReservationId,
        /// Its current state.
        state: ReservationState,
        /// Whether it is past its expiry.
        expired: bool,
    },
    /// Concurrent writers kept invalidating the transaction.
    #[error("gave up after {attempts} conflicting attempts")]
    Conflict {
        /// Attempts made.
        attempts: u32,
    },
    /// Storage failure.
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ReservationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RetriesExhausted { attempts } => Self::Conflict { attempts },
            other => Self::Storage(other),
        }
    }
}

impl From<CatalogError> for ReservationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ServiceNotFound { service } => Self::ServiceNotFound { service },
            CatalogError::ResourceNotFound { resource } => Self::ResourceNotFound { resource },
            CatalogError::InvalidParameters { resource, unknown } => {
                Self::InvalidParameters { resource, unknown }
            }
            CatalogError::InvalidResource { resource, reason } => {
                Self::InvalidResource { resource, reason }
            }
            CatalogError::Storage(err) => err.into(),
        }
    }
}

impl From<QuotaError> for ReservationError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::NoApplicableQuota { resource } => Self::NoApplicableQuota { resource },
            QuotaError::Catalog(err) => err.into(),
            QuotaError::Storage(err) => err.into(),
        }
    }
}

impl From<UsageError> for ReservationError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::Catalog(err) => err.into(),
            UsageError::Overflow { resource, delta } => Self::UsageOverflow { resource, delta },
            UsageError::Storage(err) => err.into(),
        }
    }
}

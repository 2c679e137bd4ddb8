use std::time::Duration;

use boson_primitives::{AuthContext, InstanceId, ParamBindings, ResourceKey};

/// One resource and delta of a [`ReservationBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationItem {
    pub resource: ResourceKey,
    /// Must bind every required parameter of the resource.
    pub params: ParamBindings,
    /// Units to allocate (positive) or release (negative).
    pub delta: i64,
}

/// A set of reservations that is admitted or rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationBatch {
    /// Principal making the request.
    pub auth: AuthContext,
    /// Instance that will perform the allocation.
    pub instance: InstanceId,
    /// Caller-supplied correlation id; generated when absent.
    pub correlation_id: Option<String>,
    /// Lifetime override.
    pub ttl: Option<Duration>,
    /// Create negative items as committed and apply them immediately.
    pub auto_commit_releases: bool,
    pub items: Vec<ReservationItem>,
}

impl ReservationBatch {
    pub fn new(auth: AuthContext, instance: InstanceId) -> Self {
        Self {
            auth,
            instance,
            correlation_id: None,
            ttl: None,
            auto_commit_releases: false,
            items: Vec::new(),
        }
    }

    /// Add an item.
    pub fn with_item(mut self, resource: ResourceKey, params: ParamBindings, delta: i64) -> Self {
        self.items.push(ReservationItem {
            resource,
            params,
            delta,
        });
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_auto_commit_releases(mut self, enabled: bool) -> Self {
        self.auto_commit_releases = enabled;
        self
    }
}

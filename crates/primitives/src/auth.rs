//! Authentication context attached to every request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity and quota-class claims produced by the authentication layer.
///
/// The engine only reads the tenant and quota class for quota priority
/// resolution; the full context is stored on reservations so that commit and
/// rollback can be restricted to the originator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthContext {
    /// Tenant (project) the request acts on behalf of.
    pub tenant: String,
    /// Quota class assigned to the tenant, if any.
    #[serde(default)]
    pub quota_class: Option<String>,
    /// Authenticated user, if the service provides one.
    #[serde(default)]
    pub user: Option<String>,
    /// Other service-specific claims.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl AuthContext {
    /// Context for `tenant` with no class, user or extra attributes.
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            quota_class: None,
            user: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the quota class.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.quota_class = Some(class.into());
        self
    }

    /// Set the user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Add a service-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether `other` is the same principal as `self`.
    pub fn same_principal(&self, other: &Self) -> bool {
        self == other
    }
}

use core::fmt;

use boson_primitives::{AuthContext, ResourceKey};
use serde::{Deserialize, Serialize};

/// Specificity level of a quota scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeLevel {
    /// Applies to one tenant.
    Tenant,
    /// Applies to every tenant of a quota class.
    Class,
    /// Applies to everyone.
    Default,
}

/// Scope levels from most to least specific.
pub const RESOLUTION_ORDER: [ScopeLevel; 3] =
    [ScopeLevel::Tenant, ScopeLevel::Class, ScopeLevel::Default];

impl ScopeLevel {
    /// The scope at this level that a request with `auth` falls into, if any.
    pub fn scope_for(self, auth: &AuthContext) -> Option<QuotaScope> {
        match self {
            Self::Tenant => Some(QuotaScope::Tenant(auth.tenant.clone())),
            Self::Class => auth.quota_class.clone().map(QuotaScope::Class),
            Self::Default => Some(QuotaScope::Default),
        }
    }
}

/// Partial authentication context a quota is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// Applies when nothing more specific does.
    Default,
    /// Applies to requests carrying this quota class.
    Class(String),
    /// Applies to requests of this tenant.
    Tenant(String),
}

impl QuotaScope {
    /// Specificity level.
    pub const fn level(&self) -> ScopeLevel {
        match self {
            Self::Default => ScopeLevel::Default,
            Self::Class(_) => ScopeLevel::Class,
            Self::Tenant(_) => ScopeLevel::Tenant,
        }
    }

    /// Whether a request with `auth` falls into this scope.
    pub fn matches(&self, auth: &AuthContext) -> bool {
        match self {
            Self::Default => true,
            Self::Class(class) => auth.quota_class.as_deref() == Some(class.as_str()),
            Self::Tenant(tenant) => auth.tenant == *tenant,
        }
    }

    /// Key of the quota document for `resource` at this scope.
    pub fn storage_key(&self, resource: &ResourceKey) -> String {
        format!("{}{self}", Self::resource_prefix(resource))
    }

    /// Prefix shared by every quota document of `resource`.
    pub fn resource_prefix(resource: &ResourceKey) -> String {
        format!("{}#", resource.storage_key())
    }
}

impl fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
            for ch in value.chars() {
                match ch {
                    '%' => f.write_str("%25")?,
                    '#' => f.write_str("%23")?,
                    c => write!(f, "{c}")?,
                }
            }
            Ok(())
        }

        match self {
            Self::Default => f.write_str("default"),
            Self::Class(class) => {
                f.write_str("class=")?;
                escaped(f, class)
            }
            Self::Tenant(tenant) => {
                f.write_str("tenant=")?;
                escaped(f, tenant)
            }
        }
    }
}

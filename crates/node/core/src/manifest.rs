//! Seed manifest registered when a node starts.
//!
//! ```toml
//! [[services]]
//! name = "compute"
//!
//! [[services.resources]]
//! name = "instances"
//! params = ["zone"]
//! kind = "reservable"
//!
//! [[services.resources.quotas]]
//! limit = 10                  # default scope
//!
//! [[services.resources.quotas]]
//! class = "gold"
//! limit = 20
//!
//! [[services.resources.quotas]]
//! tenant = "t1"               # no limit: unlimited
//! ```

use std::fs;
use std::path::Path;

use boson_primitives::{Limit, ParamName, ResourceKind, ResourceName, ServiceName};
use boson_quota::QuotaScope;
use eyre::{Result, WrapErr, bail};
use serde::{Deserialize, Serialize};

/// Services, resources and quotas to register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedManifest {
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceEntry {
    pub name: ServiceName,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    /// Hierarchical name, `/`-separated.
    pub name: ResourceName,
    /// Required parameter names.
    #[serde(default)]
    pub params: Vec<ParamName>,
    pub kind: ResourceKind,
    #[serde(default)]
    pub quotas: Vec<QuotaEntry>,
}

/// A quota; at most one of `class` and `tenant` may be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Absent means unlimited.
    #[serde(default)]
    pub limit: Limit,
}

impl QuotaEntry {
    /// The scope this quota is bound to.
    pub fn scope(&self) -> Result<QuotaScope> {
        match (&self.class, &self.tenant) {
            (None, None) => Ok(QuotaScope::Default),
            (Some(class), None) => Ok(QuotaScope::Class(class.clone())),
            (None, Some(tenant)) => Ok(QuotaScope::Tenant(tenant.clone())),
            (Some(_), Some(_)) => bail!("a quota cannot be scoped to both a class and a tenant"),
        }
    }
}

impl SeedManifest {
    /// Load a manifest from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read seed manifest {}", path.display()))?;
        Self::from_toml(&content)
            .wrap_err_with(|| format!("invalid seed manifest {}", path.display()))
    }

    /// Parse and validate a TOML manifest.
    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        for service in &manifest.services {
            for resource in &service.resources {
                for quota in &resource.quotas {
                    quota.scope().wrap_err_with(|| {
                        format!("quota of {}/{}", service.name, resource.name)
                    })?;
                }
            }
        }
        Ok(manifest)
    }
}

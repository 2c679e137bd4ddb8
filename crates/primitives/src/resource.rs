//! Resource identity types.
//!
//! Whether a resource reference is abstract or concrete is never stored; it is
//! derived from the resource's required parameters and the bindings a caller
//! supplied, and represented as a [`ResourceRef`] so that quota targets and
//! usage targets cannot be confused.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ParamName, ResourceName, ServiceName};

// ============================================================================
// ResourceKind
// ============================================================================

/// How a resource is limited.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    /// Point-in-time limit only; never accrues usage or reservations.
    Absolute,
    /// Tracked in-use count with two-phase reservations.
    Reservable,
}

impl ResourceKind {
    /// Returns `true` for reservable resources.
    pub const fn is_reservable(self) -> bool {
        matches!(self, Self::Reservable)
    }
}

// ============================================================================
// ResourceKey
// ============================================================================

/// Canonical identity of an abstract resource: `service/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Owning service.
    pub service: ServiceName,
    /// Resource name within the service.
    pub name: ResourceName,
}

impl ResourceKey {
    /// Create a new resource key.
    pub fn new(service: ServiceName, name: ResourceName) -> Self {
        Self { service, name }
    }

    /// Key used for the resource's document in storage.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.service, self.name)
    }

    /// Prefix shared by every resource document of `service`.
    pub fn service_prefix(service: &ServiceName) -> String {
        format!("{service}/")
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.name)
    }
}

// ============================================================================
// ParamBindings
// ============================================================================

/// Values bound to resource parameters, ordered by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamBindings(BTreeMap<ParamName, String>);

impl ParamBindings {
    /// Empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: ParamName, value: impl Into<String>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    /// Bind `name` to `value`, returning the previous value if any.
    pub fn insert(&mut self, name: ParamName, value: impl Into<String>) -> Option<String> {
        self.0.insert(name, value.into())
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &ParamName) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &ParamName) -> bool {
        self.0.contains_key(name)
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameter is bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bound parameter names, in order.
    pub fn names(&self) -> impl Iterator<Item = &ParamName> {
        self.0.keys()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParamName, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Keep only the bindings for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&ParamName) -> bool) {
        self.0.retain(|k, _| keep(k));
    }
}

impl FromIterator<(ParamName, String)> for ParamBindings {
    fn from_iter<T: IntoIterator<Item = (ParamName, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Percent-escape the characters that delimit storage keys.
fn escape_value(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '#' => out.push_str("%23"),
            c => out.push(c),
        }
    }
}

// ============================================================================
// ConcreteResource
// ============================================================================

/// A resource with a bound value for every required parameter.
///
/// Target of usage and reservation records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConcreteResource {
    /// The abstract resource this instantiates.
    pub resource: ResourceKey,
    /// Exactly the resource's required parameters.
    pub bindings: ParamBindings,
}

impl ConcreteResource {
    /// Create a concrete resource.
    ///
    /// Callers are expected to have classified the bindings against the
    /// resource definition; see the catalog crate.
    pub fn new(resource: ResourceKey, bindings: ParamBindings) -> Self {
        Self { resource, bindings }
    }

    /// Key used for the usage document of this resource.
    ///
    /// `service/name` when there are no parameters, otherwise
    /// `service/name?p1=v1&p2=v2` with parameters in name order and values
    /// escaped.
    pub fn storage_key(&self) -> String {
        let mut key = self.resource.storage_key();
        for (i, (name, value)) in self.bindings.iter().enumerate() {
            key.push(if i == 0 { '?' } else { '&' });
            key.push_str(name.as_str());
            key.push('=');
            escape_value(value, &mut key);
        }
        key
    }
}

impl fmt::Display for ConcreteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

// ============================================================================
// ResourceRef
// ============================================================================

/// A resource reference classified against its definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    /// One or more required parameters are unbound.
    Abstract {
        /// The resource.
        resource: ResourceKey,
        /// Required parameters without a binding.
        missing: Vec<ParamName>,
    },
    /// Every required parameter is bound.
    Concrete(ConcreteResource),
}

impl ResourceRef {
    /// The abstract resource behind this reference.
    pub fn resource(&self) -> &ResourceKey {
        match self {
            Self::Abstract { resource, .. } => resource,
            Self::Concrete(concrete) => &concrete.resource,
        }
    }

    /// Whether every required parameter is bound.
    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Concrete(_))
    }

    /// The concrete resource, if this reference is concrete.
    pub fn into_concrete(self) -> Option<ConcreteResource> {
        match self {
            Self::Concrete(concrete) => Some(concrete),
            Self::Abstract { .. } => None,
        }
    }
}

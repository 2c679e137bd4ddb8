//! Validated name types.
//!
//! Names end up inside storage keys, so the characters used as key
//! delimiters (`/`, `?`, `&`, `=`, `#`, `%`) and whitespace are rejected.
//! Resource names may be hierarchical and are the only names allowed to
//! contain `/`, as a segment separator.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

const RESERVED: &[char] = &['/', '?', '&', '=', '#', '%'];

/// Error returned when a name fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The name (or one of its segments) is empty.
    #[error("{kind} name must not be empty")]
    Empty {
        /// What kind of name was rejected.
        kind: &'static str,
    },
    /// The name contains a reserved character.
    #[error("{kind} name {name:?} contains reserved character {ch:?}")]
    Reserved {
        /// What kind of name was rejected.
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// The offending character.
        ch: char,
    },
}

fn validate_segment(kind: &'static str, full: &str, segment: &str) -> Result<(), NameError> {
    if segment.is_empty() {
        return Err(NameError::Empty { kind });
    }
    if let Some(ch) = segment
        .chars()
        .find(|c| c.is_whitespace() || RESERVED.contains(c))
    {
        return Err(NameError::Reserved {
            kind,
            name: full.to_string(),
            ch,
        });
    }
    Ok(())
}

macro_rules! flat_name {
    ($(#[$meta:meta])* $ty:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $ty(String);

        impl $ty {
            /// Validate and wrap a name.
            pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
                let name = name.into();
                validate_segment($kind, &name, &name)?;
                Ok(Self(name))
            }

            /// The name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = NameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = NameError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

flat_name!(
    /// Name of a client service, unique within a deployment (e.g. `compute`).
    ServiceName,
    "service"
);

flat_name!(
    /// Name of a required resource parameter (e.g. `flavor`).
    ParamName,
    "parameter"
);

flat_name!(
    /// Identifier of a physical instance of a client service that reports usage.
    InstanceId,
    "instance"
);

/// Hierarchical resource name scoped to a service (e.g. `instances` or
/// `volumes/snapshots`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    /// Validate and wrap a resource name.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NameError::Empty { kind: "resource" });
        }
        for segment in name.split('/') {
            validate_segment("resource", &name, segment)?;
        }
        Ok(Self(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-separated segments of the name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResourceName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ResourceName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceName> for String {
    fn from(value: ResourceName) -> Self {
        value.0
    }
}

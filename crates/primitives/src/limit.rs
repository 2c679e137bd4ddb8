//! Quota limits.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The limit of a quota.
///
/// Serialized as an optional integer: `null` (or an absent field) is
/// unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum Limit {
    /// No limit applies.
    #[default]
    Unlimited,
    /// At most this many units may be in use.
    Limited(u64),
}

impl Limit {
    /// Whether raising usage from `current` by `delta` stays within the limit.
    ///
    /// Non-positive deltas are always admitted, even when `current` already
    /// exceeds the limit after the limit was lowered.
    pub fn admits(self, current: i128, delta: i64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(_) if delta <= 0 => true,
            Self::Limited(limit) => current
                .checked_add(i128::from(delta))
                .is_some_and(|projected| projected <= i128::from(limit)),
        }
    }

    /// The numeric limit, or `None` if unlimited.
    pub const fn value(self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Limited(limit) => Some(limit),
        }
    }
}

impl From<Option<u64>> for Limit {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Unlimited, Self::Limited)
    }
}

impl From<Limit> for Option<u64> {
    fn from(value: Limit) -> Self {
        value.value()
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Limited(limit) => write!(f, "{limit}"),
        }
    }
}

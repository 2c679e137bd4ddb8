use std::time::Duration;

use boson_primitives::{InstanceId, UnixMillis};

use crate::UsageRecord;

/// Outcome of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Reports are recent enough to admit reservations.
    Fresh,
    /// Reservations are pending but no instance has ever reported.
    NeverReported,
    /// The usage was admitted against as often as allowed between reports.
    RefreshDue,
    /// These instances have not reported within the threshold.
    Expired {
        /// Instances with outdated reports.
        instances: Vec<InstanceId>,
    },
}

impl Freshness {
    /// Whether the usage must be refreshed before admitting reservations.
    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// Decides whether usage is recent enough to admit new reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessGate {
    threshold: Duration,
}

impl FreshnessGate {
    pub const fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub const fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Check `usage` at time `now`.
    ///
    /// A resource without a usage document is fresh. Instance entries that
    /// only carry committed reservations never expire on their own. Usage
    /// whose admission countdown ran out is stale until the next report.
    pub fn check(&self, usage: Option<&UsageRecord>, now: UnixMillis) -> Freshness {
        let Some(usage) = usage else {
            return Freshness::Fresh;
        };

        let threshold = u64::try_from(self.threshold.as_millis()).unwrap_or(u64::MAX);
        let instances: Vec<InstanceId> = usage
            .instances
            .iter()
            .filter(|(_, i)| {
                i.reported_at
                    .is_some_and(|at| now.saturating_sub(at) > threshold)
            })
            .map(|(id, _)| id.clone())
            .collect();

        if !instances.is_empty() {
            Freshness::Expired { instances }
        } else if usage.refresh_due() {
            Freshness::RefreshDue
        } else if usage.pending > 0 && !usage.has_reports() {
            Freshness::NeverReported
        } else {
            Freshness::Fresh
        }
    }
}

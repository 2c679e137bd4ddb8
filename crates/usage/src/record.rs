use std::collections::BTreeMap;

use boson_primitives::{ConcreteResource, InstanceId, UnixMillis};
use boson_storage::table;
use serde::{Deserialize, Serialize};

use crate::UsageError;

/// In-use count attributed to one service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceUsage {
    /// Units in use on the instance.
    pub in_use: i64,
    /// Time of the instance's last report; `None` if the count only reflects
    /// committed reservations.
    pub reported_at: Option<UnixMillis>,
}

/// Usage of one concrete reservable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub resource: ConcreteResource,
    /// Per-instance in-use counts.
    pub instances: BTreeMap<InstanceId, InstanceUsage>,
    /// Sum of the deltas of pending positive reservations.
    pub reserved: i64,
    /// Number of pending reservations, of either sign.
    pub pending: u32,
    /// Admissions left before a refresh is forced; `None` never forces one.
    pub until_refresh: Option<u32>,
    pub created_at: UnixMillis,
    pub updated_at: UnixMillis,
}

table!(
    /// Usage, keyed by the concrete resource's storage key.
    pub Usages, "usage", UsageRecord
);

impl UsageRecord {
    /// Empty usage for `resource`.
    pub fn new(resource: ConcreteResource, now: UnixMillis) -> Self {
        Self {
            resource,
            instances: BTreeMap::new(),
            reserved: 0,
            pending: 0,
            until_refresh: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of the in-use counts of every instance.
    pub fn in_use(&self) -> i128 {
        self.instances.values().map(|i| i128::from(i.in_use)).sum()
    }

    /// In-use plus reserved; the amount a new reservation is checked against.
    pub fn total(&self) -> i128 {
        self.in_use() + i128::from(self.reserved)
    }

    /// Whether any instance has ever reported.
    pub fn has_reports(&self) -> bool {
        self.instances.values().any(|i| i.reported_at.is_some())
    }

    /// Replace `instance`'s in-use count with a fresh report.
    pub fn report(&mut self, instance: InstanceId, in_use: i64, now: UnixMillis) {
        self.instances.insert(
            instance,
            InstanceUsage {
                in_use,
                reported_at: Some(now),
            },
        );
        self.updated_at = now;
    }

    /// Restart the countdown of admissions until the next forced refresh.
    pub fn arm_refresh(&mut self, admissions: Option<u32>) {
        self.until_refresh = admissions;
    }

    /// Count one admission against the refresh countdown.
    pub fn count_admission(&mut self) {
        if let Some(left) = &mut self.until_refresh {
            *left = left.saturating_sub(1);
        }
    }

    /// Whether the countdown ran out and the usage must be reported again.
    pub fn refresh_due(&self) -> bool {
        self.until_refresh == Some(0)
    }

    /// Account for a new pending reservation.
    ///
    /// Negative deltas are not added to `reserved`, so a release that is
    /// never committed cannot make room for other reservations.
    pub fn reserve(&mut self, delta: i64, now: UnixMillis) -> Result<(), UsageError> {
        if delta > 0 {
            self.reserved = self.reserved.checked_add(delta).ok_or_else(|| self.overflow(delta))?;
        }
        self.pending = self.pending.saturating_add(1);
        self.updated_at = now;
        Ok(())
    }

    /// Remove a pending reservation without applying it.
    pub fn release(&mut self, delta: i64, now: UnixMillis) -> Result<(), UsageError> {
        if delta > 0 {
            self.reserved = self.reserved.checked_sub(delta).ok_or_else(|| self.overflow(delta))?;
        }
        self.pending = self.pending.saturating_sub(1);
        self.updated_at = now;
        Ok(())
    }

    /// Move a pending reservation's delta into `instance`'s in-use count.
    ///
    /// Leaves the record untouched on overflow.
    pub fn commit(
        &mut self,
        instance: &InstanceId,
        delta: i64,
        now: UnixMillis,
    ) -> Result<(), UsageError> {
        self.applied(instance, delta)?;
        self.release(delta, now)?;
        self.apply(instance, delta, now)
    }

    /// Add `delta` to `instance`'s in-use count directly.
    pub fn apply(&mut self, instance: &InstanceId, delta: i64, now: UnixMillis) -> Result<(), UsageError> {
        let in_use = self.applied(instance, delta)?;
        self.instances
            .entry(instance.clone())
            .or_insert(InstanceUsage {
                in_use: 0,
                reported_at: None,
            })
            .in_use = in_use;
        self.updated_at = now;
        Ok(())
    }

    /// Drop `instance`'s contribution. Returns whether it had one.
    pub fn forget(&mut self, instance: &InstanceId, now: UnixMillis) -> bool {
        let removed = self.instances.remove(instance).is_some();
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// `instance`'s in-use count after adding `delta`.
    fn applied(&self, instance: &InstanceId, delta: i64) -> Result<i64, UsageError> {
        self.instances
            .get(instance)
            .map_or(0, |i| i.in_use)
            .checked_add(delta)
            .ok_or_else(|| self.overflow(delta))
    }

    fn overflow(&self, delta: i64) -> UsageError {
        UsageError::Overflow {
            resource: self.resource.clone(),
            delta,
        }
    }
}

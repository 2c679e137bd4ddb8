//! Background task metrics.

use core::fmt;
use metrics::Counter;

/// Counters of the tasks spawned through one [`TaskExecutor`](crate::TaskExecutor).
#[derive(Clone, Debug)]
pub(crate) struct TaskExecutorMetrics {
    /// Background tasks started, such as expiry sweepers
    pub(crate) spawned_total: Counter,
    /// Background tasks that returned, panicked or were cancelled
    pub(crate) finished_total: Counter,
    /// Background tasks that panicked; each one shuts the node down
    pub(crate) panicked_total: Counter,
}

impl Default for TaskExecutorMetrics {
    fn default() -> Self {
        Self {
            spawned_total: metrics::counter!("tasks.spawned_total"),
            finished_total: metrics::counter!("tasks.finished_total"),
            panicked_total: metrics::counter!("tasks.panicked_total"),
        }
    }
}

impl TaskExecutorMetrics {
    pub(crate) fn inc_spawned(&self) {
        self.spawned_total.increment(1);
    }
}

/// Bumps a counter when the owning task ends, however it ends.
pub(crate) struct IncCounterOnDrop(Counter);

impl fmt::Debug for IncCounterOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncCounterOnDrop").finish()
    }
}

impl IncCounterOnDrop {
    pub(crate) const fn new(counter: Counter) -> Self {
        Self(counter)
    }
}

impl Drop for IncCounterOnDrop {
    fn drop(&mut self) {
        self.0.increment(1);
    }
}

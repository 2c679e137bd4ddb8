use metrics::Counter;

/// Usage ledger metrics.
#[derive(Clone, Debug)]
pub(crate) struct UsageMetrics {
    /// Number of accepted instance reports
    pub(crate) reports_total: Counter,
    /// Number of instance entries dropped by `forget_instance`
    pub(crate) forgotten_total: Counter,
}

impl Default for UsageMetrics {
    fn default() -> Self {
        Self {
            reports_total: metrics::counter!("usage.reports_total"),
            forgotten_total: metrics::counter!("usage.forgotten_instances_total"),
        }
    }
}

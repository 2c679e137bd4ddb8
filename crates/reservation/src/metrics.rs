use metrics::Counter;

/// Reservation engine metrics.
#[derive(Clone, Debug)]
pub(crate) struct ReservationMetrics {
    /// Number of created reservations
    pub(crate) created_total: Counter,
    /// Number of committed reservations
    pub(crate) committed_total: Counter,
    /// Number of rolled back reservations
    pub(crate) rolled_back_total: Counter,
    /// Number of reservations rolled back by the expiry sweep
    pub(crate) expired_total: Counter,
    /// Number of batches rejected for exceeding a quota
    pub(crate) quota_exceeded_total: Counter,
    /// Number of batches rejected for stale usage
    pub(crate) stale_rejections_total: Counter,
    /// Number of operations that ran out of conflict retries
    pub(crate) conflict_failures_total: Counter,
}

impl Default for ReservationMetrics {
    fn default() -> Self {
        Self {
            created_total: metrics::counter!("reservation.created_total"),
            committed_total: metrics::counter!("reservation.committed_total"),
            rolled_back_total: metrics::counter!("reservation.rolled_back_total"),
            expired_total: metrics::counter!("reservation.expired_total"),
            quota_exceeded_total: metrics::counter!("reservation.quota_exceeded_total"),
            stale_rejections_total: metrics::counter!("reservation.stale_rejections_total"),
            conflict_failures_total: metrics::counter!("reservation.conflict_failures_total"),
        }
    }
}

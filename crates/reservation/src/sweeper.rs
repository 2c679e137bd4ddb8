use std::time::Duration;

use boson_tasks::Shutdown;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::ReservationEngine;

/// Background task rolling back expired reservations on a fixed interval.
///
/// Several instances may sweep the same storage concurrently.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    engine: ReservationEngine,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(engine: ReservationEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Sweeper using the engine's configured interval.
    pub fn from_engine(engine: ReservationEngine) -> Self {
        let interval = engine.config().sweep_interval;
        Self::new(engine, interval)
    }

    /// Sweep until `shutdown` is signaled. The first sweep runs immediately.
    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval = ?self.interval, "expiry sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.signaled() => break,
                _ = ticker.tick() => self.sweep(),
            }
        }

        debug!("expiry sweeper stopped");
    }

    /// Run a single sweep.
    pub fn sweep(&self) {
        if let Err(err) = self.engine.expire_due() {
            warn!(%err, "expiry sweep failed");
        }
    }
}

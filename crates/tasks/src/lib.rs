//! Task management for background work of the Boson node.
//!
//! A [`TaskManager`] owns the shutdown signal and collects panics of critical
//! tasks such as the expiry sweeper. Tasks are spawned through cloneable
//! [`TaskExecutor`] handles and are awaited on shutdown.
//!
//! # Components
//!
//! - [`TaskManager`] - Shutdown orchestration and panic collection
//! - [`TaskExecutor`] - Spawns critical tasks that stop gracefully
//! - [`Shutdown`] - Signal a graceful task waits on to stop

mod metrics;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use tracing_futures::Instrument;

use crate::metrics::{IncCounterOnDrop, TaskExecutorMetrics};

/// A critical task panicked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("critical task `{task_name}` panicked: `{error}`")]
pub struct PanickedTaskError {
    /// Name of the task.
    pub task_name: &'static str,
    /// Panic message, if it was a string.
    pub error: String,
}

impl PanickedTaskError {
    fn new(task_name: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let error = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self { task_name, error }
    }
}

// ============================================================================
// Shutdown
// ============================================================================

/// Receiving side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Wait until shutdown is requested.
    ///
    /// Resolves immediately if it already was, or if the manager is gone.
    pub async fn signaled(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

#[derive(Debug, Default)]
struct GracefulTasks {
    running: AtomicUsize,
    done: Notify,
}

/// Decrements the running graceful task count when dropped.
struct GracefulGuard(Arc<GracefulTasks>);

impl GracefulGuard {
    fn new(tasks: Arc<GracefulTasks>) -> Self {
        tasks.running.fetch_add(1, Ordering::SeqCst);
        Self(tasks)
    }
}

impl Drop for GracefulGuard {
    fn drop(&mut self) {
        if self.0.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.done.notify_waiters();
        }
    }
}

// ============================================================================
// TaskManager
// ============================================================================

/// Owns the shutdown signal for every task spawned by its executors.
#[derive(Debug)]
pub struct TaskManager {
    handle: Handle,
    shutdown_tx: watch::Sender<bool>,
    panicked_tx: mpsc::UnboundedSender<PanickedTaskError>,
    panicked_rx: mpsc::UnboundedReceiver<PanickedTaskError>,
    graceful: Arc<GracefulTasks>,
}

impl TaskManager {
    /// Create a manager spawning onto `handle`.
    pub fn new(handle: Handle) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (panicked_tx, panicked_rx) = mpsc::unbounded_channel();
        Self {
            handle,
            shutdown_tx,
            panicked_tx,
            panicked_rx,
            graceful: Arc::default(),
        }
    }

    /// Create a manager for the current tokio runtime.
    ///
    /// # Panics
    ///
    /// If called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// A new executor handle.
    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            handle: self.handle.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
            panicked_tx: self.panicked_tx.clone(),
            graceful: Arc::clone(&self.graceful),
            metrics: TaskExecutorMetrics::default(),
        }
    }

    /// Wait for the first critical task to panic.
    pub async fn wait_for_panic(&mut self) -> PanickedTaskError {
        match self.panicked_rx.recv().await {
            Some(err) => err,
            // The manager holds a sender, so the channel never closes.
            None => std::future::pending().await,
        }
    }

    /// Signal shutdown and wait for graceful tasks to finish.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn graceful_shutdown_with_timeout(self, timeout: Duration) -> bool {
        let _ = self.shutdown_tx.send(true);
        let graceful = Arc::clone(&self.graceful);

        let wait = async move {
            loop {
                let done = graceful.done.notified();
                tokio::pin!(done);
                done.as_mut().enable();
                if graceful.running.load(Ordering::SeqCst) == 0 {
                    return;
                }
                done.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => {
                debug!("graceful shutdown completed");
                true
            }
            Err(_) => {
                error!(
                    remaining = self.graceful.running.load(Ordering::SeqCst),
                    "graceful shutdown timed out"
                );
                false
            }
        }
    }
}

// ============================================================================
// TaskExecutor
// ============================================================================

/// Cloneable handle for spawning tasks managed by a [`TaskManager`].
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    shutdown_rx: watch::Receiver<bool>,
    panicked_tx: mpsc::UnboundedSender<PanickedTaskError>,
    graceful: Arc<GracefulTasks>,
    metrics: TaskExecutorMetrics,
}

impl TaskExecutor {
    /// The shutdown signal of the owning manager.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown {
            rx: self.shutdown_rx.clone(),
        }
    }

    /// Spawn a critical task that receives the shutdown signal and is
    /// awaited by [`TaskManager::graceful_shutdown_with_timeout`].
    pub fn spawn_critical_with_graceful_shutdown<F, Fut>(
        &self,
        name: &'static str,
        f: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Shutdown) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_spawned();
        let finished = IncCounterOnDrop::new(self.metrics.finished_total.clone());
        let guard = GracefulGuard::new(Arc::clone(&self.graceful));
        let panicked = self.metrics.panicked_total.clone();
        let panicked_tx = self.panicked_tx.clone();
        let fut = f(self.shutdown_signal());

        self.handle.spawn(
            async move {
                let _finished = finished;
                let _guard = guard;
                if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
                    let err = PanickedTaskError::new(name, payload);
                    error!(task = name, error = %err.error, "critical task panicked");
                    panicked.increment(1);
                    let _ = panicked_tx.send(err);
                }
            }
            .instrument(tracing::debug_span!("task", name)),
        )
    }
}

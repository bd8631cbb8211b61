//! GcLoop: periodic cleanup of expired artifacts and finished jobs.
//!
//! Each tick:
//! 1. deletes files of artifacts whose TTL has passed and forgets tombstones
//!    older than the store's grace period
//! 2. drops terminal job records older than the retention window, so their
//!    ids read as unknown afterwards

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::ports::ArtifactStore;
use crate::queue::Queue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub artifacts: usize,
    pub jobs: usize,
}

pub struct GcLoop {
    store: Arc<dyn ArtifactStore>,
    queue: Arc<dyn Queue>,
    interval: Duration,
    retention: Duration,
}

impl GcLoop {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        queue: Arc<dyn Queue>,
        interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            interval,
            retention,
        }
    }

    /// Run one collection pass.
    pub async fn tick(&self) -> GcReport {
        let artifacts = match self.store.purge_expired().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "artifact purge failed");
                0
            }
        };

        let jobs = match Instant::now().checked_sub(self.retention) {
            Some(cutoff) => self.queue.purge_finished(cutoff).await,
            None => 0,
        };

        let report = GcReport { artifacts, jobs };
        if report != GcReport::default() {
            debug!(artifacts, jobs, "gc pass");
        }
        report
    }

    pub fn spawn(self) -> GcHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval.max(Duration::from_millis(1));

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }
            debug!("gc loop stopped");
        });

        GcHandle { shutdown_tx, join }
    }
}

pub struct GcHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl GcHandle {
    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "gc loop panicked");
        }
    }
}

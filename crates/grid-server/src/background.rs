//! Background loops that drive the grid forward: matching queued work to
//! free node slots, and sweeping nodes whose heartbeat has lapsed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grid_core::GridService;
use tokio::sync::watch;

/// Background allocation loop. Never returns under normal operation —
/// spawn it via `tokio::spawn` and stop it with the shutdown channel.
pub struct AllocatorLoop {
    service: Arc<dyn GridService>,
    interval: Duration,
}

impl AllocatorLoop {
    pub fn new(service: Arc<dyn GridService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("allocator loop started (interval={:?})", self.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("allocator loop stopping");
                        return;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {
                    let dispatched = self.service.run_allocation_pass(Utc::now().timestamp()).await;
                    if dispatched > 0 {
                        tracing::debug!("allocation pass dispatched {dispatched} unit(s)");
                    }
                }
            }
        }
    }
}

/// Background liveness sweep. Marks heartbeat-expired nodes dead and
/// requeues their orphaned work.
pub struct LivenessLoop {
    service: Arc<dyn GridService>,
    interval: Duration,
}

impl LivenessLoop {
    pub fn new(service: Arc<dyn GridService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("liveness loop started (interval={:?})", self.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("liveness loop stopping");
                        return;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.service.sweep(Utc::now().timestamp()).await;
                }
            }
        }
    }
}

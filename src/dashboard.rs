//! Periodic dashboard polling
//!
//! Fetches aggregate check-in counts on a fixed interval and publishes the
//! latest snapshot over a watch channel, built on the same cancellable
//! sampler used by the scan loop.

use crate::api::{CheckInClient, DashboardData};
use crate::scan::{SamplerHandle, TickOutcome, spawn_sampler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Refresh interval for dashboard counts
pub const DASHBOARD_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Background poller publishing [`DashboardData`] snapshots
pub struct DashboardPoller {
    rx: watch::Receiver<DashboardData>,
    sampler: SamplerHandle,
}

impl DashboardPoller {
    /// Fetch once immediately, then keep refreshing every
    /// [`DASHBOARD_POLL_INTERVAL`].
    pub async fn start(client: Arc<CheckInClient>) -> Self {
        Self::start_with_interval(client, DASHBOARD_POLL_INTERVAL).await
    }

    /// Like [`start`](Self::start) with a custom refresh interval.
    pub async fn start_with_interval(client: Arc<CheckInClient>, interval: Duration) -> Self {
        let initial = client.dashboard().await;
        let (tx, rx) = watch::channel(initial);
        let tx = Arc::new(tx);

        let sampler = spawn_sampler(interval, move || {
            let client = Arc::clone(&client);
            let tx = Arc::clone(&tx);
            async move {
                let data = client.dashboard().await;
                // Receivers may all be gone; keep polling anyway, latest()
                // reads through our own receiver.
                let _ = tx.send(data);
                TickOutcome::Continue
            }
        });

        Self { rx, sampler }
    }

    /// Most recent snapshot
    pub fn latest(&self) -> DashboardData {
        *self.rx.borrow()
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<DashboardData> {
        self.rx.clone()
    }

    /// Stop polling. No further fetch starts after this returns.
    pub async fn shutdown(self) {
        self.sampler.cancel().await;
    }
}

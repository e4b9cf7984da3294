//! Scan loop.
//!
//! One background task sweeps the current scan target, reconciles the
//! responders against the inventory, commits the result, then sleeps for the
//! configured interval. A failed cycle is logged and skipped; only an
//! explicit shutdown ends the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use lanwatch_store::InventoryStore;

use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};
use crate::scanner::Prober;
use crate::target::ScanTarget;
use crate::{persist, reconcile};

/// What one completed cycle did.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub scan_id: Uuid,
    pub subnet: String,
    pub devices_found: u32,
    pub new_devices: u32,
    /// Whether the prober failed and the cycle ran on an empty sweep.
    pub probe_failed: bool,
    pub duration: Duration,
}

/// The scan loop, before it is started.
pub struct ScanLoop {
    prober: Arc<dyn Prober>,
    store: InventoryStore,
    target: ScanTarget,
    interval: Duration,
    probe_timeout: Duration,
}

impl ScanLoop {
    pub fn new(
        config: &DiscoverConfig,
        prober: Arc<dyn Prober>,
        store: InventoryStore,
        target: ScanTarget,
    ) -> Self {
        Self {
            prober,
            store,
            target,
            interval: config.scan_interval(),
            probe_timeout: config.probe_timeout(),
        }
    }

    /// Override the sleep between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the loop on the runtime. Consumes the loop, so it cannot be
    /// started twice.
    pub fn spawn(self) -> ScanLoopHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        ScanLoopHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            target = %self.target.get(),
            "Scan loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Scan cycle skipped");
            }

            // A dropped handle also means stop.
            let handle_dropped = tokio::select! {
                _ = tokio::time::sleep(self.interval) => false,
                changed = shutdown.changed() => changed.is_err(),
            };
            if handle_dropped {
                break;
            }
        }

        tracing::info!("Scan loop stopped");
    }

    /// Execute a single cycle: probe → reconcile → commit.
    ///
    /// Probe failures and timeouts degrade to an empty sweep. Store failures
    /// abort the cycle and are returned.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let scan_id = Uuid::new_v4();
        let start = Instant::now();
        let subnet = self.target.get();

        tracing::info!(scan_id = %scan_id, subnet = %subnet, "Scanning");

        let (observations, probe_failed) = match self.probe(&subnet).await {
            Ok(obs) => (obs, false),
            Err(e) => {
                tracing::warn!(
                    scan_id = %scan_id,
                    subnet = %subnet,
                    error = %e,
                    "Probe failed, recording empty sweep"
                );
                (Vec::new(), true)
            }
        };

        let snapshot: HashMap<String, lanwatch_core::Device> = persist::snapshot(&self.store)
            .await?
            .into_iter()
            .map(|d| (d.ip.clone(), d))
            .collect();

        let now = Utc::now();
        let reconciliation =
            reconcile::reconcile(&observations, &subnet, now, |ip| snapshot.get(ip).cloned());
        let devices_found = reconciliation.summary.total_count;

        let new_devices = persist::commit_sweep(&self.store, reconciliation, &subnet, now).await?;

        let duration = start.elapsed();
        tracing::info!(
            scan_id = %scan_id,
            subnet = %subnet,
            devices_found,
            new_devices,
            duration_ms = duration.as_millis() as u64,
            "Scan complete"
        );

        Ok(CycleSummary {
            scan_id,
            subnet,
            devices_found,
            new_devices,
            probe_failed,
            duration,
        })
    }

    async fn probe(&self, subnet: &str) -> Result<Vec<lanwatch_core::Observation>> {
        match tokio::time::timeout(self.probe_timeout, self.prober.probe(subnet)).await {
            Ok(result) => result,
            Err(_) => Err(DiscoverError::ProbeTimeout {
                target: subnet.to_string(),
                secs: self.probe_timeout.as_secs(),
            }),
        }
    }
}

/// Handle to a running scan loop.
pub struct ScanLoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScanLoopHandle {
    /// Ask the loop to stop and wait for it. A cycle already in flight runs
    /// to completion first.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::monitor::{CycleReport, ListingMonitor};

/// Runs a cycle, waits a fixed interval, repeats.
pub struct CycleScheduler {
    monitor: Arc<ListingMonitor>,
    interval: Duration,
}

impl CycleScheduler {
    pub fn new(monitor: Arc<ListingMonitor>, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    pub async fn run_once(&self) -> CycleReport {
        let report = self.monitor.run_cycle().await;
        log_report(&report);
        report
    }

    /// Loops until `shutdown` resolves. A cycle in progress when `shutdown`
    /// fires runs to completion so notifications sent in it are persisted;
    /// shutdown only interrupts the wait between cycles.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0;

        loop {
            self.run_once().await;
            cycles += 1;

            tracing::info!("Waiting {}s until the next check", self.interval.as_secs());
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Scheduler stopped after {} cycle(s)", cycles);
        cycles
    }
}

fn log_report(report: &CycleReport) {
    let failed = report.failed_stores();
    tracing::info!(
        cycle_id = %report.cycle_id,
        stores = report.stores.len(),
        failed_stores = failed.len(),
        new = report.new_listings.len(),
        persisted = report.snapshot_persisted,
        "Cycle finished in {}ms",
        report.total_time_ms
    );
    if let Some(dispatch) = &report.dispatch {
        tracing::info!(
            succeeded = dispatch.succeeded(),
            failed = dispatch.failed(),
            "Notification fan-out complete"
        );
    }
}

//! Collection scheduler.
//!
//! Two logical states: idle (no cycle outstanding) and running (one
//! cycle submitted, not yet observed complete). Each tick performs a
//! zero-wait check of the previous cycle's handle, logs its outcome if
//! it finished, and submits the next cycle regardless — the schedule is
//! never blocked by an overrunning cycle. Overlap is bounded by a
//! semaphore sized to the configured worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::AnalyticsApi;
use crate::fetch::FetchCycle;

/// Drives fetch cycles on a fixed cadence.
pub struct Scheduler<C> {
    cycle: Arc<FetchCycle<C>>,
    interval: Duration,
    pool: Arc<Semaphore>,
}

impl<C: AnalyticsApi + 'static> Scheduler<C> {
    pub fn new(cycle: FetchCycle<C>, interval: Duration, max_workers: usize) -> Self {
        Self {
            cycle: Arc::new(cycle),
            interval,
            pool: Arc::new(Semaphore::new(max_workers)),
        }
    }

    /// Run the collection loop until the shutdown signal flips.
    ///
    /// A previous cycle observed to have failed or panicked is logged
    /// and followed by a one-second pause instead of the full
    /// interval; only shutdown terminates the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            workers = self.pool.available_permits(),
            "collection scheduler started"
        );

        let mut current: Option<JoinHandle<anyhow::Result<()>>> = None;
        loop {
            let pause = match self.tick(&mut current).await {
                Ok(()) => self.interval,
                Err(e) => {
                    error!(error = %e, "error in metrics collection loop");
                    Duration::from_secs(1)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => {
                    info!("collection scheduler shutting down");
                    break;
                }
            }
        }
        // An in-flight cycle is left to finish naturally; the store it
        // writes to outlives the scheduler.
    }

    /// One tick: reap the previous cycle without waiting, submit the
    /// next one. A reaped failure or panic becomes this tick's error,
    /// after the next cycle has been submitted.
    async fn tick(
        &self,
        current: &mut Option<JoinHandle<anyhow::Result<()>>>,
    ) -> anyhow::Result<()> {
        let mut previous = Ok(());
        if let Some(handle) = current.take() {
            if handle.is_finished() {
                // Finished: awaiting returns immediately.
                previous = match handle.await {
                    Ok(Ok(())) => {
                        debug!("previous fetch cycle completed");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(e.context("previous metrics collection failed")),
                    Err(e) => Err(anyhow::anyhow!("previous fetch cycle panicked: {e}")),
                };
            } else {
                debug!("previous fetch cycle still running, submitting next anyway");
            }
        }

        let cycle = self.cycle.clone();
        let pool = self.pool.clone();
        *current = Some(tokio::spawn(async move {
            let _permit = pool
                .acquire_owned()
                .await
                .map_err(|e| anyhow::anyhow!("worker pool closed: {e}"))?;
            cycle.run().await
        }));
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Account;
    use crate::datasets::Dataset;
    use crate::testutil::MockApi;
    use cf_store::SampleStore;

    fn scheduler_with(client: Arc<MockApi>, interval: Duration) -> Scheduler<MockApi> {
        let cycle = FetchCycle::new(
            client,
            SampleStore::new(),
            Account {
                id: "acct-id".to_string(),
                name: "acct".to_string(),
            },
            vec!["zone1".to_string()],
            vec![Dataset::HttpRequestsOverview],
            Duration::from_secs(60),
        );
        Scheduler::new(cycle, interval, 3)
    }

    #[tokio::test(start_paused = true)]
    async fn submits_one_cycle_per_tick() {
        let client = Arc::new(
            MockApi::new()
                .with_zone("zone1", "example.com", "cf_ent")
                .with_quota(1.0, 1.0, 0.0),
        );
        let scheduler = scheduler_with(client.clone(), Duration::from_secs(60));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        // First tick fires immediately; the cycle ends with one quota
        // fetch, so quota calls count completed cycles.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.quota_count(), 1);

        // Next tick only after the interval elapses.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(client.quota_count(), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_previous_cycle_surfaces_at_the_next_tick() {
        let client = Arc::new(MockApi::new().with_zone("zone1", "example.com", "cf_ent"));
        let scheduler = scheduler_with(client, Duration::from_secs(60));

        let mut current: Option<JoinHandle<anyhow::Result<()>>> =
            Some(tokio::spawn(async { Err(anyhow::anyhow!("cycle failed")) }));
        // Let the canned failure finish before the reap.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let err = scheduler.tick(&mut current).await.unwrap_err();
        assert!(format!("{err:#}").contains("cycle failed"));
        // The failure never blocks the next submission.
        assert!(current.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycles_do_not_stop_the_schedule() {
        let client = Arc::new(
            MockApi::new()
                .with_zone("zone1", "example.com", "cf_ent")
                .failing_zone_queries("zone1"),
        );
        let scheduler = scheduler_with(client.clone(), Duration::from_secs(60));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        // Two intervals: two submissions despite every query failing.
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(client.quota_count(), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}

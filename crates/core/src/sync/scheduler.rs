//! Periodic sync runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::context::RunContext;

use super::runner::SyncOrchestrator;
use super::types::{RunOutcome, RunTrigger, SyncError};

/// Runs the orchestrator every `interval`, each run bounded by `run_timeout`.
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    run_timeout: Duration,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, interval: Duration, run_timeout: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            run_timeout,
        }
    }

    /// Spawn the loop. The first run starts immediately.
    ///
    /// A shutdown signal stops the loop and cancels the in-flight run.
    pub fn spawn(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                run_timeout_secs = self.run_timeout.as_secs(),
                "Sync scheduler started"
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {}
                }

                let ctx = RunContext::with_timeout(self.run_timeout);
                let run = self.orchestrator.run_exclusive(&ctx, RunTrigger::Scheduled);
                tokio::pin!(run);

                let result = tokio::select! {
                    result = &mut run => result,
                    _ = shutdown_rx.recv() => {
                        info!("Shutdown requested, cancelling in-flight sync run");
                        ctx.cancel();
                        let _ = run.await;
                        break;
                    }
                };

                match result {
                    Ok(report) => match report.outcome {
                        RunOutcome::Succeeded => info!(
                            run_id = %report.id,
                            produced = report.artifacts.len(),
                            "Scheduled sync run succeeded"
                        ),
                        RunOutcome::Incomplete | RunOutcome::Cancelled => warn!(
                            run_id = %report.id,
                            outcome = report.outcome.as_str(),
                            error = report.error.as_deref().unwrap_or_default(),
                            "Scheduled sync run did not complete cleanly"
                        ),
                        RunOutcome::Failed => error!(
                            run_id = %report.id,
                            error = report.error.as_deref().unwrap_or_default(),
                            "Scheduled sync run failed"
                        ),
                    },
                    Err(SyncError::AlreadyRunning) => {
                        info!("Skipping scheduled sync, a run is already in progress")
                    }
                    Err(e) => error!(error = %e, "Scheduled sync run failed"),
                }
            }
            info!("Sync scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Channel;
    use crate::testing::{fixtures, MockArtifactSink, MockPassGenerator, MockProductionStore, MockTicketSource};

    #[tokio::test]
    async fn test_runs_immediately_and_stops_on_shutdown() {
        let source = Arc::new(MockTicketSource::new());
        source
            .set_pages(vec![vec![fixtures::issued_ticket("t1")]])
            .await;
        let orchestrator = Arc::new(
            SyncOrchestrator::new(
                source.clone(),
                Arc::new(MockProductionStore::new()),
                Arc::new(MockArtifactSink::new()),
                "valid",
            )
            .with_generator(Arc::new(MockPassGenerator::new(Channel::AppleWallet))),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = SyncScheduler::new(
            orchestrator.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(5),
        )
        .spawn(shutdown_rx);

        for _ in 0..50 {
            if orchestrator.last_report().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let report = orchestrator.last_report().await.unwrap();
        assert_eq!(report.trigger, RunTrigger::Scheduled);
        assert_eq!(report.outcome, RunOutcome::Succeeded);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.fetch_calls().await.len(), 2);
    }
}

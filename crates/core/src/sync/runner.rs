//! Sync orchestrator implementation.
//!
//! One run is a single sequential pass:
//! - Fetch every issued ticket of the configured status
//! - Diff against the produced set of each target channel
//! - Generate and store missing passes, aborting on the first failure
//! - Persist and deliver each stored pass, collecting failures

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::context::RunContext;
use crate::delivery::{Delivery, DeliveryRequest};
use crate::metrics;
use crate::sink::{ArtifactSink, SinkError};
use crate::source::{IssuedTicket, SourceError, TicketSource};
use crate::store::{Channel, PassRecord, ProductionStore};
use crate::wallet::{PassGenerator, WalletArtifact};

use super::types::{
    FailureStage, GeneratedArtifact, RunReport, RunTrigger, SyncError, SyncSummary, TicketFailure,
};

/// A generated and stored artifact waiting for persistence.
struct StoredArtifact<'a> {
    ticket: &'a IssuedTicket,
    channel: Channel,
    artifact: WalletArtifact,
    path: String,
}

/// Drives issued tickets from the source into the production store.
pub struct SyncOrchestrator {
    source: Arc<dyn TicketSource>,
    store: Arc<dyn ProductionStore>,
    generators: Vec<Arc<dyn PassGenerator>>,
    sink: Arc<dyn ArtifactSink>,
    deliveries: Vec<Arc<dyn Delivery>>,
    clock: Arc<dyn Clock>,
    status: String,

    // Runtime state
    run_lock: Mutex<()>,
    current: StdMutex<Option<RunContext>>,
    last_report: RwLock<Option<RunReport>>,
}

impl SyncOrchestrator {
    /// Create an orchestrator syncing tickets of `status` (e.g. "valid").
    ///
    /// Add at least one generator with [`SyncOrchestrator::with_generator`].
    pub fn new(
        source: Arc<dyn TicketSource>,
        store: Arc<dyn ProductionStore>,
        sink: Arc<dyn ArtifactSink>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            generators: Vec::new(),
            sink,
            deliveries: Vec::new(),
            clock: Arc::new(SystemClock),
            status: status.into(),
            run_lock: Mutex::new(()),
            current: StdMutex::new(None),
            last_report: RwLock::new(None),
        }
    }

    /// Add a target channel. Generators run in the order they were added.
    pub fn with_generator(mut self, generator: Arc<dyn PassGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    /// Add a delivery step run after each successful persistence.
    pub fn with_delivery(mut self, delivery: Arc<dyn Delivery>) -> Self {
        self.deliveries.push(delivery);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.generators.iter().map(|g| g.channel()).collect()
    }

    pub fn store(&self) -> &Arc<dyn ProductionStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn TicketSource> {
        &self.source
    }

    /// Whether a run started through [`SyncOrchestrator::run_exclusive`] is in flight.
    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Report of the most recent exclusive run.
    pub async fn last_report(&self) -> Option<RunReport> {
        self.last_report.read().await.clone()
    }

    /// Cancel the in-flight exclusive run, if any.
    pub fn cancel_current(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match current.as_ref() {
            Some(ctx) => {
                ctx.cancel();
                true
            }
            None => false,
        }
    }

    /// Run once unless another exclusive run is in flight.
    ///
    /// Records metrics and the last report. Returns `AlreadyRunning` without
    /// touching anything when busy.
    pub async fn run_exclusive(
        &self,
        ctx: &RunContext,
        trigger: RunTrigger,
    ) -> Result<RunReport, SyncError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(SyncError::AlreadyRunning);
        };
        self.set_current(Some(ctx.clone()));

        let id = uuid::Uuid::new_v4().to_string();
        let started_at = self.clock.now();
        let start = Instant::now();

        let result = self.run(ctx).await;

        let elapsed = start.elapsed().as_secs_f64();
        let report = RunReport::from_result(id, trigger, started_at, self.clock.now(), &result);
        let outcome = report.outcome.as_str();
        metrics::SYNC_RUNS.with_label_values(&[outcome]).inc();
        metrics::SYNC_DURATION
            .with_label_values(&[outcome])
            .observe(elapsed);

        *self.last_report.write().await = Some(report.clone());
        self.set_current(None);
        Ok(report)
    }

    fn set_current(&self, ctx: Option<RunContext>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = ctx;
    }

    /// Execute one sync run.
    ///
    /// Generation and storage are fail-fast: the first error aborts the run
    /// and nothing generated so far is persisted. Persistence and delivery
    /// failures are collected per pass and returned together as
    /// [`SyncError::Incomplete`] once every pass has been attempted.
    pub async fn run(&self, ctx: &RunContext) -> Result<SyncSummary, SyncError> {
        if self.generators.is_empty() {
            return Err(SyncError::Configuration(
                "no pass generators configured".to_string(),
            ));
        }

        // Fetching
        ctx.check()?;
        info!(source = %self.source.name(), status = %self.status, "Starting sync run");
        let tickets = match ctx
            .run(self.source.fetch_all_issued_tickets(&self.status))
            .await?
        {
            Ok(tickets) => tickets,
            Err(SourceError::Configuration(msg)) => {
                error!(error = %msg, "Ticket source is misconfigured");
                return Err(SyncError::Configuration(msg));
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch issued tickets");
                return Err(SyncError::SourceFetch(e));
            }
        };
        metrics::TICKETS_FETCHED.inc_by(tickets.len() as u64);

        // Diffing
        let mut produced: Vec<HashMap<String, PassRecord>> = Vec::with_capacity(self.generators.len());
        for generator in &self.generators {
            let channel = generator.channel();
            let set = self
                .store
                .list_produced(channel)
                .map_err(|source| SyncError::ProducedSet { channel, source })?;
            produced.push(set);
        }
        let pending = pending_work(&tickets, &self.generators, &produced);
        let skipped = tickets.len() * self.generators.len() - pending.len();
        info!(
            fetched = tickets.len(),
            pending = pending.len(),
            skipped,
            "Computed passes to produce"
        );

        // Generating
        let mut stored = Vec::with_capacity(pending.len());
        for (ticket, generator) in pending {
            ctx.check()?;
            let channel = generator.channel();
            debug!(ticket_id = %ticket.id, channel = %channel, "Generating pass");

            let artifact = generator.generate(ticket).await.map_err(|source| {
                error!(ticket_id = %ticket.id, channel = %channel, error = %source, "Pass generation failed, aborting run");
                SyncError::Generation {
                    ticket_id: ticket.id.clone(),
                    channel,
                    source,
                }
            })?;
            metrics::PASSES_GENERATED
                .with_label_values(&[channel.as_str()])
                .inc();

            let path = self
                .sink
                .store(&artifact, ctx)
                .await
                .map_err(|e| match e {
                    SinkError::Cancelled(c) => SyncError::Cancelled(c),
                    source => {
                        error!(ticket_id = %ticket.id, channel = %channel, error = %source, "Failed to store artifact, aborting run");
                        SyncError::Storage {
                            ticket_id: ticket.id.clone(),
                            channel,
                            source,
                        }
                    }
                })?;
            debug!(ticket_id = %ticket.id, file_name = %artifact.file_name, path = %path, "Stored artifact");

            stored.push(StoredArtifact {
                ticket,
                channel,
                artifact,
                path,
            });
        }

        // Persisting / delivering
        let mut failures = Vec::new();
        let mut artifacts = Vec::with_capacity(stored.len());
        for item in stored {
            ctx.check()?;
            match self.persist_and_deliver(&item).await {
                Ok(()) => artifacts.push(GeneratedArtifact {
                    ticket_id: item.ticket.id.clone(),
                    channel: item.channel,
                    file_name: item.artifact.file_name.clone(),
                    purchaser_email: item.ticket.email.clone(),
                    path: item.path.clone(),
                }),
                Err(failure) => {
                    warn!(
                        ticket_id = %failure.ticket_id,
                        channel = %failure.channel,
                        stage = failure.stage.as_str(),
                        error = %failure.message,
                        "Pass failed after generation"
                    );
                    failures.push(failure);
                }
            }
        }

        let summary = SyncSummary {
            artifacts,
            fetched: tickets.len(),
            skipped,
        };
        if !failures.is_empty() {
            return Err(SyncError::Incomplete { failures, summary });
        }

        info!(produced = summary.artifacts.len(), "Sync run finished");
        Ok(summary)
    }

    async fn persist_and_deliver(&self, item: &StoredArtifact<'_>) -> Result<(), TicketFailure> {
        let ticket_id = item.ticket.id.as_str();
        let channel = item.channel;
        let fail = |stage, message: String| TicketFailure {
            ticket_id: ticket_id.to_string(),
            channel,
            stage,
            message,
        };

        let persisted =
            self.store
                .mark_produced(channel, ticket_id, &item.ticket.email, self.clock.now());
        metrics::PASSES_PERSISTED
            .with_label_values(&[
                channel.as_str(),
                if persisted.is_ok() { "success" } else { "error" },
            ])
            .inc();
        persisted.map_err(|e| fail(FailureStage::Persist, e.to_string()))?;

        if self.deliveries.is_empty() {
            return Ok(());
        }

        let request = DeliveryRequest {
            ticket_id,
            channel,
            purchaser_email: &item.ticket.email,
            artifact: &item.artifact,
            stored_at: &item.path,
        };
        let mut receipts = Vec::new();
        for delivery in &self.deliveries {
            match delivery.deliver(&request).await {
                Ok(Some(receipt)) => {
                    metrics::DELIVERIES
                        .with_label_values(&[delivery.name(), "success"])
                        .inc();
                    receipts.push(receipt);
                }
                Ok(None) => {}
                Err(e) => {
                    metrics::DELIVERIES
                        .with_label_values(&[delivery.name(), "error"])
                        .inc();
                    let message = format!("{}: {}", delivery.name(), e);
                    // Failed passes drop out of the produced set and are retried next run.
                    if let Err(store_err) = self.store.mark_failed(channel, ticket_id, &message) {
                        warn!(ticket_id = %ticket_id, channel = %channel, error = %store_err, "Failed to mark pass as failed");
                    }
                    return Err(fail(FailureStage::Deliver, message));
                }
            }
        }
        if receipts.is_empty() {
            return Ok(());
        }

        let reached_holder = receipts.iter().any(|r| r.reached_holder);
        let mut metadata = Map::new();
        metadata.insert(
            "sha256".to_string(),
            Value::String(format!("{:x}", Sha256::digest(&item.artifact.data))),
        );
        if let Some(url) = receipts
            .iter()
            .filter(|r| !r.reached_holder)
            .find_map(|r| r.location.clone())
        {
            metadata.insert("upload_url".to_string(), Value::String(url));
        }
        metadata.insert("deliveries".to_string(), json!(receipts));

        self.store
            .record_delivery(
                channel,
                ticket_id,
                reached_holder.then(|| self.clock.now()),
                Value::Object(metadata),
            )
            .map_err(|e| fail(FailureStage::Persist, e.to_string()))?;

        debug!(ticket_id = %ticket_id, channel = %channel, reached_holder, "Recorded delivery");
        Ok(())
    }
}

/// (ticket, generator) pairs not yet produced, in fetch order and then
/// generator order.
fn pending_work<'a>(
    tickets: &'a [IssuedTicket],
    generators: &'a [Arc<dyn PassGenerator>],
    produced: &[HashMap<String, PassRecord>],
) -> Vec<(&'a IssuedTicket, &'a Arc<dyn PassGenerator>)> {
    tickets
        .iter()
        .flat_map(|ticket| {
            generators
                .iter()
                .zip(produced)
                .filter(|(_, set)| !set.contains_key(&ticket.id))
                .map(move |(generator, _)| (ticket, generator))
        })
        .collect()
}

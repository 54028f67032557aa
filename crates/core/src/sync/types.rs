//! Types for sync runs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Cancelled;
use crate::sink::SinkError;
use crate::source::SourceError;
use crate::store::{Channel, StoreError};
use crate::wallet::GenerationError;

/// Phase in which a per-ticket failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Persist,
    Deliver,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Persist => "persist",
            FailureStage::Deliver => "deliver",
        }
    }
}

/// A persistence or delivery failure for one produced pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketFailure {
    pub ticket_id: String,
    pub channel: Channel,
    pub stage: FailureStage,
    pub message: String,
}

impl fmt::Display for TicketFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticket {} ({}) {} failed: {}",
            self.ticket_id,
            self.channel,
            self.stage.as_str(),
            self.message
        )
    }
}

fn join_failures(failures: &[TicketFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing credentials or wiring. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to fetch issued tickets: {0}")]
    SourceFetch(#[source] SourceError),

    #[error("failed to list produced passes for {channel}: {source}")]
    ProducedSet {
        channel: Channel,
        #[source]
        source: StoreError,
    },

    /// Aborts the run; nothing generated so far is persisted.
    #[error("failed to generate {channel} pass for ticket {ticket_id}: {source}")]
    Generation {
        ticket_id: String,
        channel: Channel,
        #[source]
        source: GenerationError,
    },

    #[error("failed to store {channel} artifact for ticket {ticket_id}: {source}")]
    Storage {
        ticket_id: String,
        channel: Channel,
        #[source]
        source: SinkError,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// Some produced passes could not be persisted or delivered. The rest of
    /// the run completed; `summary` holds what went through.
    #[error("{} pass(es) failed: {}", .failures.len(), join_failures(.failures))]
    Incomplete {
        failures: Vec<TicketFailure>,
        summary: SyncSummary,
    },

    #[error("a sync run is already in progress")]
    AlreadyRunning,
}

impl SyncError {
    /// Label used for metrics and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "configuration",
            SyncError::SourceFetch(_) => "source_fetch",
            SyncError::ProducedSet { .. } => "produced_set",
            SyncError::Generation { .. } => "generation",
            SyncError::Storage { .. } => "storage",
            SyncError::Cancelled(_) => "cancelled",
            SyncError::Incomplete { .. } => "incomplete",
            SyncError::AlreadyRunning => "already_running",
        }
    }
}

/// One artifact produced by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub ticket_id: String,
    pub channel: Channel,
    pub file_name: String,
    pub purchaser_email: String,
    /// Location returned by the artifact sink.
    pub path: String,
}

/// Result of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub artifacts: Vec<GeneratedArtifact>,
    /// Issued tickets returned by the source.
    pub fetched: usize,
    /// (ticket, channel) pairs already produced.
    pub skipped: usize,
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    /// Finished, but some passes failed persistence or delivery.
    Incomplete,
    Failed,
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Incomplete => "incomplete",
            RunOutcome::Failed => "failed",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

/// Serializable record of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub id: String,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub fetched: usize,
    pub skipped: usize,
    pub artifacts: Vec<GeneratedArtifact>,
    pub failures: Vec<TicketFailure>,
    pub error: Option<String>,
}

impl RunReport {
    pub(crate) fn from_result(
        id: String,
        trigger: RunTrigger,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        result: &Result<SyncSummary, SyncError>,
    ) -> Self {
        let mut report = RunReport {
            id,
            trigger,
            started_at,
            finished_at,
            outcome: RunOutcome::Succeeded,
            fetched: 0,
            skipped: 0,
            artifacts: Vec::new(),
            failures: Vec::new(),
            error: None,
        };

        let summary = match result {
            Ok(summary) => Some(summary),
            Err(SyncError::Incomplete { failures, summary }) => {
                report.outcome = RunOutcome::Incomplete;
                report.failures = failures.clone();
                Some(summary)
            }
            Err(SyncError::Cancelled(_)) => {
                report.outcome = RunOutcome::Cancelled;
                None
            }
            Err(_) => {
                report.outcome = RunOutcome::Failed;
                None
            }
        };
        if let Err(e) = result {
            report.error = Some(e.to_string());
        }
        if let Some(summary) = summary {
            report.fetched = summary.fetched;
            report.skipped = summary.skipped;
            report.artifacts = summary.artifacts.clone();
        }
        report
    }
}

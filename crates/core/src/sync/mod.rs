//! Sync orchestrator: issued tickets in, wallet passes out.
//!
//! A run moves through `Fetching → Diffing → Generating → Persisting/Delivering`
//! and ends `Done` or aborted. Runs are sequential; overlapping processes are
//! made safe by the production store's transactional `mark_produced`.

mod runner;
mod scheduler;
mod types;

pub use runner::SyncOrchestrator;
pub use scheduler::SyncScheduler;
pub use types::{
    FailureStage, GeneratedArtifact, RunOutcome, RunReport, RunTrigger, SyncError, SyncSummary,
    TicketFailure,
};

//! Sync run API handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tailorpass_core::{RunContext, RunReport, RunTrigger, SyncError};
use tracing::{error, info};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Trigger a sync run and wait for its report.
///
/// The run executes on its own task so a client disconnect does not abort it
/// halfway through persistence.
pub async fn trigger_sync(State(state): State<Arc<AppState>>) -> Result<Json<RunReport>, ApiError> {
    let orchestrator = Arc::clone(state.orchestrator());
    let ctx = RunContext::with_timeout(state.run_timeout());
    info!("Manual sync requested");

    let handle =
        tokio::spawn(async move { orchestrator.run_exclusive(&ctx, RunTrigger::Manual).await });

    match handle.await {
        Ok(Ok(report)) => Ok(Json(report)),
        Ok(Err(SyncError::AlreadyRunning)) => Err(api_error(
            StatusCode::CONFLICT,
            "a sync run is already in progress",
        )),
        Ok(Err(e)) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        Err(e) => {
            error!(error = %e, "Sync task panicked");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "sync task failed",
            ))
        }
    }
}

/// Report of the most recent run.
pub async fn last_report(State(state): State<Arc<AppState>>) -> Result<Json<RunReport>, ApiError> {
    state
        .orchestrator()
        .last_report()
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no sync run has completed yet"))
}

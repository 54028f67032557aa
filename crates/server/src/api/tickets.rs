//! Check-in API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tailorpass_core::source::CheckInResponse;
use tailorpass_core::{sweep_check_ins, CheckAction, SourceError, SweepReport};
use tracing::info;

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Request body for a check-in sweep
#[derive(Debug, Deserialize)]
pub struct SweepBody {
    pub action: CheckAction,
    /// Ticket status to sweep (default: the configured sync status)
    pub status: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Check a single ticket in
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CheckInResponse>, ApiError> {
    set_check_in(&state, &id, CheckAction::CheckIn).await
}

/// Undo a check-in
pub async fn check_out(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CheckInResponse>, ApiError> {
    set_check_in(&state, &id, CheckAction::CheckOut).await
}

/// Apply a check-in or check-out to every ticket of a status
pub async fn sweep(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SweepBody>,
) -> Result<Json<SweepReport>, ApiError> {
    let status = body
        .status
        .unwrap_or_else(|| state.ticket_status().to_string());
    info!(action = body.action.as_str(), status = %status, "Check-in sweep requested");

    sweep_check_ins(state.source(), &status, body.action)
        .await
        .map(Json)
        .map_err(source_error)
}

async fn set_check_in(
    state: &AppState,
    ticket_id: &str,
    action: CheckAction,
) -> Result<Json<CheckInResponse>, ApiError> {
    if ticket_id.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "ticket id is required"));
    }
    state
        .source()
        .set_check_in(ticket_id, action)
        .await
        .map(Json)
        .map_err(source_error)
}

/// Map a ticket source failure to an HTTP response.
///
/// Upstream 404s stay 404; every other upstream failure is a bad gateway.
fn source_error(e: SourceError) -> ApiError {
    match e {
        SourceError::Api { status: 404, .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        SourceError::Timeout => api_error(StatusCode::GATEWAY_TIMEOUT, e.to_string()),
        SourceError::Configuration(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        _ => api_error(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

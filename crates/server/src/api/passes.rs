//! Pass state API handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tailorpass_core::store::StatusCounts;
use tailorpass_core::{Channel, PassRecord};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for pass endpoints
#[derive(Debug, Deserialize)]
pub struct ChannelParams {
    /// Restrict to one channel (default: every configured channel)
    pub channel: Option<String>,
}

/// Response for listing produced passes
#[derive(Debug, Serialize)]
pub struct ListPassesResponse {
    pub passes: Vec<PassRecord>,
    pub total: usize,
}

/// Status counts for one channel
#[derive(Debug, Serialize)]
pub struct ChannelStats {
    pub channel: Channel,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: u64,
}

/// Response for pass statistics
#[derive(Debug, Serialize)]
pub struct PassStatsResponse {
    pub channels: Vec<ChannelStats>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List passes that are produced or sent
pub async fn list_passes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<ListPassesResponse>, ApiError> {
    let store = state.orchestrator().store();
    let mut passes = Vec::new();

    for channel in selected_channels(&state, &params)? {
        let produced = store
            .list_produced(channel)
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        passes.extend(produced.into_values());
    }
    passes.sort_by(|a, b| {
        a.channel
            .as_str()
            .cmp(b.channel.as_str())
            .then_with(|| a.ticket_tailor_id.cmp(&b.ticket_tailor_id))
    });

    let total = passes.len();
    Ok(Json(ListPassesResponse { passes, total }))
}

/// Count passes by status
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<PassStatsResponse>, ApiError> {
    let store = state.orchestrator().store();
    let mut channels = Vec::new();

    for channel in selected_channels(&state, &params)? {
        let counts = store
            .count_by_status(channel)
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        channels.push(ChannelStats {
            channel,
            total: counts.total(),
            counts,
        });
    }

    Ok(Json(PassStatsResponse { channels }))
}

fn selected_channels(state: &AppState, params: &ChannelParams) -> Result<Vec<Channel>, ApiError> {
    match params.channel.as_deref() {
        Some(raw) => raw
            .parse::<Channel>()
            .map(|c| vec![c])
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string())),
        None => Ok(state.orchestrator().channels()),
    }
}

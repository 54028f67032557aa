use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, passes, sync, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Sync runs
        .route("/sync", post(sync::trigger_sync))
        .route("/sync/last", get(sync::last_report))
        // Pass state
        .route("/passes", get(passes::list_passes))
        .route("/passes/stats", get(passes::get_stats))
        // Check-ins
        .route("/tickets/{id}/check-in", post(tickets::check_in))
        .route("/tickets/{id}/check-out", post(tickets::check_out))
        .route("/check-ins/sweep", post(tickets::sweep))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

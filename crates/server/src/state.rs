use std::sync::Arc;
use std::time::Duration;
use tailorpass_core::{Config, SanitizedConfig, SyncOrchestrator, TicketSource};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<SyncOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    pub fn source(&self) -> &dyn TicketSource {
        self.orchestrator.source().as_ref()
    }

    /// Ticket status synced and swept by default.
    pub fn ticket_status(&self) -> &str {
        &self.config.ticket_source.status
    }

    /// Deadline applied to manually triggered runs.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.config.sync.run_timeout_secs)
    }
}

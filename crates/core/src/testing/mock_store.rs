//! Mock production store for testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::store::{Channel, PassRecord, PassStatus, ProductionStore, StatusCounts, StoreError};

#[derive(Debug, Default)]
struct State {
    passes: HashMap<(Channel, String), PassRecord>,
    /// Ticket rows: external ID to (internal ID, email).
    tickets: HashMap<String, (String, String)>,
    fail_mark: HashSet<String>,
    mark_calls: Vec<(Channel, String)>,
}

/// In-memory implementation of the ProductionStore trait.
///
/// Follows the same status rules as the SQLite store and can be told to fail
/// `mark_produced` for specific tickets.
///
/// # Example
///
/// ```rust,ignore
/// let store = MockProductionStore::new();
/// store.fail_mark_for("it_2");
/// ```
#[derive(Debug, Default)]
pub struct MockProductionStore {
    state: Mutex<State>,
}

impl MockProductionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `mark_produced` fail for `ticket_id` on every channel.
    pub fn fail_mark_for(&self, ticket_id: &str) {
        self.state().fail_mark.insert(ticket_id.to_string());
    }

    /// `(channel, ticket)` pairs passed to `mark_produced`, failed ones included.
    pub fn mark_calls(&self) -> Vec<(Channel, String)> {
        self.state().mark_calls.clone()
    }

    /// Number of distinct ticket rows.
    pub fn ticket_count(&self) -> usize {
        self.state().tickets.len()
    }

    fn find<'a>(
        state: &'a mut State,
        channel: Channel,
        ticket_tailor_id: &str,
    ) -> Result<&'a mut PassRecord, StoreError> {
        state
            .passes
            .get_mut(&(channel, ticket_tailor_id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                channel,
                ticket_id: ticket_tailor_id.to_string(),
            })
    }
}

impl ProductionStore for MockProductionStore {
    fn list_produced(&self, channel: Channel) -> Result<HashMap<String, PassRecord>, StoreError> {
        Ok(self
            .state()
            .passes
            .values()
            .filter(|r| r.channel == channel && r.status.is_available())
            .map(|r| (r.ticket_tailor_id.clone(), r.clone()))
            .collect())
    }

    fn mark_produced(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        purchaser_email: &str,
        produced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state
            .mark_calls
            .push((channel, ticket_tailor_id.to_string()));

        if ticket_tailor_id.trim().is_empty() || purchaser_email.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "ticket id and purchaser email are required".to_string(),
            ));
        }
        if state.fail_mark.contains(ticket_tailor_id) {
            return Err(StoreError::Busy(format!(
                "simulated lock timeout for {}",
                ticket_tailor_id
            )));
        }

        let next_id = state.tickets.len() + 1;
        let ticket_row = state
            .tickets
            .entry(ticket_tailor_id.to_string())
            .or_insert_with(|| (format!("ticket-{}", next_id), purchaser_email.to_string()));
        ticket_row.1 = purchaser_email.to_string();
        let ticket_row_id = ticket_row.0.clone();

        let now = Utc::now();
        let next_pass_id = state.passes.len() + 1;
        let record = state
            .passes
            .entry((channel, ticket_tailor_id.to_string()))
            .or_insert_with(|| PassRecord {
                id: format!("pass-{}", next_pass_id),
                ticket_id: ticket_row_id,
                ticket_tailor_id: ticket_tailor_id.to_string(),
                purchaser_email: purchaser_email.to_string(),
                channel,
                status: PassStatus::Pending,
                produced_at: None,
                delivered_at: None,
                error_message: None,
                metadata: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            });
        record.status = PassStatus::Produced;
        record.produced_at = Some(produced_at);
        record.error_message = None;
        record.purchaser_email = purchaser_email.to_string();
        record.updated_at = now;

        // Keep every channel's view of the email in sync, like the shared ticket row.
        for pass in state.passes.values_mut() {
            if pass.ticket_tailor_id == ticket_tailor_id {
                pass.purchaser_email = purchaser_email.to_string();
            }
        }
        Ok(())
    }

    fn record_delivery(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        delivered_at: Option<DateTime<Utc>>,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let record = Self::find(&mut state, channel, ticket_tailor_id)?;

        if let (Some(existing), serde_json::Value::Object(update)) =
            (record.metadata.as_object_mut(), metadata)
        {
            existing.extend(update);
        }
        if let Some(at) = delivered_at {
            record.status = PassStatus::Sent;
            record.delivered_at = Some(at);
            record.error_message = None;
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    fn mark_failed(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let record = Self::find(&mut state, channel, ticket_tailor_id)?;
        record.status = PassStatus::Failed;
        record.error_message = Some(message.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    fn get_pass(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
    ) -> Result<Option<PassRecord>, StoreError> {
        Ok(self
            .state()
            .passes
            .get(&(channel, ticket_tailor_id.to_string()))
            .cloned())
    }

    fn count_by_status(&self, channel: Channel) -> Result<StatusCounts, StoreError> {
        let mut counts = StatusCounts::default();
        for record in self.state().passes.values().filter(|r| r.channel == channel) {
            match record.status {
                PassStatus::Pending => counts.pending += 1,
                PassStatus::Produced => counts.produced += 1,
                PassStatus::Sent => counts.sent += 1,
                PassStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}

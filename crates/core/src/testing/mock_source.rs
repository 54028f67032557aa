//! Mock ticket source for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::source::{CheckAction, CheckInResponse, IssuedTicket, SourceError, TicketSource};

/// Mock implementation of the TicketSource trait.
///
/// Pages are served by cursor: no cursor returns the first page, a cursor
/// equal to the last ID of page `n` returns page `n + 1`, anything else
/// returns an empty page.
#[derive(Debug, Default)]
pub struct MockTicketSource {
    pages: Arc<RwLock<Vec<Vec<IssuedTicket>>>>,
    /// Recorded `(status, starting_after)` pairs.
    fetch_calls: Arc<RwLock<Vec<(String, Option<String>)>>>,
    check_in_calls: Arc<RwLock<Vec<(String, CheckAction)>>>,
    failing_check_ins: Arc<RwLock<HashSet<String>>>,
    next_fetch_error: Arc<RwLock<Option<SourceError>>>,
}

impl MockTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the served pages.
    pub async fn set_pages(&self, pages: Vec<Vec<IssuedTicket>>) {
        *self.pages.write().await = pages;
    }

    /// Make the next page fetch fail.
    pub async fn set_next_fetch_error(&self, error: SourceError) {
        *self.next_fetch_error.write().await = Some(error);
    }

    /// Make every check-in mutation for `ticket_id` fail.
    pub async fn fail_check_in_for(&self, ticket_id: &str) {
        self.failing_check_ins
            .write()
            .await
            .insert(ticket_id.to_string());
    }

    pub async fn fetch_calls(&self) -> Vec<(String, Option<String>)> {
        self.fetch_calls.read().await.clone()
    }

    pub async fn check_in_calls(&self) -> Vec<(String, CheckAction)> {
        self.check_in_calls.read().await.clone()
    }
}

#[async_trait]
impl TicketSource for MockTicketSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_issued_tickets(
        &self,
        status: &str,
        starting_after: Option<&str>,
    ) -> Result<Vec<IssuedTicket>, SourceError> {
        self.fetch_calls
            .write()
            .await
            .push((status.to_string(), starting_after.map(str::to_string)));

        if let Some(error) = self.next_fetch_error.write().await.take() {
            return Err(error);
        }

        let pages = self.pages.read().await;
        let index = match starting_after {
            None => 0,
            Some(cursor) => match pages
                .iter()
                .position(|page| page.last().map(|t| t.id.as_str()) == Some(cursor))
            {
                Some(i) => i + 1,
                None => return Ok(Vec::new()),
            },
        };
        Ok(pages.get(index).cloned().unwrap_or_default())
    }

    async fn set_check_in(
        &self,
        ticket_id: &str,
        action: CheckAction,
    ) -> Result<CheckInResponse, SourceError> {
        let mut calls = self.check_in_calls.write().await;
        calls.push((ticket_id.to_string(), action));

        if self.failing_check_ins.read().await.contains(ticket_id) {
            return Err(SourceError::Api {
                status: 422,
                body: format!("ticket {} cannot be {}", ticket_id, action.as_str()),
            });
        }

        Ok(CheckInResponse {
            object: "check_in".to_string(),
            id: format!("chk_{}", calls.len()),
            issued_ticket_id: ticket_id.to_string(),
            quantity: action.quantity(),
            ..Default::default()
        })
    }
}

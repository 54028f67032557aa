//! Mock delivery collaborators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::delivery::{
    Delivery, DeliveryError, DeliveryReceipt, DeliveryRequest, MailMessage, MailSender,
};

/// Mock implementation of the Delivery trait.
#[derive(Debug)]
pub struct MockDelivery {
    name: String,
    location: Option<String>,
    reached_holder: bool,
    delivered: Arc<RwLock<Vec<String>>>,
    /// One-shot failures keyed by ticket ID.
    failures: Arc<RwLock<HashMap<String, DeliveryError>>>,
}

impl MockDelivery {
    /// A delivery that puts the pass in the holder's hands (like e-mail).
    pub fn reaching_holder(name: &str) -> Self {
        Self::build(name, None, true)
    }

    /// A delivery that only publishes the pass at `location` (like an upload).
    pub fn with_location(name: &str, location: &str) -> Self {
        Self::build(name, Some(location.to_string()), false)
    }

    fn build(name: &str, location: Option<String>, reached_holder: bool) -> Self {
        Self {
            name: name.to_string(),
            location,
            reached_holder,
            delivered: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Ticket IDs delivered successfully.
    pub async fn delivered(&self) -> Vec<String> {
        self.delivered.read().await.clone()
    }

    /// Fail the next delivery of `ticket_id` with `error`.
    pub async fn fail_for(&self, ticket_id: &str, error: DeliveryError) {
        self.failures
            .write()
            .await
            .insert(ticket_id.to_string(), error);
    }
}

#[async_trait]
impl Delivery for MockDelivery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(
        &self,
        request: &DeliveryRequest<'_>,
    ) -> Result<Option<DeliveryReceipt>, DeliveryError> {
        if let Some(error) = self.failures.write().await.remove(request.ticket_id) {
            return Err(error);
        }
        self.delivered
            .write()
            .await
            .push(request.ticket_id.to_string());

        Ok(Some(DeliveryReceipt {
            method: self.name.clone(),
            location: self.location.clone(),
            reached_holder: self.reached_holder,
        }))
    }
}

/// Mock implementation of the MailSender trait.
#[derive(Debug, Default)]
pub struct MockMailSender {
    sent: Arc<RwLock<Vec<MailMessage>>>,
    next_error: Arc<RwLock<Option<DeliveryError>>>,
}

impl MockMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.read().await.clone()
    }

    /// Fail the next send with `error`.
    pub async fn set_next_error(&self, error: DeliveryError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl MailSender for MockMailSender {
    async fn send(&self, message: MailMessage) -> Result<(), DeliveryError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.sent.write().await.push(message);
        Ok(())
    }
}

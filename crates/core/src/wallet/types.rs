//! Shared pass generation contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::source::IssuedTicket;
use crate::store::Channel;

/// Generated, platform-specific bytes for one ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletArtifact {
    /// Platform tag, also the storage namespace ("apple", "google").
    pub platform: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Errors from pass generation. None of them are retryable for the ticket.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A ticket field the pass needs is empty.
    #[error("ticket {ticket_id}: missing required field `{field}`")]
    MissingField {
        ticket_id: String,
        field: &'static str,
    },

    #[error("invalid generator configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load signing credentials: {0}")]
    Credentials(String),

    #[error("failed to sign pass: {0}")]
    Signing(String),

    #[error("pass template error: {0}")]
    Template(String),

    #[error("failed to encode pass content: {0}")]
    Encoding(String),
}

impl GenerationError {
    pub(crate) fn missing(ticket: &IssuedTicket, field: &'static str) -> Self {
        GenerationError::MissingField {
            ticket_id: ticket.id.clone(),
            field,
        }
    }
}

/// Turns one issued ticket into one wallet artifact.
///
/// Implementations have no side effects beyond computing bytes and must be
/// safe to call concurrently for different tickets.
#[async_trait]
pub trait PassGenerator: Send + Sync {
    /// Channel this generator produces passes for.
    fn channel(&self) -> Channel;

    /// Generate the artifact for `ticket`.
    async fn generate(&self, ticket: &IssuedTicket) -> Result<WalletArtifact, GenerationError>;
}
